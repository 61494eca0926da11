//! Copy propagation.
//!
//! The alias analysis (`analysis::copy_prop`) computes, at every block
//! entry, which registers are known to hold equal values.  This pass then
//! walks each block forward, replaying the analysis transfer function so it
//! knows the partition immediately before each instruction, and
//!
//! * replaces each eligible source operand with its class representative,
//!   so all aliased occurrences name the same register;
//! * deletes a copy whose destination and source are already known equal;
//!   this covers literal self-copies and copies made redundant by an
//!   earlier copy on every incoming path.
//!
//! Two kinds of operands are never rewritten: operands of
//! verifier-sensitive instructions (the monitor pair), whose register
//! identity the downstream verifier matches structurally, and operand lists
//! that will be lowered to the contiguous-register range form.  A first
//! copy into a register used by such an operand is also never deleted: it
//! is not redundant at its own program point, only repeated copies are.
//!
//! The pass performs no liveness-based dead-code elimination.  A copy whose
//! result is never read stays in place; removing it belongs to a separate
//! dead-code pass.

use rayon::prelude::*;
use serde::Deserialize;

use crate::commons::Valid;
use crate::middle_end::analysis::copy_prop::{DefOrder, Env};
use crate::middle_end::analysis::{forward_analysis, AbstractEnv, Cfg};
use crate::middle_end::ir::*;

/// Options recognized by the pass.
#[derive(Copy, Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Keep tracking equalities across a chain of copies after an
    /// intermediate register of the chain is redefined.  Off by default:
    /// full transitive tracking merges whole classes on every copy, which
    /// grows classes and the cost of joins.
    pub track_all_transitives: bool,
}

/// The whole-program pass.  Functions share no state, so they are rewritten
/// in parallel.
pub fn copy_prop(program: Valid<Program>, config: &Config) -> Valid<Program> {
    let mut program = program.0;

    let mut functions: Vec<(FuncId, Function)> =
        std::mem::take(&mut program.functions).into_iter().collect();
    functions.par_iter_mut().for_each(|(_, f)| run(f, config));
    program.functions = functions.into_iter().collect();

    // A structurally broken rewrite is a bug in the pass, not a recoverable
    // condition.
    program.validate().unwrap()
}

/// Run the pass on a single function, in place.  Labels and branch targets
/// are never touched; only operands change and redundant copies disappear.
///
/// Rewriting a copy's source to its representative links the copy directly
/// to the head of its chain, a fact the analysis of the original code did
/// not have wherever an intermediate register of the chain was redefined in
/// between.  One round of rewriting can therefore expose further rewrites
/// at a later join, so the pass repeats until the instructions stop
/// changing; the result is a fixed point of the pass itself.
pub fn run(f: &mut Function, config: &Config) {
    // Every productive round deletes an instruction or moves an operand to
    // an earlier-defined representative, so the rounds terminate; the cap
    // makes a rewriter bug fail loudly instead of looping forever.
    let insts = f.body.values().map(|bb| bb.insts.len() + 1).sum::<usize>();
    let max_rounds = (insts + 1) * (f.num_regs as usize + 1);
    let mut rounds = 0usize;

    while run_once(f, config) {
        rounds += 1;
        assert!(
            rounds <= max_rounds,
            "copy propagation of {} did not converge within {max_rounds} rounds",
            f.name
        );
    }
}

// One analyze-and-rewrite round; reports whether anything changed.
fn run_once(f: &mut Function, config: &Config) -> bool {
    let cfg = Cfg::new(f);
    let defs = DefOrder::new(f, &cfg);
    let entry = Env::entry(config.track_all_transitives);
    let bottom = Env::bottom(config.track_all_transitives);
    let (pre_bb, _) = forward_analysis(f, &cfg, &entry, &bottom);

    let mut changed = false;
    for bb_id in cfg.rpo() {
        let mut env = pre_bb[bb_id].clone();
        debug_assert!(env.reached);
        let bb = f.body.get_mut(bb_id).unwrap();
        changed |= rewrite_block(bb, &mut env, &defs);
    }
    changed
}

fn rewrite_block(bb: &mut BasicBlock, env: &mut Env, defs: &DefOrder) -> bool {
    let mut changed = false;

    bb.insts.retain_mut(|inst| {
        changed |= rewrite_sources(inst, env, defs);

        if let Some((dst, src)) = inst.as_copy() {
            if dst == src || env.aliases.equal(dst, src) {
                // the copy is redundant; dropping it changes no register,
                // so the partition flows through unchanged
                changed = true;
                return false;
            }
        }

        env.analyze_inst(inst);
        true
    });

    for r in bb.term.source_regs_mut() {
        let rep = env.aliases.representative_of(*r, defs);
        if rep != *r {
            *r = rep;
            changed = true;
        }
    }

    changed
}

fn rewrite_sources(inst: &mut Instruction, env: &Env, defs: &DefOrder) -> bool {
    let eligible: Vec<bool> = (0..inst.source_regs().len())
        .map(|idx| operand_eligible(inst, idx))
        .collect();

    let mut changed = false;
    for (idx, r) in inst.source_regs_mut().into_iter().enumerate() {
        if !eligible[idx] {
            continue;
        }
        let rep = env.aliases.representative_of(*r, defs);
        if rep != *r {
            *r = rep;
            changed = true;
        }
    }
    changed
}

// Whether source-operand occurrence `idx` of `inst` may be replaced with a
// representative.  Eligibility is per occurrence, not per instruction; the
// current rules happen to cover every operand of the instructions they
// affect.
fn operand_eligible(inst: &Instruction, _idx: usize) -> bool {
    !inst.is_verifier_sensitive() && !inst.needs_range_form()
}
