//! Static analysis of register-VM functions.

use std::collections::{BTreeMap as Map, BTreeSet as Set};

use super::ir::*;

pub mod copy_prop;


/// Instruction IDs: this is just a combination of the basic block ID and the
/// index of the instruction in the block.
pub type InstId = (BbId, usize);

/// The control-flow graph *for a function*, abstracted so that we can easily
/// get successors and predecessors and enumerate the reachable blocks in
/// reverse-postorder.
#[derive(Clone, Debug)]
pub struct Cfg {
    pub entry: BbId,
    succ_edges: Map<BbId, Set<BbId>>,
    pred_edges: Map<BbId, Set<BbId>>,
    rpo: Vec<BbId>,
}

impl Cfg {
    // construct a Cfg from the given function's basic blocks.
    pub fn new(function: &Function) -> Self {
        fn insert_edge(map: &mut Map<BbId, Set<BbId>>, key_bbid: &BbId, value_bbid: &BbId) {
            map.entry(key_bbid.clone())
                .or_default()
                .insert(value_bbid.clone());
        }

        let entry = bb_id("entry");
        let mut succ_edges: Map<BbId, Set<BbId>> = Map::new();
        let mut pred_edges: Map<BbId, Set<BbId>> = Map::new();

        for bbid in function.body.keys() {
            succ_edges.insert(bbid.clone(), Set::new());
            pred_edges.insert(bbid.clone(), Set::new());
        }

        for (bbid, bb) in &function.body {
            for target in bb.term.targets() {
                insert_edge(&mut succ_edges, bbid, target);
                insert_edge(&mut pred_edges, target, bbid);
            }
        }

        let rpo = reverse_postorder(&entry, &succ_edges);

        Cfg {
            entry,
            succ_edges,
            pred_edges,
            rpo,
        }
    }

    // an iterator over the successor edges of bb.
    pub fn succ(&self, bb: &BbId) -> impl Iterator<Item = &BbId> {
        self.succ_edges[bb].iter()
    }

    // an iterator over the predecessor edges of bb.
    pub fn pred(&self, bb: &BbId) -> impl Iterator<Item = &BbId> {
        self.pred_edges[bb].iter()
    }

    /// The blocks reachable from entry, in reverse-postorder.
    pub fn rpo(&self) -> &[BbId] {
        &self.rpo
    }
}

// Depth-first traversal with an explicit stack, so deeply nested CFGs cannot
// overflow the call stack.
fn reverse_postorder(entry: &BbId, succ_edges: &Map<BbId, Set<BbId>>) -> Vec<BbId> {
    let mut order = Vec::new();
    if !succ_edges.contains_key(entry) {
        return order;
    }

    let mut visited: Set<BbId> = [entry.clone()].into();
    let mut stack: Vec<(BbId, Vec<BbId>)> = vec![(
        entry.clone(),
        succ_edges[entry].iter().cloned().collect(),
    )];

    loop {
        let Some(top) = stack.last_mut() else { break };
        if let Some(next) = top.1.pop() {
            if visited.insert(next.clone()) {
                let succs: Vec<BbId> = succ_edges[&next].iter().cloned().collect();
                stack.push((next, succs));
            }
        } else {
            let (bb, _) = stack.pop().unwrap();
            order.push(bb);
        }
    }

    order.reverse();
    order
}

/// The abstract environment (the abstract state) used for any dfa.  It needs
/// to know how to combine with other states and how to modify itself when
/// processing an instruction or terminal.
pub trait AbstractEnv: Clone {
    // compute self = self ⊓ rhs; return whether self changed.
    fn join_with(&mut self, rhs: &Self) -> bool;

    // Transfer function for instructions.  Emulates what an instruction would
    // do.  Note that this function changes the current state!
    fn analyze_inst(&mut self, inst: &Instruction);

    // Transfer function for terminals.
    fn analyze_term(&mut self, term: &Terminal);

    // Transfer function for basic blocks.  `self` is the pre state of the
    // block; the result holds the state at every point of the block: index i
    // is the pre state of instruction i, the second-to-last element is the
    // pre state of the terminal, and the last element is the block's post
    // state.
    fn analyze_bb(&self, bb: &BasicBlock) -> Vec<Self>;
}

// SECTION: intraprocedural dataflow analysis framework

/// Analyze the given function.  Assumes that the function is from a valid
/// program.
///
/// This function starts from the entry and performs a forward analysis over
/// the reachable blocks, visiting them in reverse-postorder and re-visiting
/// a block whenever a predecessor's post state changes.  It returns:
///
/// (1) the pre state for each basic block
/// (2) the pre state for each instruction (and, at index `insts.len()`, the
///     block's terminal)
///
/// `bottom_state` is the initial state for every block except entry; for a
/// must-analysis it is the identity of `join_with`.
pub fn forward_analysis<A: AbstractEnv>(
    f: &Function,
    cfg: &Cfg,
    entry_state: &A,
    bottom_state: &A,
) -> (Map<BbId, A>, Map<InstId, A>) {
    let mut bb_pre_states: Map<BbId, A> = Map::new();
    let mut inst_pre_states: Map<InstId, A> = Map::new();

    for bbid in f.body.keys() {
        bb_pre_states.insert(bbid.clone(), bottom_state.clone());
    }
    bb_pre_states.insert(cfg.entry.clone(), entry_state.clone());

    if cfg.rpo().is_empty() {
        return (bb_pre_states, inst_pre_states);
    }

    let rpo_index: Map<&BbId, usize> = cfg.rpo().iter().enumerate().map(|(i, b)| (b, i)).collect();

    // worklist of rpo indices, so blocks are always processed in
    // reverse-postorder.
    let mut worklist: Set<usize> = [0].into();
    let mut visited: Set<BbId> = Set::new();

    // Convergence is guaranteed by the finite height of the abstract domain;
    // the cap makes a non-monotone transfer function fail loudly instead of
    // looping forever.
    let regs = f.num_regs as usize;
    let max_steps = (cfg.rpo().len() + 1) * ((regs + 1) * (regs + 1) + 4);
    let mut steps = 0usize;

    while let Some(i) = worklist.pop_first() {
        steps += 1;
        assert!(
            steps <= max_steps,
            "dataflow for {} did not converge within {max_steps} steps",
            f.name
        );

        let bb_id = &cfg.rpo()[i];
        let state = bb_pre_states[bb_id].clone();
        let bb = &f.body[bb_id];
        let states = state.analyze_bb(bb);

        for (k, s) in states.iter().take(states.len() - 1).enumerate() {
            inst_pre_states.insert((bb_id.clone(), k), s.clone());
        }

        let post = states.last().unwrap();
        for succ in cfg.succ(bb_id) {
            let succ_state = bb_pre_states.get_mut(succ).unwrap();
            let changed = succ_state.join_with(post);
            if changed || !visited.contains(succ) {
                visited.insert(succ.clone());
                worklist.insert(rpo_index[succ]);
            }
        }
    }

    (bb_pre_states, inst_pre_states)
}
