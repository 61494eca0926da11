//! The copy-propagation alias analysis.
//!
//! The abstract fact at a program point is a partition of the frame's
//! registers into classes known to hold equal values.  Only
//! register-to-register copies create facts; any other definition of a
//! register removes it from its class.  Joins intersect the relations, so a
//! fact survives a merge point only if it holds on *every* incoming path (a
//! must-analysis: sound for available copies).

use std::fmt::Display;

use crate::commons::Valid;

use super::*;

// SECTION: analysis interface

/// Performs the analysis for one function: the converged alias partition at
/// each block entry and before each instruction.
pub fn analyze(
    program: &Valid<Program>,
    func: FuncId,
    track_all_transitives: bool,
) -> (Map<BbId, Env>, Map<InstId, Env>) {
    let program = &program.0;
    let f = &program.functions[&func];
    let cfg = Cfg::new(f);
    forward_analysis(
        f,
        &cfg,
        &Env::entry(track_all_transitives),
        &Env::bottom(track_all_transitives),
    )
}

// SECTION: the alias domain

/// A partition of registers into alias classes.
///
/// Stored as undirected links between registers; two registers are in the
/// same class iff they are connected.  A register with no links is its own
/// singleton class.  The link structure is what distinguishes the two
/// tracking modes: a plain `union` adds one link, so removing an
/// intermediate register of a copy chain disconnects the ends, while a
/// transitive `union` links the merged class completely, so the ends stay
/// equal when an intermediate is redefined.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Partition {
    links: Map<Reg, Set<Reg>>,
}

impl Partition {
    /// True iff `a` and `b` are known to hold equal values.
    pub fn equal(&self, a: Reg, b: Reg) -> bool {
        a == b || self.class_of(a).contains(&b)
    }

    /// The alias class of `r`, including `r` itself.
    pub fn class_of(&self, r: Reg) -> Set<Reg> {
        let mut class: Set<Reg> = [r].into();
        let mut stack = vec![r];
        while let Some(x) = stack.pop() {
            if let Some(links) = self.links.get(&x) {
                for &n in links {
                    if class.insert(n) {
                        stack.push(n);
                    }
                }
            }
        }
        class
    }

    /// Record that `a` and `b` hold equal values.
    ///
    /// With `all_transitives` the existing classes of both registers are
    /// merged completely; otherwise only the two named registers are linked,
    /// which bounds class growth and the cost of later meets.
    pub fn union(&mut self, a: Reg, b: Reg, all_transitives: bool) {
        if self.equal(a, b) {
            return;
        }
        if all_transitives {
            let mut members = self.class_of(a);
            members.extend(self.class_of(b));
            self.make_clique(&members.into_iter().collect::<Vec<_>>());
        } else {
            self.link(a, b);
        }
    }

    /// Remove `r` from its class, making it a singleton.  Called whenever
    /// `r` is redefined by anything that is not a copy.
    pub fn isolate(&mut self, r: Reg) {
        if let Some(links) = self.links.remove(&r) {
            for n in links {
                let now_empty = match self.links.get_mut(&n) {
                    Some(back) => {
                        back.remove(&r);
                        back.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    self.links.remove(&n);
                }
            }
        }
    }

    /// The partition containing exactly the pairs equal in both `self` and
    /// `other`; the combinator applied at control-flow joins.  Each
    /// resulting class is stored fully linked, a canonical form that is
    /// identical however the inputs were built.
    pub fn meet(&self, other: &Partition) -> Partition {
        let mut result = Partition::default();
        for class in self.classes() {
            // split this class by the other partition's classes
            let mut groups: Map<Reg, Vec<Reg>> = Map::new();
            for &m in &class {
                let key = *other.class_of(m).iter().next().unwrap();
                groups.entry(key).or_default().push(m);
            }
            for group in groups.values() {
                result.make_clique(group);
            }
        }
        result
    }

    /// The canonical member standing for `r`'s class during rewriting: the
    /// member defined earliest in program order, ties broken by lowest
    /// register number.  Members never defined in the function cannot stand
    /// for others (rewriting a use to a never-assigned register would break
    /// downstream verification); if no member qualifies, `r` stands for
    /// itself.
    pub fn representative_of(&self, r: Reg, defs: &DefOrder) -> Reg {
        let mut best: Option<(usize, Reg)> = None;
        for m in self.class_of(r) {
            if let Some(pos) = defs.first_def(m) {
                let key = (pos, m);
                if best.map_or(true, |b| key < b) {
                    best = Some(key);
                }
            }
        }
        match best {
            Some((_, m)) => m,
            None => r,
        }
    }

    /// All non-singleton classes.
    pub fn classes(&self) -> Vec<Set<Reg>> {
        let mut seen: Set<Reg> = Set::new();
        let mut out = Vec::new();
        for &r in self.links.keys() {
            if seen.contains(&r) {
                continue;
            }
            let class = self.class_of(r);
            seen.extend(class.iter().copied());
            out.push(class);
        }
        out
    }

    fn link(&mut self, a: Reg, b: Reg) {
        self.links.entry(a).or_default().insert(b);
        self.links.entry(b).or_default().insert(a);
    }

    fn make_clique(&mut self, members: &[Reg]) {
        for (i, &x) in members.iter().enumerate() {
            for &y in &members[i + 1..] {
                self.link(x, y);
            }
        }
    }
}

impl Display for Partition {
    fn fmt(&self, w: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, class) in self.classes().iter().enumerate() {
            if i > 0 {
                write!(w, " ")?;
            }
            let members = class
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            write!(w, "{{{members}}}")?;
        }
        Ok(())
    }
}

// SECTION: representative policy input

/// First definition point of each register, in reverse-postorder program
/// order, computed once per function.  Registers that are never defined
/// (method inputs) have no entry.
#[derive(Clone, Debug)]
pub struct DefOrder {
    first_def: Map<Reg, usize>,
}

impl DefOrder {
    pub fn new(f: &Function, cfg: &Cfg) -> Self {
        let mut first_def = Map::new();
        let mut pos = 0usize;
        for bb_id in cfg.rpo() {
            for inst in &f.body[bb_id].insts {
                if let Some(d) = inst.dst() {
                    first_def.entry(d).or_insert(pos);
                }
                pos += 1;
            }
            pos += 1; // the terminal
        }
        DefOrder { first_def }
    }

    pub fn first_def(&self, r: Reg) -> Option<usize> {
        self.first_def.get(&r).copied()
    }
}

// SECTION: analysis implementation

/// The abstract environment.  `reached` distinguishes real states from the
/// meet identity: a block no path has reached yet constrains nothing at a
/// join.
#[derive(Clone, Debug)]
pub struct Env {
    pub reached: bool,
    pub aliases: Partition,
    all_transitives: bool,
}

impl Env {
    /// The state at function entry: reachable, no facts assumed.
    pub fn entry(all_transitives: bool) -> Self {
        Env {
            reached: true,
            aliases: Partition::default(),
            all_transitives,
        }
    }

    /// The initial state of every other block.
    pub fn bottom(all_transitives: bool) -> Self {
        Env {
            reached: false,
            aliases: Partition::default(),
            all_transitives,
        }
    }
}

impl AbstractEnv for Env {
    fn join_with(&mut self, rhs: &Self) -> bool {
        if !rhs.reached {
            return false;
        }
        if !self.reached {
            self.reached = true;
            self.aliases = rhs.aliases.clone();
            return true;
        }
        let met = self.aliases.meet(&rhs.aliases);
        let changed = met != self.aliases;
        self.aliases = met;
        changed
    }

    fn analyze_inst(&mut self, inst: &Instruction) {
        match inst.as_copy() {
            Some((dst, src)) => {
                // A copy that creates no new fact (a self-copy, or operands
                // already known equal) leaves the partition untouched; the
                // rewriter deletes exactly these, so the facts downstream
                // describe the rewritten code and re-running the pass is a
                // fixed point.
                if !self.aliases.equal(dst, src) {
                    self.aliases.isolate(dst);
                    self.aliases.union(dst, src, self.all_transitives);
                }
            }
            None => {
                if let Some(d) = inst.dst() {
                    self.aliases.isolate(d);
                }
            }
        }
    }

    fn analyze_term(&mut self, _term: &Terminal) {
        // terminals define no registers
    }

    fn analyze_bb(&self, bb: &BasicBlock) -> Vec<Self> {
        let mut states = Vec::with_capacity(bb.insts.len() + 2);
        let mut curr = self.clone();
        states.push(curr.clone());
        for inst in &bb.insts {
            curr.analyze_inst(inst);
            states.push(curr.clone());
        }
        curr.analyze_term(&bb.term);
        states.push(curr);
        states
    }
}
