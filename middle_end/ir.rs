//! The register-VM instruction set.
//!
//! A function is a set of labeled basic blocks over a frame of `num_regs`
//! virtual registers.  Instructions carry their source operands and at most
//! one destination register; terminals carry the branch targets, so deleting
//! instructions never disturbs labels or control flow.

use std::collections::BTreeMap as Map;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::commons::Valid;

mod display_impl;
mod fromstr_impl;


pub use fromstr_impl::ParseError;

/// A virtual register: a numbered slot in the enclosing function's frame.
/// Registers have identity only; no arithmetic semantics.
#[derive(
    Copy, Clone, Debug, Display, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[display(fmt = "v{}", _0)]
pub struct Reg(pub u32);

pub fn reg(n: u32) -> Reg {
    Reg(n)
}

/// Basic block identifiers.
#[derive(Clone, Debug, Display, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[display(fmt = "{}", _0)]
pub struct BbId(pub String);

pub fn bb_id(name: &str) -> BbId {
    BbId(name.to_string())
}

/// Function identifiers.
#[derive(Clone, Debug, Display, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[display(fmt = "{}", _0)]
pub struct FuncId(pub String);

pub fn func_id(name: &str) -> FuncId {
    FuncId(name.to_string())
}

/// An instruction input: a register or an integer literal.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Reg(Reg),
    Imm(i64),
}

impl Operand {
    pub fn as_reg(&self) -> Option<Reg> {
        match self {
            Operand::Reg(r) => Some(*r),
            Operand::Imm(_) => None,
        }
    }

    fn as_reg_mut(&mut self) -> Option<&mut Reg> {
        match self {
            Operand::Reg(r) => Some(r),
            Operand::Imm(_) => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ArithOp {
    #[display(fmt = "add")]
    Add,
    #[display(fmt = "sub")]
    Sub,
    #[display(fmt = "mul")]
    Mul,
    #[display(fmt = "div")]
    Div,
}

#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum CmpOp {
    #[display(fmt = "eq")]
    Eq,
    #[display(fmt = "neq")]
    Neq,
    #[display(fmt = "lt")]
    Lt,
    #[display(fmt = "lte")]
    Lte,
    #[display(fmt = "gt")]
    Gt,
    #[display(fmt = "gte")]
    Gte,
}

/// Calls with more argument registers than the fixed-width call encoding can
/// address are later lowered to the contiguous-register range form.
pub const INVOKE_ARG_LIMIT: usize = 5;

/// The instruction set, as a closed set of opcode variants.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// `dst = $const value`
    Const { dst: Reg, value: i64 },
    /// `dst = $copy src`, a register-to-register move with no other effect.
    Copy { dst: Reg, src: Reg },
    /// `dst = $copyobj src`, the reference-typed move; same semantics.
    CopyObj { dst: Reg, src: Reg },
    /// `dst = $arith aop op1 op2`
    Arith {
        dst: Reg,
        aop: ArithOp,
        op1: Operand,
        op2: Operand,
    },
    /// `dst = $cmp rop op1 op2`
    Cmp {
        dst: Reg,
        rop: CmpOp,
        op1: Operand,
        op2: Operand,
    },
    /// `[dst =] $invoke callee(args...)`
    Invoke {
        dst: Option<Reg>,
        callee: String,
        args: Vec<Reg>,
    },
    /// `$monitor_enter r`
    MonitorEnter(Reg),
    /// `$monitor_exit r`
    MonitorExit(Reg),
}

impl Instruction {
    /// The register this instruction defines, if any.
    pub fn dst(&self) -> Option<Reg> {
        use Instruction::*;
        match self {
            Const { dst, .. } | Copy { dst, .. } | CopyObj { dst, .. } => Some(*dst),
            Arith { dst, .. } | Cmp { dst, .. } => Some(*dst),
            Invoke { dst, .. } => *dst,
            MonitorEnter(_) | MonitorExit(_) => None,
        }
    }

    /// The register source operands, in operand order.
    pub fn source_regs(&self) -> Vec<Reg> {
        use Instruction::*;
        match self {
            Const { .. } => vec![],
            Copy { src, .. } | CopyObj { src, .. } => vec![*src],
            Arith { op1, op2, .. } | Cmp { op1, op2, .. } => {
                op1.as_reg().into_iter().chain(op2.as_reg()).collect()
            }
            Invoke { args, .. } => args.clone(),
            MonitorEnter(r) | MonitorExit(r) => vec![*r],
        }
    }

    /// Mutable references to the register source operands, in operand order.
    pub fn source_regs_mut(&mut self) -> Vec<&mut Reg> {
        use Instruction::*;
        match self {
            Const { .. } => vec![],
            Copy { src, .. } | CopyObj { src, .. } => vec![src],
            Arith { op1, op2, .. } | Cmp { op1, op2, .. } => op1
                .as_reg_mut()
                .into_iter()
                .chain(op2.as_reg_mut())
                .collect(),
            Invoke { args, .. } => args.iter_mut().collect(),
            MonitorEnter(r) | MonitorExit(r) => vec![r],
        }
    }

    /// `dst := src` copies, the only instructions that create alias facts.
    pub fn as_copy(&self) -> Option<(Reg, Reg)> {
        use Instruction::*;
        match self {
            Copy { dst, src } | CopyObj { dst, src } => Some((*dst, *src)),
            _ => None,
        }
    }

    /// Instructions whose operands the downstream verifier matches by exact
    /// register identity.  Their operands must not be rewritten even when a
    /// provably equal register exists.
    pub fn is_verifier_sensitive(&self) -> bool {
        matches!(self, Instruction::MonitorEnter(_) | Instruction::MonitorExit(_))
    }

    /// Whether the encoder will lower this instruction to range form, which
    /// requires its operand list to stay untouched at this stage.
    pub fn needs_range_form(&self) -> bool {
        matches!(self, Instruction::Invoke { args, .. } if args.len() > INVOKE_ARG_LIMIT)
    }
}

/// Block terminals.  Terminals define no registers; their register operands
/// are ordinary rewritable sources.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Terminal {
    /// `$jump bb`
    Jump(BbId),
    /// `$branch cond tt ff`, taken if `cond` is non-zero.
    Branch { cond: Operand, tt: BbId, ff: BbId },
    /// `$ret [op]`
    Ret(Option<Operand>),
}

impl Terminal {
    pub fn targets(&self) -> Vec<&BbId> {
        use Terminal::*;
        match self {
            Jump(bb) => vec![bb],
            Branch { tt, ff, .. } => vec![tt, ff],
            Ret(_) => vec![],
        }
    }

    pub fn source_regs(&self) -> Vec<Reg> {
        use Terminal::*;
        match self {
            Jump(_) => vec![],
            Branch { cond, .. } => cond.as_reg().into_iter().collect(),
            Ret(op) => op.as_ref().and_then(|op| op.as_reg()).into_iter().collect(),
        }
    }

    pub fn source_regs_mut(&mut self) -> Vec<&mut Reg> {
        use Terminal::*;
        match self {
            Jump(_) => vec![],
            Branch { cond, .. } => cond.as_reg_mut().into_iter().collect(),
            Ret(op) => op
                .as_mut()
                .and_then(|op| op.as_reg_mut())
                .into_iter()
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub insts: Vec<Instruction>,
    pub term: Terminal,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: FuncId,
    /// Size of the register frame; every register index must be below it.
    pub num_regs: u32,
    pub body: Map<BbId, BasicBlock>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub functions: Map<FuncId, Function>,
}

/// A structural validation error.  Violations are programmer errors in the
/// producer of the program; passes treat them as fatal.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub struct ValidationError(pub String);

impl std::error::Error for ValidationError {}

impl Program {
    /// Check the structural invariants every pass relies on: each function
    /// has an `entry` block, every branch target resolves, and every
    /// register index is within the declared frame size.
    pub fn validate(self) -> Result<Valid<Program>, ValidationError> {
        for f in self.functions.values() {
            validate_function(f)?;
        }
        Ok(Valid(self))
    }
}

fn validate_function(f: &Function) -> Result<(), ValidationError> {
    let err = |msg: String| Err(ValidationError(format!("{}: {msg}", f.name)));

    if !f.body.contains_key(&bb_id("entry")) {
        return err("no entry block".to_string());
    }

    for (id, bb) in &f.body {
        for target in bb.term.targets() {
            if !f.body.contains_key(target) {
                return err(format!("block {id} jumps to unknown block {target}"));
            }
        }

        let check_reg = |r: Reg| {
            if r.0 >= f.num_regs {
                err(format!(
                    "block {id} uses {r} outside the frame of {} registers",
                    f.num_regs
                ))
            } else {
                Ok(())
            }
        };

        for inst in &bb.insts {
            for r in inst.dst().into_iter().chain(inst.source_regs()) {
                check_reg(r)?;
            }
        }
        for r in bb.term.source_regs() {
            check_reg(r)?;
        }
    }

    Ok(())
}
