//! Display impls for the textual format.  The printer and the parser agree,
//! so `to_string` output parses back to an equal program.

use std::fmt::{Display, Formatter, Result};

use super::*;

impl Display for Operand {
    fn fmt(&self, w: &mut Formatter<'_>) -> Result {
        match self {
            Operand::Reg(r) => write!(w, "{r}"),
            Operand::Imm(i) => write!(w, "{i}"),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, w: &mut Formatter<'_>) -> Result {
        use Instruction::*;
        match self {
            Const { dst, value } => write!(w, "{dst} = $const {value}"),
            Copy { dst, src } => write!(w, "{dst} = $copy {src}"),
            CopyObj { dst, src } => write!(w, "{dst} = $copyobj {src}"),
            Arith { dst, aop, op1, op2 } => write!(w, "{dst} = $arith {aop} {op1} {op2}"),
            Cmp { dst, rop, op1, op2 } => write!(w, "{dst} = $cmp {rop} {op1} {op2}"),
            Invoke { dst, callee, args } => {
                if let Some(dst) = dst {
                    write!(w, "{dst} = ")?;
                }
                let args = args
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(w, "$invoke {callee}({args})")
            }
            MonitorEnter(r) => write!(w, "$monitor_enter {r}"),
            MonitorExit(r) => write!(w, "$monitor_exit {r}"),
        }
    }
}

impl Display for Terminal {
    fn fmt(&self, w: &mut Formatter<'_>) -> Result {
        use Terminal::*;
        match self {
            Jump(bb) => write!(w, "$jump {bb}"),
            Branch { cond, tt, ff } => write!(w, "$branch {cond} {tt} {ff}"),
            Ret(None) => write!(w, "$ret"),
            Ret(Some(op)) => write!(w, "$ret {op}"),
        }
    }
}

impl Display for Function {
    fn fmt(&self, w: &mut Formatter<'_>) -> Result {
        writeln!(w, "fn {} {} {{", self.name, self.num_regs)?;
        for (id, bb) in &self.body {
            writeln!(w, "{id}:")?;
            for inst in &bb.insts {
                writeln!(w, "  {inst}")?;
            }
            writeln!(w, "  {}", bb.term)?;
        }
        writeln!(w, "}}")
    }
}

impl Display for Program {
    fn fmt(&self, w: &mut Formatter<'_>) -> Result {
        for (i, func) in self.functions.values().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            write!(w, "{func}")?;
        }
        Ok(())
    }
}
