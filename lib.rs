//! Optimization passes for a register-based bytecode VM.
//!
//! The code of a method is a control-flow graph of basic blocks over a frame
//! of numbered virtual registers.  `middle_end::ir` defines the instruction
//! set, its textual format, and structural validation; `middle_end::analysis`
//! contains the dataflow framework and the copy-propagation alias analysis;
//! `middle_end::optimization` contains the rewriting passes built on top of
//! them.

pub mod commons;
pub mod middle_end;
