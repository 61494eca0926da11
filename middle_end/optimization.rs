//! Optimization passes.

pub mod copy_prop;

#[cfg(test)]
mod tests;
