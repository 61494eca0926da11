//! Helper types shared across the crate.

/// A wrapper marking a program that passed structural validation.
///
/// Passes take and return `Valid<Program>` so that unvalidated input cannot
/// flow into them, and every pass re-validates its own output.
#[derive(Clone, Debug)]
pub struct Valid<T>(pub T);
