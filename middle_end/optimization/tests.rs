use pretty_assertions::assert_eq;

use crate::commons::Valid;
use crate::middle_end::ir::Program;

mod copy_prop;

// Parse and sanitize both programs, run the pass on the input, and compare
// the pretty-printed results.
fn optimizes_to(input: &str, expected: &str, pass: impl Fn(Valid<Program>) -> Valid<Program>) {
    let input = input.parse::<Program>().unwrap().validate().unwrap();
    let expected = expected
        .parse::<Program>()
        .unwrap()
        .validate()
        .unwrap()
        .0
        .to_string();

    let actual = pass(input).0.to_string();

    assert_eq!(actual, expected);
}

// Check that a second run of the pass is a fixed point.
fn idempotent(input: &str, pass: impl Fn(Valid<Program>) -> Valid<Program>) {
    let input = input.parse::<Program>().unwrap().validate().unwrap();

    let once = pass(input);
    let printed_once = once.0.to_string();
    let twice = pass(once.clone());

    assert_eq!(twice.0.to_string(), printed_once);
}
