// Parses a program from stdin and prints it as JSON.

use regopt::middle_end::ir::Program;

use std::io::Read;

pub fn main() {
    let mut input_string = String::new();
    std::io::stdin().read_to_string(&mut input_string).unwrap();

    let program: Program = input_string
        .parse()
        .unwrap_or_else(|e| panic!("Syntax error: {e}"));
    let output = serde_json::to_string_pretty(&program).unwrap();

    println!("{output}");
}
