// Runs the copy propagation pass over a program file and prints the result.

use regopt::middle_end::optimization::copy_prop::{copy_prop, Config};
use regopt::middle_end::ir::Program;

use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        panic!("usage: copyprop <program-file> [config-file]");
    }

    let program_file_name = &args[1];
    let config = match args.get(2) {
        Some(config_file_name) => {
            serde_json::from_str(&read_from(config_file_name))
                .unwrap_or_else(|e| panic!("Bad config file: {e}"))
        }
        None => Config::default(),
    };

    let program = parse_program(&read_from(program_file_name));
    let optimized = copy_prop(program, &config);

    print!("{}", optimized.0);
}

fn parse_program(input: &str) -> regopt::commons::Valid<Program> {
    let program = input
        .parse::<Program>()
        .unwrap_or_else(|e| panic!("Syntax error: {e}"));
    program
        .validate()
        .unwrap_or_else(|e| panic!("Invalid program: {e}"))
}

fn read_from(path: &str) -> String {
    String::from_utf8(
        std::fs::read(path).unwrap_or_else(|_| panic!("Could not read the input file {}", path)),
    )
    .expect("The input file does not contain valid utf-8 text")
}
