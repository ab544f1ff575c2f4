use std::process;

use clap::Parser;

use treesurgeon::cli::Args;

fn main() {
    let args = Args::parse();
    match treesurgeon::run(args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(3);
        }
    }
}
