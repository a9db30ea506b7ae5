//! Entrypoint for the `switchboardd` worker.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    switchboardd::run(&mut io::stderr())
}
