//! Entry point for the `switchboard` client.
//!
//! Delegates to [`switchboard_cli::run`]. Stderr stays unlocked because the
//! input forwarding thread may log while replies are being written.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    switchboard_cli::run(
        std::env::args_os(),
        &mut io::stdin(),
        &mut stdout,
        &mut io::stderr(),
    )
}
