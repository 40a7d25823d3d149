use std::io;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(err) = real_main() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let matches = shellspec::cli::build_cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    // Prompts go to stderr so stdout stays clean for argv output
    let stdin = io::stdin();
    let mut prompter = shellspec::cli::StdinPrompter::new(stdin.lock(), io::stderr());

    let exit_code = shellspec::cli::drive_command(&matches, &mut prompter)?;
    std::process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "shellspec=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
