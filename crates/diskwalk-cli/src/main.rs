use clap::Parser;
use diskwalk_cli::{is_unknown_format, run, Cli};
use std::io::{self, IsTerminal};
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();

    let stdout = io::stdout();
    let is_terminal = stdout.is_terminal();
    match run(&cli, &mut stdout.lock(), is_terminal) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) if is_unknown_format(&err) => {
            println!("Unknown file system.");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err),
    }
}
