use clap::Parser;
use make_cbz::cli::{Cli, USAGE_EXIT_CODE, run_cli};
use make_cbz::output::OutputFormatter;
use std::process;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            process::exit(USAGE_EXIT_CODE);
        }
        Err(e) => e.exit(),
    };

    if let Err(e) = run_cli(&cli) {
        OutputFormatter::error(&e.to_string());
        process::exit(e.exit_code());
    }
}
