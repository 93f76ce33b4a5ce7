use std::process;

use clap::Parser;
use ollama_toolkit::commands::ask::{self, AskArgs};

#[derive(Debug, Parser)]
#[command(
    name = "ollama-tool",
    about = "Call Ollama models from the command line",
    disable_version_flag = true
)]
struct Cli {
    #[command(flatten)]
    ask: AskArgs,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = ask::run(cli.ask) {
        eprintln!("{err}");
        process::exit(1);
    }
}
