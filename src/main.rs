use std::io;
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use ollama_toolkit::commands::ask::{self, AskArgs};
use ollama_toolkit::commands::config::{self, ConfigArgs};
use ollama_toolkit::commands::models::{self, ModelsArgs};

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  otk ask --model qwen3 \"Why is the sky blue?\"\n  otk ask --chat --image photo.png \"What is in this picture?\"\n  otk ask --chat\n  otk models --url http://gpu-box:11434\n  otk config check --profile local\n  otk completion bash > ~/.local/share/bash-completion/completions/otk";

const ASK_HELP_EXAMPLES: &str = "Examples:\n  otk ask \"Summarize this\" --file notes.txt\n  otk ask --no-stream --param temperature=0.2 \"Name three rivers\"\n  otk ask --chat --model llava \"Describe it\" --image cat.jpg";

#[derive(Debug, Parser)]
#[command(
    name = "otk",
    about = "Command-line tools for Ollama servers",
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Generate text or chat with a model", after_help = ASK_HELP_EXAMPLES)]
    Ask(AskArgs),
    #[command(about = "List models available on the server")]
    Models(ModelsArgs),
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "otk", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "otk", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "otk", &mut io::stdout()),
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ask(args) => ask::run(args),
        Commands::Models(args) => models::run(args),
        Commands::Config(args) => config::run(args),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }
}
