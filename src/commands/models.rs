use std::io::{self, Write};

use clap::Args;

use crate::config::{self, Overrides};
use crate::logging;
use crate::ollama::{ModelInfo, OllamaClient};

use super::describe_error;

#[derive(Debug, Args, Clone)]
pub struct ModelsArgs {
    /// Server base URL
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,
    /// Profile from the config file
    #[arg(long)]
    pub profile: Option<String>,
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn run(args: ModelsArgs) -> Result<(), String> {
    logging::init(args.verbose, args.quiet);
    let settings = config::resolve(
        Overrides {
            base_url: args.url,
            ..Overrides::default()
        },
        args.profile.as_deref(),
    )?;
    let client = OllamaClient::with_timeout(&settings.base_url, &settings.model, settings.timeout)
        .map_err(|err| err.to_string())?;
    list(&client, &mut io::stdout().lock())
}

/// Fetches the model list and prints it.
pub fn list<W: Write + ?Sized>(client: &OllamaClient, out: &mut W) -> Result<(), String> {
    let models = client
        .list_models()
        .map_err(|err| describe_error(&err, client.base_url()))?;
    print_models(&models, out).map_err(|err| format!("Failed to write model list: {err}"))
}

pub fn print_models<W: Write + ?Sized>(models: &[ModelInfo], out: &mut W) -> io::Result<()> {
    if models.is_empty() {
        return writeln!(out, "No models found");
    }
    writeln!(out, "Available models:")?;
    for model in models {
        match model.size {
            Some(bytes) => writeln!(out, "- {} ({})", model.name, human_size(bytes))?,
            None => writeln!(out, "- {}", model.name)?,
        }
    }
    Ok(())
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = UNITS[0];
    for candidate in UNITS {
        value /= 1000.0;
        unit = candidate;
        if value < 1000.0 {
            break;
        }
    }
    format!("{value:.1} {unit}")
}
