use clap::{Args, Subcommand};
use serde_json::json;

use crate::config::{self, Overrides};

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ConfigSubcommand {
    /// Validate the config file and optionally one profile
    Check {
        #[arg(long)]
        profile: Option<String>,
    },
    /// Print the settings a request would use, as JSON
    Show {
        #[arg(long)]
        profile: Option<String>,
    },
}

pub fn run(args: ConfigArgs) -> Result<(), String> {
    match args.command {
        ConfigSubcommand::Check { profile } => {
            let path = config::validate_config(profile.as_deref())?;
            println!("config OK: {}", path.display());
            Ok(())
        }
        ConfigSubcommand::Show { profile } => {
            let settings = config::resolve(Overrides::default(), profile.as_deref())?;
            let body = json!({
                "base_url": settings.base_url,
                "model": settings.model,
                "stream": settings.stream,
                "chat": settings.chat,
                "timeout_secs": settings.timeout.map(|timeout| timeout.as_secs()),
                "params": settings.params,
            });
            let text = serde_json::to_string_pretty(&body)
                .map_err(|err| format!("Failed to render settings: {err}"))?;
            println!("{text}");
            Ok(())
        }
    }
}
