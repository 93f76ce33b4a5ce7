//! Command implementations shared by the `otk` and `ollama-tool` binaries.

pub mod ask;
pub mod config;
pub mod models;

use crate::ollama::OllamaError;

/// Version line with the build metadata embedded by `build.rs`.
pub fn version_line(bin: &str) -> String {
    format!(
        "{bin} {} (commit: {}, built: {})",
        env!("CARGO_PKG_VERSION"),
        env!("OTK_GIT_SHA"),
        env!("OTK_BUILD_TS")
    )
}

/// Renders a client error for the terminal, with hints for server-side failures.
pub fn describe_error(err: &OllamaError, base_url: &str) -> String {
    match err {
        OllamaError::Transport { .. } => format!(
            "{err}\n\nPossible fixes:\n  1. Close other programs to free memory\n  2. Try a smaller model\n  3. Restart the Ollama server and check its logs"
        ),
        OllamaError::Request(source) if source.is_connect() => {
            format!("{err}\n\nIs the Ollama server running at {base_url}?")
        }
        _ => err.to_string(),
    }
}
