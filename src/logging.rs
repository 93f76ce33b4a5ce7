use tracing_subscriber::EnvFilter;

/// Installs the stderr log subscriber. `RUST_LOG` takes precedence over the
/// level picked from `-v`/`-q`.
pub fn init(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ollama_toolkit={level},otk={level},ollama_tool={level}")));

    // stdout carries model output only
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
