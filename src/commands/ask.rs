use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args};
use owo_colors::OwoColorize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{self, Overrides, Settings, parse_param};
use crate::logging;
use crate::ollama::attach::{attach_image, ensure_files_exist, inline_files, load_image_base64};
use crate::ollama::{
    ChatRequest, Conversation, GenerateRequest, Message, OllamaClient, OllamaError,
};

use super::{describe_error, models, version_line};

#[derive(Debug, Args, Clone)]
pub struct AskArgs {
    /// Prompt text; starts an interactive session when omitted
    pub prompt: Option<String>,
    /// Model name
    #[arg(short, long)]
    pub model: Option<String>,
    /// Server base URL [default: http://localhost:11434]
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,
    /// Wait for the full response instead of streaming it
    #[arg(long)]
    pub no_stream: bool,
    /// Image to attach (repeatable; chat uses only the first)
    #[arg(short = 'i', long = "image", value_name = "PATH")]
    pub images: Vec<PathBuf>,
    /// Text file to append to the prompt (repeatable)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,
    /// List available models and exit
    #[arg(long)]
    pub list_models: bool,
    /// Use the chat endpoint
    #[arg(long)]
    pub chat: bool,
    /// Extra request field forwarded as-is (repeatable)
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, Value)>,
    /// Profile from the config file
    #[arg(long)]
    pub profile: Option<String>,
    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    #[arg(short, long)]
    pub quiet: bool,
    /// Print version and build metadata
    #[arg(long)]
    pub version: bool,
}

pub fn run(args: AskArgs) -> Result<(), String> {
    if args.version {
        println!("{}", version_line("ollama-tool"));
        return Ok(());
    }
    logging::init(args.verbose, args.quiet);

    let settings = config::resolve(
        Overrides {
            model: args.model.clone(),
            base_url: args.url.clone(),
            no_stream: args.no_stream,
            chat: args.chat,
            timeout: args.timeout,
            params: args.params.clone(),
        },
        args.profile.as_deref(),
    )?;
    debug!(?settings, "resolved settings");

    ensure_files_exist(&args.images).map_err(|err| err.to_string())?;
    ensure_files_exist(&args.files).map_err(|err| err.to_string())?;

    let client = OllamaClient::with_timeout(&settings.base_url, &settings.model, settings.timeout)
        .map_err(|err| err.to_string())?;

    if args.list_models {
        return models::list(&client, &mut io::stdout().lock());
    }

    let attachments = Attachments {
        images: args.images,
        files: args.files,
    };
    let session = Session {
        client: &client,
        settings: &settings,
        styled: io::stdout().is_terminal(),
    };

    match args.prompt {
        Some(prompt) => {
            let mut out = io::stdout().lock();
            if settings.chat {
                let mut history = Conversation::new();
                session.chat_turn(&mut history, &prompt, &attachments, &mut out)?;
            } else {
                session.generate_once(&prompt, &attachments, &mut out)?;
            }
            Ok(())
        }
        None => {
            install_interrupt_handler()?;
            session.interactive(attachments, &mut io::stdin().lock(), &mut io::stdout().lock())
        }
    }
}

/// Ctrl-C in the prompt loop prints a notice and exits with status 0. A reply
/// still streaming is dropped; there is no other state to clean up.
fn install_interrupt_handler() -> Result<(), String> {
    ctrlc::set_handler(|| {
        eprintln!("\nInterrupted");
        process::exit(0);
    })
    .map_err(|err| format!("Failed to set Ctrl+C handler: {err}"))
}

/// Images and files given on the command line.
#[derive(Debug, Default)]
struct Attachments {
    images: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

struct Session<'a> {
    client: &'a OllamaClient,
    settings: &'a Settings,
    /// Colour the prompt labels.
    styled: bool,
}

impl Session<'_> {
    fn fail(&self, err: OllamaError) -> String {
        describe_error(&err, self.client.base_url())
    }

    fn generate_once<W: Write>(
        &self,
        prompt: &str,
        attachments: &Attachments,
        out: &mut W,
    ) -> Result<String, String> {
        let prompt = inline_files(prompt, &attachments.files).map_err(|err| self.fail(err))?;
        let mut request = GenerateRequest::new(prompt)
            .model(&self.settings.model)
            .stream(self.settings.stream)
            .params(self.settings.params.clone());
        for path in &attachments.images {
            request = request.image(load_image_base64(path).map_err(|err| self.fail(err))?);
        }
        self.client
            .generate_to(&request, out)
            .map_err(|err| self.fail(err))
    }

    /// Sends one user turn. On success the reply is appended to `history`;
    /// on failure the history is left as it was.
    fn chat_turn<W: Write>(
        &self,
        history: &mut Conversation,
        prompt: &str,
        attachments: &Attachments,
        out: &mut W,
    ) -> Result<String, String> {
        let prompt = inline_files(prompt, &attachments.files).map_err(|err| self.fail(err))?;
        let mut messages = history.clone();
        messages.push(Message::user(prompt));
        attach_image(&mut messages, &attachments.images).map_err(|err| self.fail(err))?;

        let request = ChatRequest::new(messages)
            .model(&self.settings.model)
            .stream(self.settings.stream)
            .params(self.settings.params.clone());
        let reply = self
            .client
            .chat_to(&request, out)
            .map_err(|err| self.fail(err))?;

        *history = request.messages;
        history.push(Message::assistant(reply.clone()));
        Ok(reply)
    }

    /// Line-based prompt loop. Attachments go with the first prompt only.
    fn interactive<R: BufRead, W: Write>(
        &self,
        mut attachments: Attachments,
        input: &mut R,
        out: &mut W,
    ) -> Result<(), String> {
        let styled = self.styled;
        let write_err = |err: io::Error| format!("Failed to write to stdout: {err}");

        writeln!(
            out,
            "Entering Ollama interactive mode (model: {}, URL: {})",
            self.settings.model,
            self.client.base_url()
        )
        .map_err(write_err)?;
        writeln!(out, "Type 'quit' or 'exit' to leave, '!models' to list models")
            .map_err(write_err)?;

        let label = if self.settings.chat { "User: " } else { "> " };
        let mut history = Conversation::new();
        let mut line = String::new();

        loop {
            if styled {
                write!(out, "\n{}", label.bold().green()).map_err(write_err)?;
            } else {
                write!(out, "\n{label}").map_err(write_err)?;
            }
            out.flush().map_err(write_err)?;

            line.clear();
            let read = input
                .read_line(&mut line)
                .map_err(|err| format!("Failed to read input: {err}"))?;
            if read == 0 {
                info!("input closed, leaving interactive mode");
                writeln!(out).map_err(write_err)?;
                return Ok(());
            }

            let prompt = line.trim();
            match prompt.to_lowercase().as_str() {
                "quit" | "exit" => return Ok(()),
                "!models" => {
                    writeln!(out).map_err(write_err)?;
                    if let Err(message) = models::list(self.client, out) {
                        eprintln!("{message}");
                    }
                    continue;
                }
                "" => continue,
                _ => {}
            }

            let turn_attachments = std::mem::take(&mut attachments);
            let result = if self.settings.chat {
                if styled {
                    write!(out, "\n{}", "AI: ".bold().cyan()).map_err(write_err)?;
                } else {
                    write!(out, "\nAI: ").map_err(write_err)?;
                }
                self.chat_turn(&mut history, prompt, &turn_attachments, out)
            } else {
                self.generate_once(prompt, &turn_attachments, out)
            };

            if let Err(message) = result {
                eprintln!("\n{message}");
            }
        }
    }
}
