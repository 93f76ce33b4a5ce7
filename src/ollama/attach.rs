//! Image and file attachments for prompts.

use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use crate::ollama::error::{OllamaError, Result};
use crate::ollama::types::{Conversation, Message};

/// Prompt used when an image has to travel in a message of its own.
pub const DEFAULT_IMAGE_PROMPT: &str = "please analyze this image";

/// Fails with [`OllamaError::MissingFile`] on the first path that does not exist.
pub fn ensure_files_exist<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        if !path.exists() {
            return Err(OllamaError::MissingFile {
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    ensure_files_exist(&[path])?;
    fs::read(path).map_err(|source| OllamaError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads an image fully and returns its standard base64 encoding.
pub fn load_image_base64(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let bytes = read_file(path)?;
    match image::guess_format(&bytes) {
        Ok(format) => debug!(path = %path.display(), ?format, bytes = bytes.len(), "loaded image"),
        Err(_) => warn!(
            path = %path.display(),
            "file does not look like a known image format, attaching anyway"
        ),
    }
    Ok(STANDARD.encode(&bytes))
}

/// Attaches the first of `images` to `conversation`.
///
/// The image goes on the last message when that message is from the user;
/// otherwise a new user message carrying [`DEFAULT_IMAGE_PROMPT`] is appended.
/// Only one image is supported per call; the rest are ignored.
pub fn attach_image<P: AsRef<Path>>(conversation: &mut Conversation, images: &[P]) -> Result<()> {
    let Some(first) = images.first() else {
        return Ok(());
    };
    if images.len() > 1 {
        debug!(ignored = images.len() - 1, "only the first image is attached to chat");
    }

    let encoded = load_image_base64(first)?;
    match conversation.last_mut() {
        Some(last) if last.is_user() => {
            last.images.get_or_insert_with(Vec::new).push(encoded);
        }
        _ => {
            let mut message = Message::user(DEFAULT_IMAGE_PROMPT);
            message.images = Some(vec![encoded]);
            conversation.push(message);
        }
    }
    Ok(())
}

/// Appends the text of each file to `prompt`, each under a header naming it.
/// Non UTF-8 bytes are replaced.
pub fn inline_files<P: AsRef<Path>>(prompt: &str, files: &[P]) -> Result<String> {
    let mut combined = prompt.to_string();
    for path in files {
        let path = path.as_ref();
        let bytes = read_file(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!(file = %name, bytes = bytes.len(), "inlining file into prompt");

        combined.push_str("\n\n--- ");
        combined.push_str(&name);
        combined.push_str(" ---\n");
        combined.push_str(&String::from_utf8_lossy(&bytes));
    }
    Ok(combined)
}
