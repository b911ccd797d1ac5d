//! `ragchat source` command implementation.

use crate::api::{ChatBackend, SourceDocument};
use crate::cli::connect;
use crate::core::ChatClient;
use crate::error::Result;
use crate::storage::TokenStore;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Run the source command.
///
/// Downloads the cited file. Writes to `output` when given, otherwise to
/// stdout.
///
/// # Errors
///
/// Returns an error if the file cannot be fetched or written.
pub async fn run(filepath: &str, output: Option<PathBuf>) -> Result<()> {
    let (_, client) = connect()?;
    let source = citation(filepath);

    let bytes = download(&client, &source, output.as_deref()).await?;
    if output.is_none() {
        std::io::stdout().write_all(&bytes)?;
    } else {
        eprintln!("Saved {} ({} bytes)", source.file_name(), bytes.len());
    }
    Ok(())
}

/// Fetch the file a citation points at, saving it to `output` if given.
///
/// # Errors
///
/// Returns an error if the file cannot be fetched or written.
pub async fn download<B: ChatBackend, S: TokenStore>(
    client: &ChatClient<B, S>,
    source: &SourceDocument,
    output: Option<&Path>,
) -> Result<Vec<u8>> {
    let bytes = client.fetch_source(source).await?;
    if let Some(path) = output {
        fs::write(path, &bytes)?;
    }
    Ok(bytes)
}

fn citation(filepath: &str) -> SourceDocument {
    SourceDocument {
        filepath: filepath.to_string(),
        content: String::new(),
    }
}
