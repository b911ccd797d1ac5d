//! `ragchat history` and `ragchat ask`.

use crate::api::ChatBackend;
use crate::cli::{connect, resume};
use crate::core::{ChatClient, SendOutcome, Transcript};
use crate::error::Result;
use crate::storage::TokenStore;
use crate::view::{CitationPanels, render_transcript};
use std::fmt::Write;

/// Run the history command.
///
/// # Errors
///
/// Returns an error if no session is stored, the chat is unknown, or the
/// history cannot be loaded.
pub async fn history(id: i64, sources: bool) -> Result<()> {
    let (_, mut client) = connect()?;
    resume(&mut client).await?;
    client.select_thread(id).await?;

    let panels = if sources {
        expand_all(client.transcript())
    } else {
        CitationPanels::new()
    };
    print!(
        "{}",
        render_transcript(client.transcript(), &panels, |s| client.source_url(s))
    );
    Ok(())
}

/// Run the ask command.
///
/// Prints the answer with its sources expanded.
///
/// # Errors
///
/// Returns an error if no session is stored, the chat is unknown, or the
/// backend failed to answer.
pub async fn ask(id: i64, text: &str, use_tables: Option<bool>) -> Result<()> {
    let (config, mut client) = connect()?;
    resume(&mut client).await?;

    let use_tables = use_tables.unwrap_or(config.chat.use_tables);
    let answer = ask_in_thread(&mut client, id, text, use_tables).await?;
    print!("{answer}");
    Ok(())
}

/// Select `id`, send `text` and render the reply.
///
/// # Errors
///
/// Returns the selection error or the backend failure of the send.
pub async fn ask_in_thread<B: ChatBackend, S: TokenStore>(
    client: &mut ChatClient<B, S>,
    id: i64,
    text: &str,
    use_tables: bool,
) -> Result<String> {
    client.select_thread(id).await?;

    match client.send_message(text, use_tables).await? {
        SendOutcome::Answered(message) => {
            let mut out = message.content.clone();
            out.push('\n');
            for source in &message.sources {
                let _ = writeln!(
                    out,
                    "  Source: {} <{}>",
                    source.file_name(),
                    client.source_url(source)
                );
            }
            Ok(out)
        }
        SendOutcome::Failed { message, error } => {
            eprintln!("{}", message.content);
            Err(error)
        }
        SendOutcome::Stale => Ok(String::new()),
    }
}

fn expand_all(transcript: &Transcript) -> CitationPanels {
    let mut panels = CitationPanels::new();
    for message in transcript.messages() {
        if !message.sources.is_empty() {
            panels.toggle(message.id);
        }
    }
    panels
}
