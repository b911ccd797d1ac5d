//! Plain-text rendering of the chat list and transcript.

use crate::api::{Sender, SourceDocument};
use crate::core::{ChatList, Message, Transcript};
use crate::view::composer::{CitationPanels, Composer};
use chrono::{DateTime, Local, Utc};
use std::fmt::Write;

/// Maximum title length in the chat list.
const TITLE_PREVIEW_LEN: usize = 40;

/// Width of separator rules.
const RULE_WIDTH: usize = 72;

/// Render the chat list with the current chat marked.
#[must_use]
pub fn render_thread_list(list: &ChatList) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  {:<6} {:<17} Title", "ID", "Created");
    let _ = writeln!(out, "{}", "─".repeat(RULE_WIDTH));

    if list.is_loading() {
        let _ = writeln!(out, "  Loading chats...");
        return out;
    }
    if list.threads().is_empty() {
        let _ = writeln!(out, "  (no chats)");
        return out;
    }

    for thread in list.threads() {
        let marker = if list.current_id() == Some(thread.id) {
            '▶'
        } else {
            ' '
        };
        let _ = writeln!(
            out,
            "{marker} {:<6} {:<17} {}",
            thread.id,
            format_local_time(thread.created_at),
            format_title_preview(&thread.title)
        );
    }
    out
}

/// Render the transcript.
///
/// Messages are numbered from 1 so citation panels can be addressed. `link`
/// maps a citation to the URL shown for it.
#[must_use]
pub fn render_transcript<F>(transcript: &Transcript, panels: &CitationPanels, link: F) -> String
where
    F: Fn(&SourceDocument) -> String,
{
    let mut out = String::new();

    if transcript.messages().is_empty() {
        if transcript.is_loading() {
            let _ = writeln!(out, "Loading history...");
        } else if let Some(id) = transcript.thread_id() {
            let _ = writeln!(out, "Start the conversation in chat #{id}...");
        } else {
            let _ = writeln!(out, "Create a chat to get started.");
        }
        return out;
    }

    for (index, message) in transcript.messages().iter().enumerate() {
        render_message(&mut out, index + 1, message, transcript, panels, &link);
    }
    out
}

fn render_message<F>(
    out: &mut String,
    number: usize,
    message: &Message,
    transcript: &Transcript,
    panels: &CitationPanels,
    link: &F,
) where
    F: Fn(&SourceDocument) -> String,
{
    let who = match message.sender {
        Sender::User => "you",
        Sender::Ai => "ai",
    };
    let pending = if transcript.is_placeholder(message.id) {
        " (waiting)"
    } else {
        ""
    };

    let mut lines = message.content.lines();
    let first = lines.next().unwrap_or_default();
    let _ = writeln!(out, "[{number}] {who}{pending}> {first}");
    for line in lines {
        let _ = writeln!(out, "      {line}");
    }

    if message.sender != Sender::Ai || message.sources.is_empty() {
        return;
    }

    if !panels.is_expanded(message.id) {
        let _ = writeln!(out, "      [+] Show {} source(s)", message.sources.len());
        return;
    }

    let _ = writeln!(out, "      [-] Hide sources");
    for source in &message.sources {
        let _ = writeln!(out, "      Source: {} <{}>", source.file_name(), link(source));
        for line in source.content.lines() {
            let _ = writeln!(out, "        {line}");
        }
    }
}

/// Input prompt reflecting the retrieval mode and send state.
#[must_use]
pub fn render_prompt(composer: &Composer, transcript: &Transcript) -> String {
    let tables = if composer.use_tables() { "on" } else { "off" };
    if transcript.is_sending() {
        format!("[tables: {tables}] (sending...) ")
    } else {
        format!("[tables: {tables}] > ")
    }
}

/// Format UTC time as local time for display.
fn format_local_time(utc: DateTime<Utc>) -> String {
    let local: DateTime<Local> = utc.into();
    local.format("%Y-%m-%d %H:%M").to_string()
}

/// Format title preview, truncating if needed.
fn format_title_preview(title: &str) -> String {
    let first_line = title.lines().next().unwrap_or(title);
    if first_line.chars().count() > TITLE_PREVIEW_LEN {
        let cut: String = first_line.chars().take(TITLE_PREVIEW_LEN).collect();
        format!("{cut}...")
    } else if first_line.is_empty() {
        "(untitled)".to_string()
    } else {
        first_line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChatThread, SendResponse, ServerMessage};
    use chrono::TimeZone;

    fn thread(id: i64, title: &str) -> ChatThread {
        ChatThread {
            id,
            title: title.to_string(),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn link(source: &SourceDocument) -> String {
        format!("http://localhost:8000/files/{}", source.file_name())
    }

    fn answered_transcript() -> Transcript {
        let mut transcript = Transcript::new();
        let ticket = transcript.begin_load(1);
        transcript.finish_load(
            &ticket,
            Some(vec![ServerMessage {
                id: 1,
                content: "earlier".to_string(),
                sender: Sender::User,
                timestamp: None,
                source_documents: None,
            }]),
        );
        let pending = transcript.begin_send(1, "hello", false).unwrap();
        transcript.complete_send(
            &pending,
            Some(SendResponse {
                id: Some(9),
                content: "answer".to_string(),
                timestamp: None,
                source_documents: Some(vec![SourceDocument {
                    filepath: "/a/b.pdf".to_string(),
                    content: "excerpt".to_string(),
                }]),
            }),
        );
        transcript
    }

    #[test]
    fn thread_list_marks_current() {
        let mut list = ChatList::new();
        list.apply_fetched(vec![thread(2, "second"), thread(1, "first")]);

        let out = render_thread_list(&list);
        assert!(out.contains("▶ 2"));
        assert!(out.contains("  1"));
        assert!(out.contains("second"));
    }

    #[test]
    fn thread_list_loading_and_empty() {
        let mut list = ChatList::new();
        assert!(render_thread_list(&list).contains("(no chats)"));

        list.set_loading(true);
        assert!(render_thread_list(&list).contains("Loading chats..."));
    }

    #[test]
    fn empty_transcript_hint() {
        let mut transcript = Transcript::new();
        let panels = CitationPanels::new();
        assert!(render_transcript(&transcript, &panels, link).contains("Create a chat"));

        let ticket = transcript.begin_load(5);
        assert!(render_transcript(&transcript, &panels, link).contains("Loading history"));

        transcript.finish_load(&ticket, Some(vec![]));
        assert!(render_transcript(&transcript, &panels, link).contains("chat #5"));
    }

    #[test]
    fn citations_collapsed_by_default() {
        let transcript = answered_transcript();
        let panels = CitationPanels::new();
        let out = render_transcript(&transcript, &panels, link);

        assert!(out.contains("[3] ai> answer"));
        assert!(out.contains("[+] Show 1 source(s)"));
        assert!(!out.contains("excerpt"));
    }

    #[test]
    fn expanded_citations_show_link_and_excerpt() {
        let transcript = answered_transcript();
        let mut panels = CitationPanels::new();
        panels.toggle(transcript.messages()[2].id);

        let out = render_transcript(&transcript, &panels, link);
        assert!(out.contains("[-] Hide sources"));
        assert!(out.contains("Source: b.pdf <http://localhost:8000/files/b.pdf>"));
        assert!(out.contains("excerpt"));
    }

    #[test]
    fn placeholder_is_marked_waiting() {
        let mut transcript = Transcript::new();
        let ticket = transcript.begin_load(1);
        transcript.finish_load(&ticket, Some(vec![]));
        transcript.begin_send(1, "hello", false).unwrap();

        let out = render_transcript(&transcript, &CitationPanels::new(), link);
        assert!(out.contains("[1] you> hello"));
        assert!(out.contains("[2] ai (waiting)> ..."));
    }

    #[test]
    fn prompt_shows_mode_and_sending() {
        let mut composer = Composer::new(true);
        let mut transcript = Transcript::new();
        assert_eq!(render_prompt(&composer, &transcript), "[tables: on] > ");

        composer.toggle_tables();
        let ticket = transcript.begin_load(1);
        transcript.finish_load(&ticket, Some(vec![]));
        transcript.begin_send(1, "x", false).unwrap();
        assert_eq!(
            render_prompt(&composer, &transcript),
            "[tables: off] (sending...) "
        );
    }

    #[test]
    fn title_preview_truncates_long_titles() {
        let long = "x".repeat(100);
        let preview = format_title_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), TITLE_PREVIEW_LEN + 3);
    }

    #[test]
    fn title_preview_handles_multibyte() {
        let title = "Новый чат ".repeat(10);
        let preview = format_title_preview(&title);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn title_preview_empty() {
        assert_eq!(format_title_preview(""), "(untitled)");
    }
}
