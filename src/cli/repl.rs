//! `ragchat chat`: interactive session.
//!
//! Plain lines are sent to the current chat; lines starting with `/` are
//! commands. The screen is redrawn from [`ClientEvent`]s after each command.
//! A send draws the question and the placeholder before the answer arrives.

use crate::api::{AuthMode, ChatBackend, SendResponse};
use crate::cli::{auth, connect};
use crate::core::{ChatClient, ClientEvent, PendingSend, SendOutcome};
use crate::error::{Error, Result};
use crate::storage::TokenStore;
use crate::view::{
    CitationPanels, Composer, LoginForm, render_prompt, render_thread_list, render_transcript,
};
use std::collections::VecDeque;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::debug;

const HELP: &str = "\
Commands:
  <text>          send a message to the current chat
  /new [title]    create a chat
  /delete <id>    delete a chat
  /select <id>    switch to a chat
  /tables         toggle table retrieval
  /sources <n>    show or hide the sources of message n
  /chats          list chats
  /show           redraw the transcript
  /logout         log out
  /quit           exit";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    New(Option<String>),
    Delete(i64),
    Select(i64),
    Tables,
    Sources(usize),
    Chats,
    Show,
    Logout,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for unknown commands or bad arguments.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Send(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "new" => Command::New((!arg.is_empty()).then(|| arg.to_string())),
        "delete" => Command::Delete(parse_arg(name, arg)?),
        "select" => Command::Select(parse_arg(name, arg)?),
        "tables" => Command::Tables,
        "sources" => Command::Sources(parse_arg(name, arg)?),
        "chats" => Command::Chats,
        "show" => Command::Show,
        "logout" => Command::Logout,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(Error::InvalidInput(format!("unknown command /{other}"))),
    };
    Ok(Some(command))
}

fn parse_arg<T: std::str::FromStr>(name: &str, arg: &str) -> Result<T> {
    arg.parse()
        .map_err(|_| Error::InvalidInput(format!("/{name} needs a number, got {arg:?}")))
}

/// Run the chat command on stdin/stdout.
///
/// # Errors
///
/// Returns an error if the configuration or token store is unusable.
pub async fn run() -> Result<()> {
    let (config, mut client) = connect()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = std::io::stdout();
    drive(&mut client, config.chat.use_tables, &mut lines, &mut out).await
}

/// Interactive loop over `lines`, drawing to `out`. Ends on `/quit` or EOF.
///
/// # Errors
///
/// Returns an error if reading input, writing output, or the token store
/// fails. Backend failures are shown and the loop continues.
pub async fn drive<B, S, R, W>(
    client: &mut ChatClient<B, S>,
    use_tables: bool,
    lines: &mut Lines<R>,
    out: &mut W,
) -> Result<()>
where
    B: ChatBackend,
    S: TokenStore,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut events = client.subscribe();
    let mut composer = Composer::new(use_tables);
    let mut panels = CitationPanels::new();
    let mut input = Input::new(lines);

    if client.restore_session()? {
        if let Err(error) = refresh_threads(client, out).await {
            writeln!(out, "error: {error}")?;
        }
    }
    if !client.session().is_authenticated() && !login(client, &mut input, out).await? {
        return Ok(());
    }
    drain(&mut events);
    redraw(client, &panels, out, Redraw::all())?;

    loop {
        write!(out, "{}", render_prompt(&composer, client.transcript()))?;
        out.flush()?;

        let Some(line) = input.next_line().await? else {
            break;
        };
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                writeln!(out, "error: {error}")?;
                continue;
            }
        };
        debug!(?command, "repl command");

        match execute(client, &mut composer, &mut panels, command, &mut input, out).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(error) => writeln!(out, "error: {error}")?,
        }

        let changed = drain(&mut events);
        if !client.session().is_authenticated() {
            panels.clear();
            writeln!(out, "Session ended.")?;
            if !login(client, &mut input, out).await? {
                break;
            }
            drain(&mut events);
            redraw(client, &panels, out, Redraw::all())?;
            continue;
        }
        if changed.selection {
            panels.clear();
        }
        redraw(client, &panels, out, changed)?;
    }
    Ok(())
}

/// Input lines. Lines typed while an answer is outstanding wait in the
/// backlog until it arrives.
struct Input<'a, R> {
    lines: &'a mut Lines<R>,
    backlog: VecDeque<String>,
    closed: bool,
}

impl<'a, R: AsyncBufRead + Unpin> Input<'a, R> {
    fn new(lines: &'a mut Lines<R>) -> Self {
        Self {
            lines,
            backlog: VecDeque::new(),
            closed: false,
        }
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.backlog.pop_front() {
            return Ok(Some(line));
        }
        if self.closed {
            return Ok(None);
        }
        let line = self.lines.next_line().await?;
        self.closed = line.is_none();
        Ok(line)
    }
}

enum Flow {
    Continue,
    Quit,
}

async fn execute<B, S, R, W>(
    client: &mut ChatClient<B, S>,
    composer: &mut Composer,
    panels: &mut CitationPanels,
    command: Command,
    input: &mut Input<'_, R>,
    out: &mut W,
) -> Result<Flow>
where
    B: ChatBackend,
    S: TokenStore,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    match command {
        Command::Send(text) => {
            let pending = client.begin_send(&text, composer.use_tables())?;
            redraw(client, panels, out, Redraw::transcript())?;
            write!(out, "{}", render_prompt(composer, client.transcript()))?;
            out.flush()?;

            let result = wait_for_reply(client, &pending, composer, input, out).await?;
            match client.finish_send(&pending, result).await? {
                SendOutcome::Failed { error, .. } => debug!(%error, "send failed"),
                SendOutcome::Answered(_) | SendOutcome::Stale => {}
            }
        }
        Command::New(title) => {
            client.create_thread(title.as_deref()).await?;
        }
        Command::Delete(id) => client.delete_thread(id).await?,
        Command::Select(id) => client.select_thread(id).await?,
        Command::Tables => {
            let on = composer.toggle_tables();
            writeln!(out, "Table retrieval {}.", if on { "on" } else { "off" })?;
        }
        Command::Sources(n) => {
            let message = n
                .checked_sub(1)
                .and_then(|index| client.transcript().messages().get(index))
                .ok_or_else(|| Error::InvalidInput(format!("no message {n}")))?;
            if message.sources.is_empty() {
                writeln!(out, "Message {n} has no sources.")?;
            } else {
                panels.toggle(message.id);
                redraw(client, panels, out, Redraw::transcript())?;
            }
        }
        Command::Chats => refresh_threads(client, out).await?,
        Command::Show => redraw(client, panels, out, Redraw::transcript())?,
        Command::Logout => {
            client.logout()?;
            writeln!(out, "Logged out.")?;
        }
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

/// Wait for the answer to `pending` while still reading input.
///
/// Further messages are refused while the answer is outstanding; other lines
/// go to the backlog.
async fn wait_for_reply<B, S, R, W>(
    client: &ChatClient<B, S>,
    pending: &PendingSend,
    composer: &mut Composer,
    input: &mut Input<'_, R>,
    out: &mut W,
) -> Result<Result<SendResponse>>
where
    B: ChatBackend,
    S: TokenStore,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let reply = client.dispatch_send(pending);
    tokio::pin!(reply);

    while !input.closed {
        tokio::select! {
            biased;
            line = input.lines.next_line() => {
                let Some(line) = line? else {
                    input.closed = true;
                    break;
                };
                if let Ok(Some(Command::Send(text))) = parse_command(&line) {
                    composer.set_input(&text);
                    let busy = !composer.can_send(client.transcript());
                    composer.take_input();
                    if busy {
                        writeln!(out, "A message is already being sent.")?;
                        write!(out, "{}", render_prompt(composer, client.transcript()))?;
                        out.flush()?;
                        continue;
                    }
                }
                input.backlog.push_back(line);
            }
            result = &mut reply => return Ok(result),
        }
    }
    Ok(reply.await)
}

/// Reload the chat list, showing the loading indicator while it runs.
async fn refresh_threads<B, S, W>(client: &mut ChatClient<B, S>, out: &mut W) -> Result<()>
where
    B: ChatBackend,
    S: TokenStore,
    W: Write,
{
    client.begin_fetch();
    write!(out, "{}", render_thread_list(client.chats()))?;
    out.flush()?;
    client.fetch_threads().await
}

/// Prompt for credentials until login succeeds. Returns `false` on EOF or
/// `/quit`.
async fn login<B, S, R, W>(
    client: &mut ChatClient<B, S>,
    input: &mut Input<'_, R>,
    out: &mut W,
) -> Result<bool>
where
    B: ChatBackend,
    S: TokenStore,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut form = LoginForm::new(AuthMode::Login);
    loop {
        let other = match form.mode() {
            AuthMode::Login => "register",
            AuthMode::Register => "login",
        };
        writeln!(out, "{} (type /{other} to switch, /quit to exit)", form.title())?;
        if let Some(error) = form.error() {
            writeln!(out, "error: {error}")?;
        }

        write!(out, "username: ")?;
        out.flush()?;
        let Some(username) = input.next_line().await? else {
            return Ok(false);
        };
        match username.trim() {
            "/quit" | "/exit" => return Ok(false),
            "/register" | "/login" => {
                form.toggle_mode();
                continue;
            }
            _ => {}
        }

        write!(out, "password: ")?;
        out.flush()?;
        let Some(password) = input.next_line().await? else {
            return Ok(false);
        };

        form.username = username;
        form.password = password;
        if auth::submit(client, &mut form).await.is_ok() {
            writeln!(out, "Welcome, {}.", form.username.trim())?;
            return Ok(true);
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Redraw {
    threads: bool,
    selection: bool,
    transcript: bool,
}

impl Redraw {
    fn all() -> Self {
        Self {
            threads: true,
            selection: true,
            transcript: true,
        }
    }

    fn transcript() -> Self {
        Self {
            transcript: true,
            ..Self::default()
        }
    }
}

/// Collect pending events into what needs redrawing.
fn drain(events: &mut Receiver<ClientEvent>) -> Redraw {
    let mut redraw = Redraw::default();
    loop {
        match events.try_recv() {
            Ok(ClientEvent::ThreadsChanged) => redraw.threads = true,
            Ok(ClientEvent::SelectionChanged) => {
                redraw.selection = true;
                redraw.transcript = true;
            }
            Ok(ClientEvent::TranscriptChanged) => redraw.transcript = true,
            Ok(ClientEvent::SessionChanged | ClientEvent::Loading(_)) => {}
            Err(TryRecvError::Lagged(_)) => redraw = Redraw::all(),
            Err(TryRecvError::Empty | TryRecvError::Closed) => return redraw,
        }
    }
}

fn redraw<B, S, W>(
    client: &ChatClient<B, S>,
    panels: &CitationPanels,
    out: &mut W,
    what: Redraw,
) -> Result<()>
where
    B: ChatBackend,
    S: TokenStore,
    W: Write,
{
    if what.threads || what.selection {
        write!(out, "{}", render_thread_list(client.chats()))?;
    }
    if what.transcript {
        if let Some(thread) = client.chats().current_thread() {
            writeln!(out, "── #{} {}", thread.id, thread.title)?;
        }
        write!(
            out,
            "{}",
            render_transcript(client.transcript(), panels, |s| client.source_url(s))
        )?;
    }
    Ok(())
}
