use std::{
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};
use clap::Parser;
use client_core::{
    load_settings, ChatActions, ChatPage, ComposeField, DialogState, DialogWidget,
    FileCookieStore, FixedFocus, HttpSseConnector, IdentityResolver, MessageList,
    NotificationCenter, PageCapabilities, RenderSink, UiEvent,
};
use shared::domain::NotificationPermission;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const GLYPHS: [&str; 8] = ["😀", "😂", "😍", "👍", "🙏", "🎉", "🔥", "❤️"];
const SCROLLBACK: usize = 200;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    server_url: Option<String>,
    /// Display name to register before subscribing.
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    cookie_file: Option<PathBuf>,
    /// Treat the terminal as focused, which suppresses notifications.
    #[arg(long)]
    focused: bool,
}

/// Prints each message as it arrives and keeps recent ones for `/history`.
struct TerminalFeed {
    scrollback: MessageList,
}

impl TerminalFeed {
    fn new() -> Self {
        Self {
            scrollback: MessageList::bounded(SCROLLBACK),
        }
    }

    fn print_history(&self) {
        for markup in self.scrollback.snapshot().iter().rev() {
            println!("{markup}");
        }
    }
}

impl RenderSink for TerminalFeed {
    fn prepend(&self, markup: &str) {
        let markup = markup.trim_end();
        println!("{markup}");
        self.scrollback.prepend(markup);
    }
}

struct TerminalNotifications {
    permission: NotificationPermission,
}

impl NotificationCenter for TerminalNotifications {
    fn is_supported(&self) -> bool {
        true
    }

    fn permission(&self) -> Result<NotificationPermission> {
        Ok(self.permission)
    }

    fn show(&self, title: &str, body: &str) -> Result<()> {
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "\x07[{title}] {body}")?;
        Ok(())
    }
}

#[derive(Default)]
struct DraftLine {
    text: Mutex<String>,
}

impl DraftLine {
    fn take(&self) -> String {
        match self.text.lock() {
            Ok(mut text) => std::mem::take(&mut *text),
            Err(_) => String::new(),
        }
    }
}

impl ComposeField for DraftLine {
    fn value(&self) -> String {
        self.text.lock().map(|text| text.clone()).unwrap_or_default()
    }

    fn set_value(&self, value: String) {
        if let Ok(mut text) = self.text.lock() {
            *text = value;
        }
    }

    fn focus(&self) {
        let draft = self.value();
        if !draft.is_empty() {
            eprintln!("draft: {draft}");
        }
    }
}

struct GlyphMenu;

impl DialogWidget for GlyphMenu {
    fn show_modal(&self) {
        let menu = GLYPHS
            .iter()
            .enumerate()
            .map(|(index, glyph)| format!("{}:{glyph}", index + 1))
            .collect::<Vec<_>>()
            .join("  ");
        eprintln!("pick a glyph (number or literal, empty line cancels): {menu}");
    }

    fn close(&self) {}
}

fn pick_glyph(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.parse::<usize>() {
        Ok(index) if (1..=GLYPHS.len()).contains(&index) => Some(GLYPHS[index - 1].to_string()),
        _ => Some(line.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Quit,
    History,
    Ui(UiEvent),
    SetName(String),
    Send(String),
}

/// `/quit` works in every mode; while the picker is open any other line
/// picks a glyph.
fn parse_line(line: &str, picker_open: bool) -> Command {
    let trimmed = line.trim();
    if trimmed == "/quit" {
        return Command::Quit;
    }
    if picker_open {
        return match pick_glyph(line) {
            Some(glyph) => Command::Ui(UiEvent::GlyphSelected(glyph)),
            None => Command::Ui(UiEvent::PickerIconClicked),
        };
    }
    match trimmed {
        "/emoji" => Command::Ui(UiEvent::PickerIconClicked),
        "/history" => Command::History,
        _ => match trimmed.strip_prefix("/name ") {
            Some(name) => Command::SetName(name.to_string()),
            None => Command::Send(line.to_string()),
        },
    }
}

/// Returns `false` once the user asks to quit.
async fn handle_line(
    line: &str,
    page: &mut ChatPage,
    actions: &ChatActions,
    draft: &DraftLine,
    feed: &TerminalFeed,
) -> bool {
    match parse_line(line, page.picker_state() == DialogState::Open) {
        Command::Quit => return false,
        Command::History => feed.print_history(),
        Command::Ui(event) => {
            page.handle_ui(event);
        }
        Command::SetName(name) => {
            if let Err(err) = actions.set_name(&name).await {
                warn!("failed to set display name: {err}");
            }
        }
        Command::Send(line) => {
            let contents = format!("{}{}", draft.take(), line);
            if let Err(err) = actions.send_message(&contents).await {
                warn!("failed to send message: {err}");
                draft.set_value(contents);
            }
        }
    }
    true
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(cookie_file) = args.cookie_file {
        settings.cookie_file = cookie_file;
    }

    let cookies = Arc::new(FileCookieStore::open(&settings.cookie_file)?);
    info!(path = %cookies.path().display(), "cookie jar ready");
    let identity = IdentityResolver::new(cookies.clone());
    let actions = ChatActions::new(&settings, identity)?;
    if let Some(name) = args.name.as_deref() {
        actions.set_name(name).await?;
    }

    let draft = Arc::new(DraftLine::default());
    let feed = Arc::new(TerminalFeed::new());
    let capabilities = PageCapabilities {
        cookies,
        renderer: feed.clone(),
        notifications: Arc::new(TerminalNotifications {
            permission: settings.notifications,
        }),
        document: Arc::new(FixedFocus(args.focused)),
        compose: draft.clone(),
        dialog: Arc::new(GlyphMenu),
    };
    let stream_settings = settings
        .stream_settings()
        .map_err(|err| anyhow!("invalid server url '{}': {err}", settings.server_url))?;

    let mut page = ChatPage::load(
        capabilities,
        stream_settings,
        Arc::new(HttpSseConnector::new()),
    )?;
    page.on_document_loaded();
    if page.identity().sender_name().is_none() {
        eprintln!("no display name yet; type `/name <name>` before sending");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&line, &mut page, &actions, &draft, &feed).await {
                    break;
                }
            }
        }
    }

    let stats = page.unload().await;
    info!(?stats, "chat session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_is_honored_while_picker_is_open() {
        assert_eq!(parse_line("/quit", true), Command::Quit);
        assert_eq!(parse_line(" /quit ", false), Command::Quit);
    }

    #[test]
    fn open_picker_takes_glyphs() {
        assert_eq!(
            parse_line("3", true),
            Command::Ui(UiEvent::GlyphSelected("😍".into()))
        );
        assert_eq!(
            parse_line("/emoji", true),
            Command::Ui(UiEvent::GlyphSelected("/emoji".into()))
        );
        assert_eq!(parse_line("  ", true), Command::Ui(UiEvent::PickerIconClicked));
    }

    #[test]
    fn closed_picker_routes_commands_and_messages() {
        assert_eq!(parse_line("/emoji", false), Command::Ui(UiEvent::PickerIconClicked));
        assert_eq!(parse_line("/history", false), Command::History);
        assert_eq!(parse_line("/name ana", false), Command::SetName("ana".into()));
        assert_eq!(parse_line("hi there", false), Command::Send("hi there".into()));
    }

    #[test]
    fn history_keeps_latest_messages() {
        let feed = TerminalFeed::new();
        for index in 0..SCROLLBACK + 5 {
            feed.prepend(&format!("<p>{index}</p>"));
        }

        let kept = feed.scrollback.snapshot();
        assert_eq!(kept.len(), SCROLLBACK);
        assert_eq!(kept[0], format!("<p>{}</p>", SCROLLBACK + 4));
    }
}
