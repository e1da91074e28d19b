//! The full-screen chat interface: sidebar with searchable conversations,
//! main panel with either the new-chat form or the open transcript, and a
//! single-line input box driving messages and slash commands.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ratatui::{
    backend::CrosstermBackend,
    crossterm::{
        event::{self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseEventKind},
        execute,
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    },
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::debug;

use crate::commands::{parse_input, Command, ParsedInput, HELP_TEXT};
use crate::core::chat_stream::{ChatSession, ChatStreamService, StreamMessage, StreamParams};
use crate::core::gem::GemStore;
use crate::core::models;
use crate::core::session::{SessionEvent, SessionState, View};
use crate::core::transcript::{Transcript, TranscriptStore};
use crate::core::uploads::{self, Attachment};

const SIDEBAR_WIDTH: u16 = 34;
const INPUT_HEIGHT: u16 = 3;

/// Settings for the conversation that will be created on the next first send.
pub struct NewChatDraft {
    pub gem_key: String,
    pub model_id: String,
    pub grounding_requested: bool,
}

struct StreamingTurn {
    stream_id: u64,
    prompt: String,
    acc: String,
}

pub struct ChatAppParams {
    pub gems: GemStore,
    pub store: TranscriptStore,
    pub uploads_dir: PathBuf,
    pub session: SessionState,
    pub draft: NewChatDraft,
    pub api_key: String,
    pub base_url: String,
}

pub struct ChatApp {
    gems: GemStore,
    store: TranscriptStore,
    uploads_dir: PathBuf,
    chats: Vec<(String, Transcript)>,
    session: SessionState,
    draft: NewChatDraft,
    active: Option<ChatSession>,
    input: String,
    notices: Vec<String>,
    streaming: Option<StreamingTurn>,
    scroll_offset: u16,
    auto_scroll: bool,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    stream: ChatStreamService,
    next_stream_id: u64,
    should_quit: bool,
}

impl ChatApp {
    pub fn new(
        params: ChatAppParams,
    ) -> Result<(Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>), Box<dyn std::error::Error>>
    {
        let (stream, rx) = ChatStreamService::new();
        let chats = params.store.list_all()?;
        let app = Self {
            gems: params.gems,
            store: params.store,
            uploads_dir: params.uploads_dir,
            chats,
            session: params.session,
            draft: params.draft,
            active: None,
            input: String::new(),
            notices: Vec::new(),
            streaming: None,
            scroll_offset: 0,
            auto_scroll: true,
            client: reqwest::Client::new(),
            base_url: params.base_url,
            api_key: params.api_key,
            stream,
            next_stream_id: 1,
            should_quit: false,
        };
        Ok((app, rx))
    }

    fn apply_session(&mut self, event: SessionEvent) {
        self.session = std::mem::take(&mut self.session).apply(event);
    }

    fn notice(&mut self, text: impl Into<String>) {
        self.notices.push(text.into());
    }

    /// Sidebar entries surviving the current search filter, in list order.
    fn filtered_chats(&self) -> Vec<usize> {
        (0..self.chats.len())
            .filter(|&i| self.chats[i].1.matches(&self.session.search_query))
            .collect()
    }

    fn reload_chats(&mut self) {
        match self.store.list_all() {
            Ok(chats) => self.chats = chats,
            Err(e) => self.notice(format!("Could not reload chats: {e}")),
        }
    }

    fn handle_submit(&mut self) {
        let input = std::mem::take(&mut self.input);
        if input.trim().is_empty() {
            return;
        }
        self.notices.clear();
        match parse_input(&input) {
            ParsedInput::Message(text) => self.send_message(text.trim().to_string()),
            ParsedInput::Command(command) => self.apply_command(command),
            ParsedInput::Invalid(usage) => self.notice(usage),
        }
    }

    fn apply_command(&mut self, command: Command) {
        // Switching or deleting conversations mid-stream would finalize the
        // in-flight turn against the wrong transcript.
        if self.streaming.is_some()
            && matches!(
                command,
                Command::NewChat | Command::Open(_) | Command::DeleteChat
            )
        {
            self.notice("A response is still streaming; wait for it to finish.");
            return;
        }
        match command {
            Command::NewChat => {
                self.active = None;
                self.apply_session(SessionEvent::StartNewChat);
                self.scroll_offset = 0;
                self.auto_scroll = true;
            }
            Command::Open(n) => self.open_nth(n),
            Command::DeleteChat => self.delete_active_chat(),
            Command::Search(query) => {
                self.apply_session(SessionEvent::SetSearch(query));
            }
            Command::SelectGem(key) => {
                if self.gems.contains(&key) {
                    let name = self.gems.get(&key).map(|g| g.name.clone()).unwrap_or_default();
                    self.draft.gem_key = key;
                    self.notice(format!("Gem for the next chat: {name}"));
                } else {
                    let available = self.gems.keys().collect::<Vec<_>>().join(", ");
                    self.notice(format!("Unknown gem '{key}'. Available: {available}"));
                }
            }
            Command::SelectModel(name) => match models::resolve(&name) {
                Some(id) => {
                    self.draft.model_id = id.to_string();
                    self.notice(format!("Model for the next chat: {}", models::display_name_for(id)));
                }
                None => {
                    let available = models::AVAILABLE_MODELS
                        .iter()
                        .map(|m| m.display_name)
                        .collect::<Vec<_>>()
                        .join(", ");
                    self.notice(format!("Unknown model '{name}'. Available: {available}"));
                }
            },
            Command::ToggleGrounding => {
                self.draft.grounding_requested = !self.draft.grounding_requested;
                if self.draft.grounding_requested && !models::supports_grounding(&self.draft.model_id)
                {
                    self.notice("Grounding is not supported for this model and will stay off.");
                } else {
                    self.notice(format!(
                        "Grounding: {}",
                        if self.draft.grounding_requested { "on" } else { "off" }
                    ));
                }
            }
            Command::Attach(path) => match Attachment::read_from(Path::new(&path)) {
                Ok(attachment) => {
                    self.notice(format!(
                        "Attached {} ({})",
                        attachment.file_name, attachment.mime_type
                    ));
                    self.apply_session(SessionEvent::Attach(attachment));
                }
                Err(e) => self.notice(format!("Could not attach '{path}': {e}")),
            },
            Command::ClearAttachments => {
                self.apply_session(SessionEvent::ClearAttachments);
                self.notice("Cleared pending attachments.");
            }
            Command::ToggleSaveUploads => {
                self.apply_session(SessionEvent::ToggleSaveUploads);
                self.notice(format!(
                    "Save uploads to disk: {}",
                    if self.session.save_uploads { "on" } else { "off" }
                ));
            }
            Command::Help => {
                for line in HELP_TEXT.lines() {
                    self.notice(line.to_string());
                }
            }
            Command::Quit => self.should_quit = true,
        }
    }

    fn open_nth(&mut self, n: usize) {
        let filtered = self.filtered_chats();
        let Some(&index) = n.checked_sub(1).and_then(|i| filtered.get(i)) else {
            self.notice(format!("No chat numbered {n} in the list."));
            return;
        };
        let (id, transcript) = &self.chats[index];
        let id = id.clone();
        self.active = Some(ChatSession::resume(transcript));
        debug!(%id, "opened transcript");
        self.apply_session(SessionEvent::SelectChat(id));
        self.scroll_offset = 0;
        self.auto_scroll = true;
    }

    fn delete_active_chat(&mut self) {
        let Some(id) = self.session.active_chat_id.clone() else {
            self.notice("No active chat to delete.");
            return;
        };
        match self.store.delete(&id) {
            Ok(()) => {
                self.chats.retain(|(chat_id, _)| chat_id != &id);
                self.active = None;
                self.apply_session(SessionEvent::DeleteActiveChat);
                self.notice(format!("Deleted {id}"));
            }
            Err(e) => self.notice(format!("Could not delete {id}: {e}")),
        }
    }

    fn send_message(&mut self, prompt: String) {
        if self.streaming.is_some() {
            self.notice("A response is still streaming; wait for it to finish.");
            return;
        }

        if self.session.view == View::NewChat || self.active.is_none() {
            let Some(gem) = self.gems.get(&self.draft.gem_key) else {
                self.notice(format!("Gem '{}' is not loaded.", self.draft.gem_key));
                return;
            };
            self.active = Some(ChatSession::new(
                self.draft.model_id.clone(),
                self.draft.grounding_requested,
                &gem.prompt,
            ));
        }

        let attachments = self.session.pending_attachments.clone();
        self.apply_session(SessionEvent::ClearAttachments);
        if self.session.save_uploads {
            for attachment in &attachments {
                if let Err(e) = uploads::persist(&self.uploads_dir, attachment) {
                    self.notice(format!("Could not save upload {}: {e}", attachment.file_name));
                }
            }
        }

        let Some(session) = self.active.as_mut() else {
            return;
        };
        let contents = session.push_user_turn(&prompt, &attachments);
        let stream_id = self.next_stream_id;
        self.next_stream_id += 1;

        self.stream.spawn_stream(StreamParams {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: session.model_name().to_string(),
            contents,
            grounding_enabled: session.grounding_enabled(),
            stream_id,
        });
        self.streaming = Some(StreamingTurn {
            stream_id,
            prompt,
            acc: String::new(),
        });
        self.auto_scroll = true;
    }

    fn on_stream_message(&mut self, message: StreamMessage, stream_id: u64) {
        let Some(turn) = self.streaming.as_mut() else {
            return;
        };
        if turn.stream_id != stream_id {
            return;
        }
        match message {
            StreamMessage::Chunk(text) => turn.acc.push_str(&text),
            StreamMessage::Error(text) => {
                // Partial output is discarded; the error becomes the answer.
                turn.acc = text;
            }
            StreamMessage::End => self.finalize_turn(),
        }
    }

    /// Close out the in-flight exchange: record the model turn, persist the
    /// transcript, and move a brand-new conversation into the chat view.
    fn finalize_turn(&mut self) {
        let Some(turn) = self.streaming.take() else {
            return;
        };
        let response = if turn.acc.is_empty() {
            "An error occurred: the model returned no text".to_string()
        } else {
            turn.acc
        };
        let Some(session) = self.active.as_mut() else {
            return;
        };
        session.push_model_turn(&response);
        let api_history = session.export_history();

        match self.session.view {
            View::Chat => {
                let Some(id) = self.session.active_chat_id.clone() else {
                    return;
                };
                let Some(entry) = self.chats.iter_mut().find(|(chat_id, _)| chat_id == &id) else {
                    self.notice(format!("Chat {id} disappeared; starting over."));
                    self.active = None;
                    self.apply_session(SessionEvent::ActiveChatVanished);
                    return;
                };
                entry.1.api_history = api_history;
                entry.1.record_exchange(&turn.prompt, &response);
                let transcript = entry.1.clone();
                if let Err(e) = self.store.save(&id, &transcript) {
                    self.notice(format!("Could not save {id}: {e}"));
                }
                self.reload_chats();
            }
            View::NewChat => {
                let mut transcript = Transcript::new(
                    self.draft.gem_key.clone(),
                    session.model_name(),
                    session.grounding_enabled(),
                );
                transcript.api_history = api_history;
                transcript.record_exchange(&turn.prompt, &response);
                let id = self.store.new_chat_id(&turn.prompt);
                if let Err(e) = self.store.save(&id, &transcript) {
                    self.notice(format!("Could not save the new chat: {e}"));
                    return;
                }
                self.reload_chats();
                self.apply_session(SessionEvent::ChatCreated(id));
            }
        }
    }

    fn active_transcript(&self) -> Option<&Transcript> {
        let id = self.session.active_chat_id.as_deref()?;
        self.chats
            .iter()
            .find(|(chat_id, _)| chat_id == id)
            .map(|(_, t)| t)
    }

    fn build_sidebar_lines(&self) -> Vec<Line<'_>> {
        let dim = Style::default().fg(Color::DarkGray);
        let mut lines = vec![
            Line::from(Span::styled(
                "Gemchat",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled("Conversations", dim)),
        ];
        if !self.session.search_query.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("filter: {}", self.session.search_query),
                Style::default().fg(Color::Yellow),
            )));
        }
        lines.push(Line::from(""));

        let filtered = self.filtered_chats();
        if filtered.is_empty() {
            lines.push(Line::from(Span::styled("No chats found.", dim)));
        }
        for (position, &index) in filtered.iter().enumerate() {
            let (id, transcript) = &self.chats[index];
            let is_active = self.session.active_chat_id.as_deref() == Some(id.as_str());
            let marker = if is_active { "▶ " } else { "  " };
            let style = if is_active {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(
                format!("{marker}{}. {}", position + 1, transcript.title(&self.gems)),
                style,
            )));
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(
                "save uploads: {}",
                if self.session.save_uploads { "on" } else { "off" }
            ),
            dim,
        )));
        lines.push(Line::from(Span::styled("/help for commands", dim)));
        lines
    }

    fn build_main_lines(&self) -> Vec<Line<'_>> {
        let mut lines = Vec::new();
        match self.session.view {
            View::NewChat => {
                lines.push(Line::from(Span::styled(
                    "Start a new conversation",
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(""));
                let gem_name = self
                    .gems
                    .get(&self.draft.gem_key)
                    .map(|g| g.name.as_str())
                    .unwrap_or(self.draft.gem_key.as_str());
                lines.push(Line::from(format!("Gem:       {gem_name}")));
                lines.push(Line::from(format!(
                    "Model:     {}",
                    models::display_name_for(&self.draft.model_id)
                )));
                let grounding = if !models::supports_grounding(&self.draft.model_id) {
                    "not supported for this model"
                } else if self.draft.grounding_requested {
                    "on"
                } else {
                    "off"
                };
                lines.push(Line::from(format!("Grounding: {grounding}")));
                if !self.session.pending_attachments.is_empty() {
                    lines.push(Line::from(""));
                    lines.push(Line::from("Attached files:"));
                    for attachment in &self.session.pending_attachments {
                        lines.push(Line::from(format!("  {}", attachment.file_name)));
                    }
                }
                lines.push(Line::from(""));
            }
            View::Chat => {
                if let Some(transcript) = self.active_transcript() {
                    let header = format!(
                        "Gem: {} | Model: {} | Grounding: {}",
                        self.gems
                            .get(&transcript.gem_key)
                            .map(|g| g.name.as_str())
                            .unwrap_or(transcript.gem_key.as_str()),
                        models::display_name_for(&transcript.model_name),
                        if transcript.grounding_enabled { "On" } else { "Off" }
                    );
                    lines.push(Line::from(Span::styled(header, Style::default().fg(Color::DarkGray))));
                    lines.push(Line::from(""));
                    for message in &transcript.messages {
                        push_message_lines(&mut lines, message.role.is_user(), &message.content);
                    }
                }
            }
        }

        if let Some(turn) = &self.streaming {
            push_message_lines(&mut lines, true, &turn.prompt);
            let mut streamed = turn.acc.clone();
            streamed.push('▌');
            push_message_lines(&mut lines, false, &streamed);
        }

        for notice in &self.notices {
            lines.push(Line::from(Span::styled(
                notice.clone(),
                Style::default().fg(Color::DarkGray),
            )));
        }
        lines
    }

    fn max_scroll_offset(&self, available_height: u16) -> u16 {
        let total_lines = self.build_main_lines().len() as u16;
        total_lines.saturating_sub(available_height)
    }

    fn scroll_up(&mut self, amount: u16, available_height: u16) {
        if self.auto_scroll {
            // While auto-scroll is engaged the rendered offset tracks the
            // bottom; start from there, not from a stale stored offset.
            self.scroll_offset = self.max_scroll_offset(available_height);
        }
        self.auto_scroll = false;
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
    }

    fn scroll_down(&mut self, amount: u16, available_height: u16) {
        let max = self.max_scroll_offset(available_height);
        self.scroll_offset = self.scroll_offset.saturating_add(amount).min(max);
        if self.scroll_offset >= max {
            self.auto_scroll = true;
        }
    }
}

fn push_message_lines(lines: &mut Vec<Line<'_>>, is_user: bool, content: &str) {
    if is_user {
        lines.push(Line::from(vec![
            Span::styled(
                "You: ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(content.to_string(), Style::default().fg(Color::Cyan)),
        ]));
    } else {
        for content_line in content.lines() {
            lines.push(Line::from(Span::styled(
                content_line.to_string(),
                Style::default().fg(Color::White),
            )));
        }
    }
    lines.push(Line::from(""));
}

fn ui(f: &mut Frame, app: &ChatApp) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
        .split(f.area());

    let sidebar = Paragraph::new(app.build_sidebar_lines())
        .block(Block::default().borders(Borders::RIGHT))
        .wrap(Wrap { trim: true });
    f.render_widget(sidebar, columns[0]);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(INPUT_HEIGHT)])
        .split(columns[1]);

    let lines = app.build_main_lines();
    let available_height = rows[0].height;
    let total_lines = lines.len() as u16;
    let max_offset = total_lines.saturating_sub(available_height);
    let scroll_offset = if app.auto_scroll {
        max_offset
    } else {
        app.scroll_offset.min(max_offset)
    };

    let main = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .scroll((scroll_offset, 0));
    f.render_widget(main, rows[0]);

    let input_title = if app.streaming.is_some() {
        "Waiting for the model... (Ctrl+C to quit)"
    } else {
        "Ask Gemini anything (Enter to send, /help for commands)"
    };
    let input = Paragraph::new(app.input.as_str())
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL).title(input_title))
        .wrap(Wrap { trim: true });
    f.render_widget(input, rows[1]);

    let cursor_x = input_cursor_x(app.input.chars().count(), rows[1].width);
    f.set_cursor_position((rows[1].x + cursor_x, rows[1].y + 1));
}

/// Cursor column inside the bordered input box, clamped so long input keeps
/// the cursor on the last usable cell instead of drifting off the panel.
fn input_cursor_x(input_chars: usize, panel_width: u16) -> u16 {
    let inner = panel_width.saturating_sub(2).max(1) as usize;
    input_chars.saturating_add(1).min(inner) as u16
}

/// Run the interactive loop until the user quits. Terminal modes are restored
/// before returning, including on error.
pub async fn run_chat(
    mut app: ChatApp,
    mut rx: mpsc::UnboundedReceiver<(StreamMessage, u64)>,
) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, event::EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = loop {
        if let Err(e) = terminal.draw(|f| ui(f, &app)) {
            break Err(e.into());
        }

        let terminal_height = terminal.size().map(|s| s.height).unwrap_or_default();
        let available_height = terminal_height.saturating_sub(INPUT_HEIGHT);

        match event::poll(Duration::from_millis(50)) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        break Ok(());
                    }
                    KeyCode::Enter => app.handle_submit(),
                    KeyCode::Char(c) => app.input.push(c),
                    KeyCode::Backspace => {
                        app.input.pop();
                    }
                    KeyCode::Esc => app.input.clear(),
                    KeyCode::Up => app.scroll_up(1, available_height),
                    KeyCode::Down => app.scroll_down(1, available_height),
                    KeyCode::PageUp => app.scroll_up(available_height.max(1), available_height),
                    KeyCode::PageDown => app.scroll_down(available_height.max(1), available_height),
                    _ => {}
                },
                Ok(Event::Mouse(mouse)) => match mouse.kind {
                    MouseEventKind::ScrollUp => app.scroll_up(3, available_height),
                    MouseEventKind::ScrollDown => app.scroll_down(3, available_height),
                    _ => {}
                },
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
            Ok(false) => {}
            Err(e) => break Err(e.into()),
        }

        while let Ok((message, stream_id)) = rx.try_recv() {
            app.on_stream_message(message, stream_id);
        }

        if app.should_quit {
            break Ok(());
        }
    };

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        event::DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat_stream::SEED_ACK;
    use crate::core::message::Role;
    use std::fs;
    use tempfile::TempDir;

    fn test_app(root: &TempDir) -> (ChatApp, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let gems_dir = root.path().join("gems");
        fs::create_dir_all(&gems_dir).unwrap();
        fs::write(
            gems_dir.join("default.json"),
            r#"{"name":"Default","prompt":"You are helpful."}"#,
        )
        .unwrap();
        let gems = GemStore::load(&gems_dir).expect("load gems");

        let params = ChatAppParams {
            gems,
            store: TranscriptStore::new(root.path().join("chats")),
            uploads_dir: root.path().join("uploads"),
            session: SessionState::new(false, None),
            draft: NewChatDraft {
                gem_key: "default".into(),
                model_id: "models/gemini-1.5-pro-latest".into(),
                grounding_requested: false,
            },
            api_key: "test-key".into(),
            // Nothing listens here; spawned requests fail fast and their
            // stream ids never match an in-flight turn.
            base_url: "http://127.0.0.1:9".into(),
        };
        ChatApp::new(params).expect("build app")
    }

    #[tokio::test]
    async fn first_send_creates_a_persisted_chat_and_switches_view() {
        let root = TempDir::new().unwrap();
        let (mut app, _rx) = test_app(&root);

        app.input = "Hi".into();
        app.handle_submit();
        let stream_id = app.streaming.as_ref().expect("stream started").stream_id;

        app.on_stream_message(StreamMessage::Chunk("Hello ".into()), stream_id);
        app.on_stream_message(StreamMessage::Chunk("there!".into()), stream_id);
        app.on_stream_message(StreamMessage::End, stream_id);

        assert_eq!(app.session.view, View::Chat);
        let id = app.session.active_chat_id.clone().expect("active id set");
        assert_eq!(app.chats.len(), 1);

        let saved = app.store.load(&id).expect("load saved transcript");
        assert_eq!(saved.messages.len(), 2);
        assert_eq!(saved.messages[0].role, Role::User);
        assert_eq!(saved.messages[0].content, "Hi");
        assert_eq!(saved.messages[1].content, "Hello there!");
        assert_eq!(saved.api_history.len(), 4);
        assert_eq!(saved.api_history[1].parts, vec![SEED_ACK.to_string()]);
    }

    #[tokio::test]
    async fn stream_error_is_recorded_as_the_assistant_turn() {
        let root = TempDir::new().unwrap();
        let (mut app, _rx) = test_app(&root);

        app.input = "Hi".into();
        app.handle_submit();
        let stream_id = app.streaming.as_ref().unwrap().stream_id;

        app.on_stream_message(StreamMessage::Chunk("partial".into()), stream_id);
        app.on_stream_message(
            StreamMessage::Error("An error occurred: quota exceeded".into()),
            stream_id,
        );
        app.on_stream_message(StreamMessage::End, stream_id);

        let id = app.session.active_chat_id.clone().unwrap();
        let saved = app.store.load(&id).unwrap();
        // Partial text is discarded; the error text becomes the answer.
        assert_eq!(saved.messages[1].content, "An error occurred: quota exceeded");
        assert_eq!(saved.api_history.last().unwrap().parts[0], "An error occurred: quota exceeded");
    }

    #[tokio::test]
    async fn sends_are_refused_while_a_stream_is_in_flight() {
        let root = TempDir::new().unwrap();
        let (mut app, _rx) = test_app(&root);

        app.input = "first".into();
        app.handle_submit();
        let stream_id = app.streaming.as_ref().unwrap().stream_id;

        app.input = "second".into();
        app.handle_submit();
        assert_eq!(app.streaming.as_ref().unwrap().stream_id, stream_id);
        assert!(app.notices.iter().any(|n| n.contains("still streaming")));
    }

    #[tokio::test]
    async fn follow_up_sends_append_to_the_same_transcript() {
        let root = TempDir::new().unwrap();
        let (mut app, _rx) = test_app(&root);

        for (prompt, answer) in [("Hi", "Hello!"), ("How are you?", "Fine.")] {
            app.input = prompt.into();
            app.handle_submit();
            let stream_id = app.streaming.as_ref().unwrap().stream_id;
            app.on_stream_message(StreamMessage::Chunk(answer.into()), stream_id);
            app.on_stream_message(StreamMessage::End, stream_id);
        }

        assert_eq!(app.chats.len(), 1);
        let id = app.session.active_chat_id.clone().unwrap();
        let saved = app.store.load(&id).unwrap();
        assert_eq!(saved.messages.len(), 4);
        assert_eq!(saved.api_history.len(), 2 + 4);
        assert_eq!(saved.messages[2].content, "How are you?");
    }

    #[tokio::test]
    async fn deleting_the_active_chat_returns_to_new_chat_view() {
        let root = TempDir::new().unwrap();
        let (mut app, _rx) = test_app(&root);

        app.input = "Hi".into();
        app.handle_submit();
        let stream_id = app.streaming.as_ref().unwrap().stream_id;
        app.on_stream_message(StreamMessage::Chunk("Hello".into()), stream_id);
        app.on_stream_message(StreamMessage::End, stream_id);
        let id = app.session.active_chat_id.clone().unwrap();

        app.apply_command(Command::DeleteChat);

        assert_eq!(app.session.view, View::NewChat);
        assert!(app.session.active_chat_id.is_none());
        assert!(app.chats.is_empty());
        assert!(!root.path().join("chats").join(&id).exists());
    }

    #[tokio::test]
    async fn open_command_targets_the_filtered_list() {
        let root = TempDir::new().unwrap();
        let (mut app, _rx) = test_app(&root);

        let mut greeting = Transcript::new("default", "models/gemini-1.5-pro-latest", false);
        greeting.api_history = ChatSession::new(
            "models/gemini-1.5-pro-latest",
            false,
            "You are helpful.",
        )
        .export_history();
        greeting.record_exchange("hello there", "hi");
        app.store.save("b-greeting.json", &greeting).unwrap();

        let mut farewell = greeting.clone();
        farewell.messages[0].content = "goodbye".into();
        app.store.save("a-farewell.json", &farewell).unwrap();
        app.reload_chats();
        assert_eq!(app.chats.len(), 2);

        app.apply_command(Command::Search("hello".into()));
        assert_eq!(app.filtered_chats().len(), 1);

        app.apply_command(Command::Open(1));
        assert_eq!(app.session.view, View::Chat);
        assert_eq!(app.session.active_chat_id.as_deref(), Some("b-greeting.json"));

        app.apply_command(Command::Open(5));
        assert!(app.notices.iter().any(|n| n.contains("No chat numbered 5")));
    }

    #[tokio::test]
    async fn unknown_gem_and_model_selections_leave_draft_untouched() {
        let root = TempDir::new().unwrap();
        let (mut app, _rx) = test_app(&root);

        app.apply_command(Command::SelectGem("missing".into()));
        assert_eq!(app.draft.gem_key, "default");

        app.apply_command(Command::SelectModel("gpt-4o".into()));
        assert_eq!(app.draft.model_id, "models/gemini-1.5-pro-latest");

        app.apply_command(Command::SelectModel("Gemini 1.5 Flash".into()));
        assert_eq!(app.draft.model_id, "models/gemini-1.5-flash-latest");
    }

    #[tokio::test]
    async fn conversation_switching_commands_are_refused_while_streaming() {
        let root = TempDir::new().unwrap();
        let (mut app, _rx) = test_app(&root);

        // An existing conversation that must stay untouched.
        let mut earlier = Transcript::new("default", "models/gemini-1.5-pro-latest", false);
        let mut seed = ChatSession::new("models/gemini-1.5-pro-latest", false, "You are helpful.");
        seed.push_user_turn("earlier question", &[]);
        seed.push_model_turn("earlier answer");
        earlier.api_history = seed.export_history();
        earlier.record_exchange("earlier question", "earlier answer");
        app.store.save("earlier.json", &earlier).unwrap();
        app.reload_chats();

        app.input = "prompt for the new chat".into();
        app.handle_submit();
        let stream_id = app.streaming.as_ref().unwrap().stream_id;

        app.apply_command(Command::Open(1));
        assert_eq!(app.session.view, View::NewChat);
        assert!(app.notices.iter().any(|n| n.contains("still streaming")));

        app.apply_command(Command::NewChat);
        app.apply_command(Command::DeleteChat);
        assert!(app.streaming.is_some());
        assert_eq!(app.chats.len(), 1);

        app.on_stream_message(StreamMessage::Chunk("answer".into()), stream_id);
        app.on_stream_message(StreamMessage::End, stream_id);

        // The completed turn lands in its own new transcript.
        let id = app.session.active_chat_id.clone().expect("new chat id");
        assert_ne!(id, "earlier.json");
        let saved = app.store.load(&id).unwrap();
        assert_eq!(saved.messages.len(), 2);
        assert_eq!(saved.messages[0].content, "prompt for the new chat");
        assert_eq!(saved.api_history.len(), 4);

        // The other conversation is exactly as it was.
        let untouched = app.store.load("earlier.json").unwrap();
        assert_eq!(untouched.messages.len(), 2);
        assert_eq!(untouched.messages[0].content, "earlier question");
        assert_eq!(untouched.api_history.len(), 4);
        assert_eq!(untouched.api_history.last().unwrap().role, "model");
        assert_eq!(untouched.api_history.last().unwrap().parts, vec!["earlier answer".to_string()]);
    }

    #[tokio::test]
    async fn scrolling_up_from_the_bottom_moves_one_line() {
        let root = TempDir::new().unwrap();
        let (mut app, _rx) = test_app(&root);

        let mut long = Transcript::new("default", "models/gemini-1.5-pro-latest", false);
        for i in 0..12 {
            long.record_exchange(format!("q{i}"), format!("a{i}"));
        }
        app.store.save("long.json", &long).unwrap();
        app.reload_chats();
        app.apply_command(Command::Open(1));

        let height = 4;
        let max = app.max_scroll_offset(height);
        assert!(max > 0);
        assert!(app.auto_scroll);

        app.scroll_up(1, height);
        assert!(!app.auto_scroll);
        assert_eq!(app.scroll_offset, max - 1);

        app.scroll_down(1, height);
        assert_eq!(app.scroll_offset, max);
        assert!(app.auto_scroll);
    }

    #[test]
    fn input_cursor_stays_inside_the_box() {
        assert_eq!(input_cursor_x(0, 20), 1);
        assert_eq!(input_cursor_x(5, 20), 6);
        assert_eq!(input_cursor_x(100, 20), 18);
        assert_eq!(input_cursor_x(3, 2), 1);
    }

    #[tokio::test]
    async fn save_uploads_persists_attachment_copies_on_send() {
        let root = TempDir::new().unwrap();
        let (mut app, _rx) = test_app(&root);

        let file = root.path().join("notes.txt");
        fs::write(&file, "attached content").unwrap();
        app.apply_command(Command::ToggleSaveUploads);
        app.apply_command(Command::Attach(file.display().to_string()));
        assert_eq!(app.session.pending_attachments.len(), 1);

        app.input = "look at this".into();
        app.handle_submit();

        assert!(app.session.pending_attachments.is_empty());
        let uploads: Vec<_> = fs::read_dir(root.path().join("uploads"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(uploads.len(), 1);
        assert!(uploads[0].ends_with("_notes.txt"));
    }
}
