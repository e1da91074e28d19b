//! Session state machine: which view is showing, which transcript is active,
//! what is pending in the composer. All transitions are pure functions of
//! (state, event) so the controller can be tested without a terminal.

use crate::core::uploads::Attachment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Configuration form for a conversation that does not exist yet.
    NewChat,
    /// An existing transcript is open.
    Chat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StartNewChat,
    SelectChat(String),
    /// First send of a new conversation succeeded and was persisted.
    ChatCreated(String),
    /// The active transcript's backing entry disappeared out from under us.
    ActiveChatVanished,
    DeleteActiveChat,
    SetSearch(String),
    Attach(Attachment),
    ClearAttachments,
    ToggleSaveUploads,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub view: View,
    pub active_chat_id: Option<String>,
    pub search_query: String,
    pub pending_attachments: Vec<Attachment>,
    pub save_uploads: bool,
    preselected_gem: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(false, None)
    }
}

impl SessionState {
    pub fn new(save_uploads: bool, preselected_gem: Option<String>) -> Self {
        Self {
            view: View::NewChat,
            active_chat_id: None,
            search_query: String::new(),
            pending_attachments: Vec::new(),
            save_uploads,
            preselected_gem,
        }
    }

    /// The `--gem` preselection, consumed at most once per process.
    pub fn take_preselected_gem(&mut self) -> Option<String> {
        self.preselected_gem.take()
    }

    pub fn apply(mut self, event: SessionEvent) -> Self {
        match event {
            SessionEvent::StartNewChat | SessionEvent::DeleteActiveChat => {
                self.view = View::NewChat;
                self.active_chat_id = None;
                self.search_query.clear();
                self.pending_attachments.clear();
            }
            SessionEvent::ActiveChatVanished => {
                self.view = View::NewChat;
                self.active_chat_id = None;
            }
            SessionEvent::SelectChat(id) => {
                self.view = View::Chat;
                self.active_chat_id = Some(id);
                self.pending_attachments.clear();
            }
            SessionEvent::ChatCreated(id) => {
                self.view = View::Chat;
                self.active_chat_id = Some(id);
                self.search_query.clear();
                self.pending_attachments.clear();
            }
            SessionEvent::SetSearch(query) => {
                self.search_query = query;
            }
            SessionEvent::Attach(attachment) => {
                self.pending_attachments.push(attachment);
            }
            SessionEvent::ClearAttachments => {
                self.pending_attachments.clear();
            }
            SessionEvent::ToggleSaveUploads => {
                self.save_uploads = !self.save_uploads;
            }
        }
        self
    }
}
