//! Slash-command parsing for the chat input box.
//!
//! Anything that does not start with `/` is a message for the model; `/`
//! input is parsed into a typed command the chat loop dispatches on.

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    NewChat,
    /// Open the nth conversation in the sidebar list (1-based, as displayed).
    Open(usize),
    DeleteChat,
    /// Set the sidebar filter; an empty query clears it.
    Search(String),
    SelectGem(String),
    SelectModel(String),
    ToggleGrounding,
    Attach(String),
    ClearAttachments,
    ToggleSaveUploads,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedInput {
    Command(Command),
    Message(String),
    /// Unrecognized or malformed command, with a usage hint to display.
    Invalid(String),
}

pub const HELP_TEXT: &str = "\
/new                  start a new conversation\n\
/open <n>             open the nth chat listed in the sidebar\n\
/delete               delete the current conversation\n\
/search [text]        filter chats by content; /search alone clears\n\
/gem <key>            choose the persona for the next new chat\n\
/model <name>         choose the model for the next new chat\n\
/grounding            toggle Google Search grounding for the next new chat\n\
/attach <path>        attach a file to the next message\n\
/clear-attachments    drop all pending attachments\n\
/save-uploads         toggle copying attachments into the uploads folder\n\
/help                 show this list\n\
/quit                 exit";

pub fn parse_input(input: &str) -> ParsedInput {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return ParsedInput::Message(input.to_string());
    }

    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (trimmed, ""),
    };

    match name {
        "/new" => ParsedInput::Command(Command::NewChat),
        "/open" => match rest.parse::<usize>() {
            Ok(n) if n >= 1 => ParsedInput::Command(Command::Open(n)),
            _ => ParsedInput::Invalid("Usage: /open <n> (number from the sidebar list)".into()),
        },
        "/delete" => ParsedInput::Command(Command::DeleteChat),
        "/search" => ParsedInput::Command(Command::Search(rest.to_string())),
        "/gem" => {
            if rest.is_empty() {
                ParsedInput::Invalid("Usage: /gem <key>".into())
            } else {
                ParsedInput::Command(Command::SelectGem(rest.to_string()))
            }
        }
        "/model" => {
            if rest.is_empty() {
                ParsedInput::Invalid("Usage: /model <name or id>".into())
            } else {
                ParsedInput::Command(Command::SelectModel(rest.to_string()))
            }
        }
        "/grounding" => ParsedInput::Command(Command::ToggleGrounding),
        "/attach" => {
            if rest.is_empty() {
                ParsedInput::Invalid("Usage: /attach <path>".into())
            } else {
                ParsedInput::Command(Command::Attach(rest.to_string()))
            }
        }
        "/clear-attachments" => ParsedInput::Command(Command::ClearAttachments),
        "/save-uploads" => ParsedInput::Command(Command::ToggleSaveUploads),
        "/help" => ParsedInput::Command(Command::Help),
        "/quit" | "/exit" => ParsedInput::Command(Command::Quit),
        other => ParsedInput::Invalid(format!("Unknown command: {other} (try /help)")),
    }
}
