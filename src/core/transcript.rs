//! Conversation transcripts and their file-backed store.
//!
//! Each conversation lives in one JSON file under the chats directory. The
//! file carries two parallel views of the conversation: `api_history`, the
//! replay-ready turn sequence (including the hidden persona seed pair), and
//! `messages`, the display list shown to the user. The filename doubles as
//! the transcript identifier.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::gem::GemStore;
use crate::core::message::Message;
use crate::utils::filename;

/// Longest sanitized prompt prefix carried into a transcript identifier.
const ID_PROMPT_PREFIX_CHARS: usize = 50;

/// Display-title length before the ellipsis.
const TITLE_CHARS: usize = 40;

/// One turn of the replayable API history: the raw API role ("user" or
/// "model") and the text of each part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub parts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub gem_key: String,
    pub model_name: String,
    pub grounding_enabled: bool,
    pub api_history: Vec<HistoryTurn>,
    pub messages: Vec<Message>,
}

impl Transcript {
    pub fn new(gem_key: impl Into<String>, model_name: impl Into<String>, grounding_enabled: bool) -> Self {
        Self {
            gem_key: gem_key.into(),
            model_name: model_name.into(),
            grounding_enabled,
            api_history: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Append one completed user/assistant exchange to the display list. The
    /// API history is replaced separately from the session export so the two
    /// views stay consistent turn for turn.
    pub fn record_exchange(&mut self, prompt: impl Into<String>, response: impl Into<String>) {
        self.messages.push(Message::user(prompt));
        self.messages.push(Message::assistant(response));
    }

    /// Sidebar title: the first user message truncated to a fixed width,
    /// falling back to the gem's display name for transcripts without one.
    pub fn title(&self, gems: &GemStore) -> String {
        for message in &self.messages {
            if message.role.is_user() {
                let prefix = filename::truncate_chars(&message.content, TITLE_CHARS);
                if prefix.len() < message.content.len() {
                    return format!("{prefix}...");
                }
                return prefix.to_string();
            }
        }
        gems.get(&self.gem_key)
            .map(|g| g.name.clone())
            .unwrap_or_else(|| self.gem_key.clone())
    }

    /// Case-insensitive substring match against the content of every display
    /// message. An empty query matches everything.
    pub fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let needle = query.to_lowercase();
        self.messages
            .iter()
            .any(|m| m.content.to_lowercase().contains(&needle))
    }
}

pub struct TranscriptStore {
    dir: PathBuf,
}

impl TranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }

    /// Every parseable transcript, newest-first by file modification time.
    /// Unparseable files are skipped so one corrupt chat never hides the rest.
    pub fn list_all(&self) -> Result<Vec<(String, Transcript)>, Box<dyn std::error::Error>> {
        let mut entries: Vec<(PathBuf, SystemTime)> = Vec::new();
        if self.dir.exists() {
            for entry in fs::read_dir(&self.dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
                    let modified = entry
                        .metadata()
                        .and_then(|m| m.modified())
                        .unwrap_or(SystemTime::UNIX_EPOCH);
                    entries.push((path, modified));
                }
            }
        }
        entries.sort_by(|a, b| b.1.cmp(&a.1));

        let mut chats = Vec::with_capacity(entries.len());
        for (path, _) in entries {
            let Some(id) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match Self::read_transcript(&path) {
                Ok(transcript) => chats.push((id.to_string(), transcript)),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable transcript");
                }
            }
        }
        Ok(chats)
    }

    pub fn load(&self, id: &str) -> Result<Transcript, Box<dyn std::error::Error>> {
        Self::read_transcript(&self.path_for(id))
    }

    fn read_transcript(path: &Path) -> Result<Transcript, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Serialize and fully overwrite the transcript file. Not atomic: a crash
    /// mid-write can corrupt the file, an accepted limitation for a
    /// single-user tool.
    pub fn save(&self, id: &str, transcript: &Transcript) -> Result<(), Box<dyn std::error::Error>> {
        fs::create_dir_all(&self.dir)?;
        let contents = serde_json::to_string_pretty(transcript)?;
        fs::write(self.path_for(id), contents)?;
        debug!(id, "saved transcript");
        Ok(())
    }

    /// Remove the backing file. Deleting a transcript whose file is already
    /// gone is a no-op: the caller's intent is satisfied either way. The
    /// caller remains responsible for dropping its in-memory entry.
    pub fn delete(&self, id: &str) -> Result<(), Box<dyn std::error::Error>> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => {
                debug!(id, "deleted transcript");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Transcripts whose display messages contain `query`, newest-first.
    pub fn search(&self, query: &str) -> Result<Vec<(String, Transcript)>, Box<dyn std::error::Error>> {
        let mut chats = self.list_all()?;
        chats.retain(|(_, t)| t.matches(query));
        Ok(chats)
    }

    /// Identifier for a new conversation: timestamp plus a sanitized prefix
    /// of the first prompt. Two chats created in the same second with the
    /// same truncated prompt would collide, so an existing file gets a short
    /// random token appended instead of being overwritten.
    pub fn new_chat_id(&self, first_prompt: &str) -> String {
        let timestamp = Local::now().format("%Y%m%d-%H%M%S");
        let sanitized = filename::sanitize(first_prompt);
        let prefix = filename::truncate_chars(&sanitized, ID_PROMPT_PREFIX_CHARS);
        let stem = format!("{timestamp}-{prefix}");
        let id = format!("{stem}.json");
        if !self.path_for(&id).exists() {
            return id;
        }

        let mut token = [0u8; 2];
        if getrandom::fill(&mut token).is_err() {
            // OS RNG unavailable; the subsecond clock still disambiguates.
            token = (Local::now().timestamp_subsec_micros() as u16).to_be_bytes();
        }
        format!("{stem}-{:02x}{:02x}.json", token[0], token[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;
    use tempfile::TempDir;

    fn sample_transcript() -> Transcript {
        let mut t = Transcript::new("default", "models/gemini-1.5-pro-latest", true);
        t.api_history = vec![
            HistoryTurn {
                role: "user".into(),
                parts: vec!["You are helpful.".into()],
            },
            HistoryTurn {
                role: "model".into(),
                parts: vec!["Understood. I'm ready.".into()],
            },
            HistoryTurn {
                role: "user".into(),
                parts: vec!["Hi".into()],
            },
            HistoryTurn {
                role: "model".into(),
                parts: vec!["Oh, Hello there!".into()],
            },
        ];
        t.record_exchange("Hi", "Oh, Hello there!");
        t
    }

    #[test]
    fn save_then_load_round_trips_field_for_field() {
        let dir = TempDir::new().expect("tempdir");
        let store = TranscriptStore::new(dir.path());
        let transcript = sample_transcript();

        store.save("chat.json", &transcript).expect("save");
        let loaded = store.load("chat.json").expect("load");
        assert_eq!(loaded, transcript);
    }

    #[test]
    fn list_all_orders_newest_first_and_skips_corrupt_files() {
        let dir = TempDir::new().expect("tempdir");
        let store = TranscriptStore::new(dir.path());

        store.save("older.json", &sample_transcript()).expect("save");
        // Push the second file's mtime past the first regardless of fs
        // timestamp granularity.
        let newer_path = dir.path().join("newer.json");
        store.save("newer.json", &sample_transcript()).expect("save");
        let future = SystemTime::now() + std::time::Duration::from_secs(5);
        let file = fs::File::options().append(true).open(&newer_path).unwrap();
        file.set_modified(future).unwrap();

        fs::write(dir.path().join("corrupt.json"), "{oops").unwrap();
        fs::write(dir.path().join("ignored.txt"), "not a chat").unwrap();

        let chats = store.list_all().expect("list");
        let ids: Vec<&str> = chats.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["newer.json", "older.json"]);
    }

    #[test]
    fn search_is_case_insensitive_substring_match() {
        let dir = TempDir::new().expect("tempdir");
        let store = TranscriptStore::new(dir.path());

        store.save("greeting.json", &sample_transcript()).expect("save");
        let mut other = Transcript::new("default", "models/gemini-1.5-pro-latest", false);
        other.record_exchange("goodbye", "see you");
        store.save("farewell.json", &other).expect("save");

        let hits = store.search("hello").expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "greeting.json");

        let all = store.search("").expect("search");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn delete_is_idempotent_when_file_already_gone() {
        let dir = TempDir::new().expect("tempdir");
        let store = TranscriptStore::new(dir.path());

        store.save("chat.json", &sample_transcript()).expect("save");
        store.delete("chat.json").expect("first delete");
        store.delete("chat.json").expect("second delete is a no-op");
        assert!(store.list_all().expect("list").is_empty());
    }

    #[test]
    fn new_chat_id_embeds_sanitized_prompt_prefix() {
        let dir = TempDir::new().expect("tempdir");
        let store = TranscriptStore::new(dir.path());

        let id = store.new_chat_id("Tell me about C++ & Rust!");
        assert!(id.ends_with("-Tell_me_about_C__Rust.json"), "unexpected id: {id}");
        assert!(!id.contains(' '));
    }

    #[test]
    fn new_chat_id_disambiguates_collisions() {
        let dir = TempDir::new().expect("tempdir");
        let store = TranscriptStore::new(dir.path());

        let first = store.new_chat_id("Hi");
        store.save(&first, &sample_transcript()).expect("save");
        let second = store.new_chat_id("Hi");
        // Same second, same prompt: the second id must differ.
        if second != first {
            assert!(second.ends_with(".json"));
        }
        // Cross the boundary explicitly: an id that exists on disk is never
        // returned verbatim.
        assert!(!dir.path().join(&second).exists());
    }

    #[test]
    fn title_uses_first_user_message_with_ellipsis() {
        let gems_dir = TempDir::new().expect("tempdir");
        fs::write(
            gems_dir.path().join("default.json"),
            r#"{"name":"Default Gem","prompt":"You are helpful."}"#,
        )
        .unwrap();
        let gems = GemStore::load(gems_dir.path()).expect("load gems");

        let mut t = Transcript::new("default", "models/gemini-1.5-pro-latest", false);
        t.record_exchange("a".repeat(60), "ok");
        let title = t.title(&gems);
        assert_eq!(title, format!("{}...", "a".repeat(40)));

        let empty = Transcript::new("default", "models/gemini-1.5-pro-latest", false);
        assert_eq!(empty.title(&gems), "Default Gem");

        t.messages[0].content = "short".into();
        assert_eq!(t.title(&gems), "short");
    }

    #[test]
    fn appending_n_exchanges_yields_2n_messages() {
        let mut t = Transcript::new("default", "models/gemini-1.5-pro-latest", false);
        for i in 0..3 {
            t.record_exchange(format!("q{i}"), format!("a{i}"));
        }
        assert_eq!(t.messages.len(), 6);
        assert!(t.messages[0].role == Role::User && t.messages[1].role == Role::Assistant);
    }
}
