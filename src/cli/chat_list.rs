use std::error::Error;

use crate::core::config::DataDirs;
use crate::core::gem::GemStore;
use crate::core::models;
use crate::core::transcript::TranscriptStore;

pub fn list_chats(dirs: &DataDirs, query: Option<&str>) -> Result<(), Box<dyn Error>> {
    let gems = GemStore::load(&dirs.gems)?;
    let store = TranscriptStore::new(&dirs.chats);
    let chats = store.search(query.unwrap_or(""))?;

    if chats.is_empty() {
        match query {
            Some(query) => println!("No chats matching '{query}'."),
            None => println!("No saved chats."),
        }
        return Ok(());
    }

    for (id, transcript) in &chats {
        println!(
            "{id}\n    {} | {} | grounding {}",
            transcript.title(&gems),
            models::display_name_for(&transcript.model_name),
            if transcript.grounding_enabled { "on" } else { "off" }
        );
    }
    Ok(())
}
