//! Gemchat is a terminal-first chat client for the Google Gemini API with
//! file-backed conversations and persona presets ("gems").
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the domain: gem and transcript stores, the session state
//!   machine, the model catalog, and streaming orchestration.
//! - [`ui`] renders the terminal interface and runs the interactive event
//!   loop that drives user input and display updates.
//! - [`commands`] implements slash-command parsing used by the chat loop.
//! - [`api`] defines the Gemini wire payloads used by the stream service.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::run`], which initializes the stores and dispatches
//! into [`ui::chat_loop`] for interactive sessions.

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod ui;
pub mod utils;
