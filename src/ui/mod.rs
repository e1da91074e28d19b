//! Terminal UI layer: rendering and the interactive event loop.
//!
//! The UI is purely derived from [`crate::core::session::SessionState`] and
//! the loaded stores; [`chat_loop`] owns the draw/poll/drain cycle and
//! dispatches input to [`crate::commands`] and the chat stream.

pub mod chat_loop;
