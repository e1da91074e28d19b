pub mod chat_stream;
pub mod config;
pub mod gem;
pub mod message;
pub mod models;
pub mod session;
pub mod transcript;
pub mod uploads;
