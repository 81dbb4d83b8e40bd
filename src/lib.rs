//! Chat Assist — auto-reply decision engine for a personal messaging account.

pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod pipeline;
pub mod reply;
pub mod schedule;
pub mod store;
pub mod transport;
