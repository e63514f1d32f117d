//! botdeck: multi-tenant chatbot project platform
//!
//! Users own chatbot projects (a system prompt, a model choice, prompt
//! snippets and uploaded files) and converse with an upstream completion API
//! through persisted conversation history. One endpoint relays the upstream
//! token stream to the browser as server-sent events.

pub mod auth;
pub mod config;
pub mod error;
pub mod llm;
pub mod server;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use server::Server;
