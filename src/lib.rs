//! TreePass library.
//!
//! This library provides the core of the TreePass QQ bot: the JSON-backed
//! audit store, the audit workflow, chat commands, and the OneBot v11 client
//! they run on.

pub mod bot;
pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod onebot;
pub mod services;
pub mod store;
pub mod types;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Result, TreePassError};
