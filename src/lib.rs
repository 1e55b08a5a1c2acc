//! Chat-ops bot core: routes chat messages to commands and keeps track of
//! commands that keep running after their handler returned.

pub mod admin;
pub mod bot;
pub mod client;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod matcher;
pub mod message;
pub mod platform;
pub mod running;
