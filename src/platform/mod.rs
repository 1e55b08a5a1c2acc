//! Chat platform adapters. Each adapter turns platform updates into
//! [`crate::message::Message`]s and implements [`crate::client::ReplySink`].

pub mod telegram;
