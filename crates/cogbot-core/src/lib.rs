//! Core logic for the cogbot add-on layer.
//!
//! This crate is intentionally framework-agnostic. The chat gateway, command
//! dispatch and member lookups live behind ports (traits) implemented by the
//! embedding bot.

pub mod config;
pub mod domain;
pub mod ephemeral;
pub mod errors;
pub mod help;
pub mod logging;
pub mod markup;
pub mod messaging;
pub mod metadata;
pub mod pagination;
pub mod permission;
pub mod text;

pub use errors::{Error, Result};
