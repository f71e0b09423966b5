//! TUI screens.
//!
//! The conversation lives on one screen; the contact summary is drawn as a
//! modal on top of it.

mod chat;
mod summary;

use servicefunnel_core::Backend;
use tokio::runtime::Runtime;

pub(crate) use chat::ChatScreen;

/// What a screen needs to reach the funnel.
pub(crate) struct Session<'a> {
    pub runtime: &'a Runtime,
    pub backend: &'a Backend,
}
