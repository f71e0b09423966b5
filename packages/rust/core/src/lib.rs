//! Core domain logic for ServiceFunnel.
//!
//! This crate holds the funnel matcher, the optional question rephrasing
//! client, the backends a conversation can run against (in-process or over
//! HTTP), and the conversation wizard state machine.

pub mod catalog;
pub mod client;
pub mod rephrase;
pub mod service;
pub mod wizard;

pub use catalog::{Ambiguity, Catalog, CategorySummary};
pub use client::HttpBackend;
pub use rephrase::ChatRephraser;
pub use service::{Backend, FunnelBackend, FunnelService};
pub use wizard::{
    CONTACT_FIELDS, ContactDetails, ContactField, ContactKey, ContactSubmission, Message, Role,
    Wizard, WizardState,
};
