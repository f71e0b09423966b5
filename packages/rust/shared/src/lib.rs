//! Shared types, error model, and configuration for ServiceFunnel.
//!
//! This crate is the foundation depended on by all other ServiceFunnel crates.
//! It provides:
//! - [`ServiceFunnelError`], the unified error type
//! - Domain types ([`ServiceRecord`], [`Funnel`], [`FunnelStep`], [`SessionId`])
//!   and the JSON wire contract ([`StartRequest`], [`AnswerRequest`], [`StepReply`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClientConfig, DatasetConfig, RephraseConfig, ServerConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, rephrase_api_key,
};
pub use error::{Result, ServiceFunnelError};
pub use types::{
    AnswerRequest, COMPLETE_MESSAGE, ErrorBody, Funnel, FunnelPair, FunnelStep, NextStep,
    ServiceRecord, SessionId, StartRequest, StepReply,
};
