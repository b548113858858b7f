pub mod cli;
pub mod command_handlers;
pub mod command_support;
pub mod error;
pub mod service;

pub use error::AppError;
pub use service::{
    Advanced, IngestOutcome, ProjectService, ProjectStatus, Provisioned, WebhookOutcome,
};
