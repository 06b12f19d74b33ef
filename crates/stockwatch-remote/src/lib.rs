//! Outbound HTTP collaborators for stockwatch.
//!
//! - [`WhatsAppTransport`] delivers alerts through the Twilio Messages API.
//! - [`HttpProfileSource`] reads the manager's alert settings from the
//!   profile service.

pub mod error;
pub mod profile;
pub mod whatsapp;

pub use error::{Error, Result};
pub use profile::HttpProfileSource;
pub use whatsapp::{TwilioConfig, WhatsAppTransport};
