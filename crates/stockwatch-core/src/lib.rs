//! Core types and trait definitions for the stockwatch low-stock alerter.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the alert episode model, the collaborator traits the engine consumes, and
//! the [`engine::AlertEngine`] that decides, per product and threshold,
//! whether to send, suppress, or resolve.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod engine;
pub mod episode;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod product;
pub mod source;
pub mod transport;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
