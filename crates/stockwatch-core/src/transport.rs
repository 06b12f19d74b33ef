//! The outbound notification channel.

use std::future::Future;

/// Delivers a text message to a notification target.
///
/// The outcome is a plain boolean: `true` once the carrier accepted the
/// message, `false` on any rejection or failure. Implementations log their
/// own failures; a `false` is a normal outcome for the engine, not an error.
pub trait Transport: Send + Sync {
  fn send(&self, target: &str, message: &str) -> impl Future<Output = bool> + Send;
}
