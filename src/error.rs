//! Typed error variants for the pickup-watch engine.
//!
//! Only `EngineError` is ever surfaced synchronously to a caller (from
//! `WatchEngine::add` and catalog resolution). Everything that can go wrong
//! inside the polling loop — transport failures, timeouts, push delivery,
//! audio playback — is absorbed where it happens and logged, so one item's
//! failure can never starve or crash monitoring of the others.

use thiserror::Error;

/// Errors surfaced to the caller from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A required selection is missing or does not exist in the chosen area.
    ///
    /// Reported to the user; the triggering operation is aborted with no
    /// state change.
    #[error("validation error: {0}")]
    Validation(String),

    /// An area title could not be resolved against the catalog.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Transient failures from a single availability query.
///
/// These never leave the polling loop: the item is treated as "unknown" for
/// the tick, logged, and retried on a later tick (subject to backoff).
#[derive(Debug, Error)]
pub enum QueryError {
    /// Network or TLS failure talking to the inventory service.
    #[error("inventory transport error: {0}")]
    Transport(String),

    /// The query did not complete within the per-item timeout.
    #[error("inventory query timed out")]
    Timeout,

    /// The service answered, but the payload did not contain the expected
    /// availability fields.
    #[error("malformed inventory response: {0}")]
    Malformed(String),
}

/// Push notification delivery failures. Logged as warnings, never fatal.
#[derive(Debug, Error)]
pub enum PushError {
    /// The configured endpoint is empty or not a usable http(s) URL.
    #[error("invalid push endpoint: {0}")]
    InvalidEndpoint(String),

    /// The endpoint was reachable in principle but delivery failed.
    #[error("push delivery failed: {0}")]
    Delivery(String),
}

/// Audio playback failures. Logged, never escalated past the dispatcher.
#[derive(Debug, Error)]
pub enum AudioError {
    /// No audio output device could be opened.
    #[error("audio device unavailable: {0}")]
    Device(String),

    /// Playback was requested on a player that was constructed disabled.
    #[error("audio playback disabled")]
    Disabled,
}
