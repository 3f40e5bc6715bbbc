use thiserror::Error;

/// Construction-time failures surfaced to the caller.
///
/// Everything else in the engine degrades per-event: a failed pick sample is
/// `None` at that sample, a partial rectangle rolls the session back to idle.
/// Only a misconfigured or missing survey target is a hard error, because no
/// session may bind to a target that never loaded.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("survey target unavailable: {0}")]
    TargetUnavailable(String),

    #[error("scene manifest incomplete: {0}")]
    ManifestIncomplete(String),
}
