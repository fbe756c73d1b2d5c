use thiserror::Error;

/// A wall-clock string could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("malformed time '{0}' (expected HH:MM)")]
    Malformed(String),

    #[error("time '{0}' is out of range")]
    OutOfRange(String),
}

/// Timezone conversion failure.
///
/// Callers on the matching path recover from this by keeping the local time unchanged;
/// it is only surfaced by the `try_` variants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimezoneError {
    #[error("unknown time zone '{0}'")]
    UnknownZone(String),

    #[error("invalid fixed offset '{0}'")]
    InvalidOffset(String),

    #[error(transparent)]
    Time(#[from] TimeParseError),
}
