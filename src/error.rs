/// Errors from the Apps Script proxy and the sheet CSV exports.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Apps Script URL is not configured")]
    MissingUrl,

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("remote store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The script answered with an `error` field.
    #[error("remote store rejected the request: {0}")]
    Script(String),

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("malformed CSV export: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum NurseryError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{week} is locked and cannot be changed")]
    WeekLocked { week: String },

    #[error("{name} is not active on {week}")]
    InactiveMember { name: String, week: String },

    #[error("Unknown week: {0}")]
    UnknownWeek(String),

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("unlocking {week} requires confirmation")]
    UnlockNotConfirmed { week: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}
