use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForumError {
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("invalid status tag '{0}' (expected one of: acknowledged, depends-on, blocked, resolved, in-progress, needs-review)")]
    InvalidStatusKind(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Stored credential hash is malformed")]
    MalformedHash,

    #[error("Credential has been revoked")]
    Revoked,
}
