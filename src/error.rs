use thiserror::Error;

use crate::record::{RecordKind, SourceTag};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{kind} record '{name}' from {site} (group '{group}') is missing required field '{field}'")]
    MissingField {
        site: SourceTag,
        kind: RecordKind,
        group: String,
        name: String,
        field: &'static str,
    },

    #[error("{kind} record '{name}' is tagged {found} but was supplied under {expected}")]
    SourceMismatch {
        expected: SourceTag,
        found: SourceTag,
        kind: RecordKind,
        name: String,
    },

    #[error("anchor source {site} supplied no {kind} records")]
    MissingAnchor { site: SourceTag, kind: RecordKind },

    #[error("anchor source {site} is not one of the participating sources")]
    AnchorNotParticipating { site: SourceTag },

    #[error("anchor source {site} lists club '{name}' in both {first_league} and {league}")]
    DuplicateAnchorClub {
        site: SourceTag,
        name: String,
        first_league: String,
        league: String,
    },

    #[error(
        "duplicate canonical alias for {site} club '{raw}' in {league}: '{existing}' vs '{conflicting}'"
    )]
    DuplicateAlias {
        site: SourceTag,
        league: String,
        raw: String,
        existing: String,
        conflicting: String,
    },
}

/// Failure talking to the external reference service. Never escapes the cascade.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("lookup unavailable: {0}")]
    Unavailable(String),

    #[error("lookup returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected lookup response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        LookupError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for LookupError {
    fn from(err: serde_json::Error) -> Self {
        LookupError::Malformed(err.to_string())
    }
}
