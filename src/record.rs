use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::PipelineError;

/// Club records from sites that publish no league carry this label.
pub const LEAGUE_UNKNOWN: &str = "League N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    #[serde(alias = "transfermrkt")]
    Transfermarkt,
    Sofascore,
    Fbref,
    Understat,
    Whoscored,
    Soccerment,
    Fotmob,
}

impl SourceTag {
    pub const ALL: [SourceTag; 7] = [
        SourceTag::Transfermarkt,
        SourceTag::Sofascore,
        SourceTag::Fbref,
        SourceTag::Understat,
        SourceTag::Whoscored,
        SourceTag::Soccerment,
        SourceTag::Fotmob,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::Transfermarkt => "transfermarkt",
            SourceTag::Sofascore => "sofascore",
            SourceTag::Fbref => "fbref",
            SourceTag::Understat => "understat",
            SourceTag::Whoscored => "whoscored",
            SourceTag::Soccerment => "soccerment",
            SourceTag::Fotmob => "fotmob",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_ascii_lowercase();
        // The old scrapers spelled it "transfermrkt" in a few places.
        if wanted == "transfermrkt" {
            return Some(SourceTag::Transfermarkt);
        }
        Self::ALL.into_iter().find(|tag| tag.as_str() == wanted)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceSet(u8);

impl SourceSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, tag: SourceTag) {
        self.0 |= tag.bit();
    }

    pub fn remove(&mut self, tag: SourceTag) {
        self.0 &= !tag.bit();
    }

    pub fn contains(self, tag: SourceTag) -> bool {
        self.0 & tag.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = SourceTag> {
        SourceTag::ALL.into_iter().filter(move |tag| self.contains(*tag))
    }
}

impl FromIterator<SourceTag> for SourceSet {
    fn from_iter<I: IntoIterator<Item = SourceTag>>(iter: I) -> Self {
        let mut set = SourceSet::empty();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Club,
    Player,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Club => f.write_str("club"),
            RecordKind::Player => f.write_str("player"),
        }
    }
}

/// One club or player as reported by a single site.
///
/// `group` is the league for clubs and the site's own club label for players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub name: String,
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub source_id: String,
    #[serde(alias = "team", alias = "league")]
    pub group: String,
    pub url: String,
    #[serde(alias = "site")]
    pub source: SourceTag,
}

impl NormalizedRecord {
    pub fn new(
        source: SourceTag,
        name: impl Into<String>,
        source_id: impl Into<String>,
        group: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_id: source_id.into(),
            group: group.into(),
            url: url.into(),
            source,
        }
    }

    pub fn validate(&self, kind: RecordKind) -> Result<(), PipelineError> {
        let fields = [
            ("name", &self.name),
            ("source_id", &self.source_id),
            ("group", &self.group),
            ("url", &self.url),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(PipelineError::MissingField {
                    site: self.source,
                    kind,
                    group: self.group.clone(),
                    name: self.name.clone(),
                    field,
                });
            }
        }
        Ok(())
    }
}

pub type SourceRecords = BTreeMap<SourceTag, Vec<NormalizedRecord>>;

pub fn validate_records(kind: RecordKind, records: &SourceRecords) -> Result<(), PipelineError> {
    for (filed_under, list) in records {
        for record in list {
            if record.source != *filed_under {
                return Err(PipelineError::SourceMismatch {
                    expected: *filed_under,
                    found: record.source,
                    kind,
                    name: record.name.clone(),
                });
            }
            record.validate(kind)?;
        }
    }
    Ok(())
}

pub fn group_by_source(records: Vec<NormalizedRecord>) -> SourceRecords {
    let mut out = SourceRecords::new();
    for record in records {
        out.entry(record.source).or_default().push(record);
    }
    out
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
