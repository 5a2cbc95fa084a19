use std::collections::BTreeMap;

use serde::Serialize;

use crate::cascade::{CascadeOutcome, Heuristic};
use crate::club_resolver::ClubMatchTable;
use crate::record::{NormalizedRecord, SourceTag};
use crate::roster::{ClubRoster, ExactRow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCells {
    pub name: String,
    pub source_id: String,
    pub url: String,
}

impl From<&NormalizedRecord> for SourceCells {
    fn from(record: &NormalizedRecord) -> Self {
        Self {
            name: record.name.clone(),
            source_id: record.source_id.clone(),
            url: record.url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClubIdentity {
    pub league: String,
    pub anchor_source: SourceTag,
    pub canonical: SourceCells,
    pub sources: BTreeMap<SourceTag, SourceCells>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resolution {
    Exact,
    Cascade,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerIdentity {
    pub club: String,
    pub anchor_source: SourceTag,
    pub canonical: SourceCells,
    pub sources: BTreeMap<SourceTag, SourceCells>,
    pub filled_by: BTreeMap<SourceTag, Heuristic>,
    pub resolution: Resolution,
}

pub trait Identity {
    fn anchor_source(&self) -> SourceTag;
    fn canonical(&self) -> &SourceCells;
    fn matched(&self) -> &BTreeMap<SourceTag, SourceCells>;

    fn cells(&self, source: SourceTag) -> Option<&SourceCells> {
        if source == self.anchor_source() {
            return Some(self.canonical());
        }
        self.matched().get(&source)
    }

    fn missing_sources(&self, participating: &[SourceTag]) -> Vec<SourceTag> {
        participating
            .iter()
            .copied()
            .filter(|source| self.cells(*source).is_none())
            .collect()
    }
}

impl Identity for ClubIdentity {
    fn anchor_source(&self) -> SourceTag {
        self.anchor_source
    }

    fn canonical(&self) -> &SourceCells {
        &self.canonical
    }

    fn matched(&self) -> &BTreeMap<SourceTag, SourceCells> {
        &self.sources
    }
}

impl Identity for PlayerIdentity {
    fn anchor_source(&self) -> SourceTag {
        self.anchor_source
    }

    fn canonical(&self) -> &SourceCells {
        &self.canonical
    }

    fn matched(&self) -> &BTreeMap<SourceTag, SourceCells> {
        &self.sources
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchedTables {
    pub clubs: Vec<ClubIdentity>,
    pub players: Vec<PlayerIdentity>,
}

pub fn assemble_clubs(table: &ClubMatchTable, anchor: SourceTag) -> Vec<ClubIdentity> {
    table
        .iter()
        .map(|club| ClubIdentity {
            league: club.league.clone(),
            anchor_source: anchor,
            canonical: SourceCells::from(&club.canonical),
            sources: club
                .members
                .iter()
                .filter_map(|(source, record)| {
                    record.as_ref().map(|r| (*source, SourceCells::from(r)))
                })
                .collect(),
        })
        .collect()
}

/// Exact rows and cascade rows merged per club, exact rows first.
/// Cascade rows keep their unresolved slots as absent cells.
pub fn assemble_players(
    exact: &[ExactRow],
    cascades: &[(&ClubRoster, &CascadeOutcome)],
    anchor: SourceTag,
) -> Vec<PlayerIdentity> {
    let mut out = Vec::new();

    for row in exact {
        let Some(anchor_record) = row.members.get(&anchor) else {
            continue;
        };
        let sources: BTreeMap<SourceTag, SourceCells> = row
            .members
            .iter()
            .filter(|(source, _)| **source != anchor)
            .map(|(source, record)| (*source, SourceCells::from(record)))
            .collect();
        out.push(PlayerIdentity {
            club: row.club.clone(),
            anchor_source: anchor,
            canonical: SourceCells::from(anchor_record),
            filled_by: sources.keys().map(|s| (*s, Heuristic::Exact)).collect(),
            sources,
            resolution: Resolution::Exact,
        });
    }

    for (roster, outcome) in cascades {
        let anchors = roster.residual_of(anchor);
        for row in &outcome.rows {
            let Some(anchor_record) = anchors.get(row.anchor.index) else {
                continue;
            };
            let mut sources = BTreeMap::new();
            let mut filled_by = BTreeMap::new();
            for (source, slot) in row.slots() {
                let Some(slot) = slot else {
                    continue;
                };
                let Some(record) = roster.residual_of(source).get(slot.candidate.index) else {
                    continue;
                };
                sources.insert(source, SourceCells::from(record));
                filled_by.insert(source, slot.heuristic);
            }
            out.push(PlayerIdentity {
                club: roster.club.clone(),
                anchor_source: anchor,
                canonical: SourceCells::from(anchor_record),
                sources,
                filled_by,
                resolution: Resolution::Cascade,
            });
        }
    }

    out.sort_by(|a, b| a.club.cmp(&b.club));
    out
}
