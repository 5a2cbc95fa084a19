use std::collections::BTreeMap;

use serde::Serialize;

use crate::cascade::Heuristic;
use crate::record::SourceTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum GapKind {
    OrphanClub,
    UnresolvedClub,
    UnaliasedPlayer,
    UnresolvedPlayer,
}

/// Non-fatal matching gap. `site` is the source the gap is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataGap {
    pub kind: GapKind,
    pub site: SourceTag,
    pub group: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub clubs_total: usize,
    pub clubs_complete: usize,
    pub players_exact: usize,
    pub players_cascade_complete: usize,
    pub players_partial: usize,
    pub lookups_issued: usize,
    pub lookups_failed: usize,
    pub lookups_with_alternates: usize,
    pub filled_by: BTreeMap<Heuristic, usize>,
    pub gaps: Vec<DataGap>,
}

impl RunReport {
    pub fn clubs_partial(&self) -> usize {
        self.clubs_total.saturating_sub(self.clubs_complete)
    }

    pub fn players_total(&self) -> usize {
        self.players_exact + self.players_cascade_complete + self.players_partial
    }

    pub fn gap_counts(&self) -> BTreeMap<GapKind, usize> {
        let mut out = BTreeMap::new();
        for gap in &self.gaps {
            *out.entry(gap.kind).or_default() += 1;
        }
        out
    }

    pub(crate) fn add_filled(&mut self, filled: &BTreeMap<Heuristic, usize>) {
        for (heuristic, count) in filled {
            *self.filled_by.entry(*heuristic).or_default() += count;
        }
    }
}
