use std::collections::BTreeMap;

use serde::Serialize;

use crate::cascade::Heuristic;
use crate::pool::Candidate;
use crate::record::{SourceSet, SourceTag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub candidate: Candidate,
    pub heuristic: Heuristic,
    pub score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowState {
    Unresolved,
    Complete,
}

#[derive(Debug, Clone)]
pub struct MatchRow {
    /// Position of the anchor in its group's anchor roster; stable identity for merges.
    pub id: usize,
    pub group: String,
    pub anchor_source: SourceTag,
    pub anchor: Candidate,
    slots: BTreeMap<SourceTag, Option<Slot>>,
}

impl MatchRow {
    pub fn new(
        id: usize,
        group: impl Into<String>,
        anchor_source: SourceTag,
        anchor: Candidate,
        sources: &[SourceTag],
    ) -> Self {
        let slots = sources
            .iter()
            .copied()
            .filter(|s| *s != anchor_source)
            .map(|s| (s, None))
            .collect();
        Self {
            id,
            group: group.into(),
            anchor_source,
            anchor,
            slots,
        }
    }

    pub fn outstanding(&self) -> SourceSet {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.is_none())
            .map(|(source, _)| *source)
            .collect()
    }

    pub fn state(&self) -> RowState {
        if self.slots.values().all(Option::is_some) {
            RowState::Complete
        } else {
            RowState::Unresolved
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state() == RowState::Complete
    }

    pub fn slot(&self, source: SourceTag) -> Option<&Slot> {
        self.slots.get(&source).and_then(Option::as_ref)
    }

    pub fn slots(&self) -> impl Iterator<Item = (SourceTag, Option<&Slot>)> {
        self.slots.iter().map(|(s, slot)| (*s, slot.as_ref()))
    }

    pub(crate) fn fill(&mut self, source: SourceTag, slot: Slot) -> bool {
        match self.slots.get_mut(&source) {
            Some(entry) if entry.is_none() => {
                *entry = Some(slot);
                true
            }
            _ => false,
        }
    }
}
