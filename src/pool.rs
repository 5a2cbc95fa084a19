use std::collections::BTreeMap;

use crate::normalize::normalize;
use crate::record::{NormalizedRecord, SourceTag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: String,
    pub display: String,
    pub index: usize,
}

impl Candidate {
    pub fn from_record(index: usize, record: &NormalizedRecord) -> Self {
        Self {
            key: normalize(&record.name),
            display: record.name.clone(),
            index,
        }
    }
}

/// Not-yet-consumed candidates per source within one group.
///
/// Removal is permanent: a taken candidate is gone for every later
/// heuristic and every later anchor of the same run.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityPool {
    by_source: BTreeMap<SourceTag, Vec<Candidate>>,
}

impl AvailabilityPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: SourceTag, candidates: Vec<Candidate>) {
        self.by_source.entry(source).or_default().extend(candidates);
    }

    pub fn candidates(&self, source: SourceTag) -> &[Candidate] {
        self.by_source
            .get(&source)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    pub fn keys(&self, source: SourceTag) -> impl Iterator<Item = &str> {
        self.candidates(source).iter().map(|c| c.key.as_str())
    }

    pub fn position_of_key(&self, source: SourceTag, key: &str) -> Option<usize> {
        self.candidates(source).iter().position(|c| c.key == key)
    }

    pub fn take(&mut self, source: SourceTag, position: usize) -> Option<Candidate> {
        let list = self.by_source.get_mut(&source)?;
        if position >= list.len() {
            return None;
        }
        Some(list.remove(position))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(SourceTag, &Candidate) -> bool) {
        for (source, list) in self.by_source.iter_mut() {
            list.retain(|c| keep(*source, c));
        }
    }

    pub fn sources(&self) -> impl Iterator<Item = SourceTag> + '_ {
        self.by_source.keys().copied()
    }

    pub fn remaining(&self) -> usize {
        self.by_source.values().map(Vec::len).sum()
    }

    pub fn into_leftovers(self) -> BTreeMap<SourceTag, Vec<Candidate>> {
        self.by_source
    }
}
