use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{info, warn};

use crate::cascade::{GroupCascade, Heuristic, Matcher};
use crate::error::PipelineError;
use crate::normalize::normalize;
use crate::pool::{AvailabilityPool, Candidate};
use crate::record::{LEAGUE_UNKNOWN, NormalizedRecord, RecordKind, SourceRecords, SourceTag};
use crate::report::{DataGap, GapKind};

/// `(source, club label) -> canonical club name`. Labels are compared by
/// their normalized key so cosmetic differences between a site's club list
/// and its roster pages still resolve.
#[derive(Debug, Clone, Default)]
pub struct CanonicalAliasMap {
    map: HashMap<(SourceTag, String), String>,
}

impl CanonicalAliasMap {
    pub fn canonical(&self, source: SourceTag, raw: &str) -> Option<&str> {
        self.map
            .get(&(source, normalize(raw)))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn insert(
        &mut self,
        source: SourceTag,
        raw: &str,
        canonical: &str,
        league: &str,
    ) -> Result<(), PipelineError> {
        let key = (source, normalize(raw));
        if let Some(existing) = self.map.get(&key) {
            if existing != canonical {
                return Err(PipelineError::DuplicateAlias {
                    site: source,
                    league: league.to_string(),
                    raw: raw.to_string(),
                    existing: existing.clone(),
                    conflicting: canonical.to_string(),
                });
            }
            return Ok(());
        }
        self.map.insert(key, canonical.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ClubMatch {
    pub league: String,
    pub canonical: NormalizedRecord,
    pub members: BTreeMap<SourceTag, Option<NormalizedRecord>>,
}

impl ClubMatch {
    pub fn is_complete(&self) -> bool {
        self.members.values().all(Option::is_some)
    }

    pub fn missing(&self) -> impl Iterator<Item = SourceTag> + '_ {
        self.members
            .iter()
            .filter(|(_, rec)| rec.is_none())
            .map(|(source, _)| *source)
    }
}

pub type ClubMatchTable = Vec<ClubMatch>;

#[derive(Debug, Clone, Default)]
pub struct ClubResolution {
    pub aliases: CanonicalAliasMap,
    pub table: ClubMatchTable,
    pub gaps: Vec<DataGap>,
    pub filled: BTreeMap<Heuristic, usize>,
}

/// Matches every site's club list against the anchor's, league by league.
///
/// Each heuristic runs across every league before the next one starts, so a
/// [`LEAGUE_UNKNOWN`] club that one league's anchor names exactly is never
/// taken by another league's fuzzy pass.
pub fn resolve_clubs(
    clubs: &SourceRecords,
    anchor: SourceTag,
    sources: &[SourceTag],
    matcher: Matcher<'_>,
) -> Result<ClubResolution, PipelineError> {
    let anchor_records = clubs
        .get(&anchor)
        .filter(|list| !list.is_empty())
        .ok_or(PipelineError::MissingAnchor {
            site: anchor,
            kind: RecordKind::Club,
        })?;

    let mut leagues: Vec<&str> = Vec::new();
    for record in anchor_records {
        if !leagues.contains(&record.group.as_str()) {
            leagues.push(record.group.as_str());
        }
    }

    let mut first_seen: HashMap<&str, &str> = HashMap::new();
    let mut cascades = Vec::with_capacity(leagues.len());
    for league in &leagues {
        let mut anchors = Vec::new();
        for (idx, record) in anchor_records.iter().enumerate() {
            if record.group != *league {
                continue;
            }
            if let Some(first_league) = first_seen.insert(record.name.as_str(), *league) {
                return Err(PipelineError::DuplicateAnchorClub {
                    site: anchor,
                    name: record.name.clone(),
                    first_league: first_league.to_string(),
                    league: league.to_string(),
                });
            }
            anchors.push(Candidate::from_record(idx, record));
        }

        let mut pool = AvailabilityPool::new();
        for source in sources.iter().copied().filter(|s| *s != anchor) {
            let Some(list) = clubs.get(&source) else {
                continue;
            };
            let candidates = list
                .iter()
                .enumerate()
                .filter(|(_, rec)| rec.group == *league || rec.group == LEAGUE_UNKNOWN)
                .map(|(idx, rec)| Candidate::from_record(idx, rec))
                .collect();
            pool.insert(source, candidates);
        }
        cascades.push(GroupCascade::new(*league, anchor, anchors, pool, sources));
    }

    let mut claimed: HashSet<(SourceTag, usize)> = HashSet::new();
    for heuristic in Heuristic::CLUB_PLAN {
        for cascade in cascades.iter_mut() {
            cascade.withdraw(|source, c| claimed.contains(&(source, c.index)));
            cascade.run_sync(&[heuristic], matcher);
            for row in cascade.rows() {
                for (source, slot) in row.slots() {
                    if let Some(slot) = slot {
                        claimed.insert((source, slot.candidate.index));
                    }
                }
            }
        }
    }

    let mut out = ClubResolution::default();
    for cascade in cascades {
        let outcome = cascade.finish();
        let league = outcome.group.as_str();
        for (heuristic, count) in &outcome.filled {
            *out.filled.entry(*heuristic).or_default() += count;
        }

        for row in &outcome.rows {
            let canonical = anchor_records[row.anchor.index].clone();
            out.aliases
                .insert(anchor, &canonical.name, &canonical.name, league)?;

            let mut members = BTreeMap::new();
            for (source, slot) in row.slots() {
                let Some(slot) = slot else {
                    warn!(
                        league,
                        club = %canonical.name,
                        site = %source,
                        "club has no confident match"
                    );
                    out.gaps.push(DataGap {
                        kind: GapKind::UnresolvedClub,
                        site: source,
                        group: league.to_string(),
                        name: canonical.name.clone(),
                    });
                    members.insert(source, None);
                    continue;
                };
                let Some(record) = clubs.get(&source).and_then(|list| list.get(slot.candidate.index)) else {
                    members.insert(source, None);
                    continue;
                };
                out.aliases
                    .insert(source, &record.name, &canonical.name, league)?;
                members.insert(source, Some(record.clone()));
            }

            out.table.push(ClubMatch {
                league: league.to_string(),
                canonical,
                members,
            });
        }
    }

    for source in sources.iter().copied().filter(|s| *s != anchor) {
        let Some(list) = clubs.get(&source) else {
            continue;
        };
        for (idx, record) in list.iter().enumerate() {
            if claimed.contains(&(source, idx)) {
                continue;
            }
            warn!(
                site = %source,
                league = %record.group,
                club = %record.name,
                "club missing from anchor source"
            );
            out.gaps.push(DataGap {
                kind: GapKind::OrphanClub,
                site: source,
                group: record.group.clone(),
                name: record.name.clone(),
            });
        }
    }

    let complete = out.table.iter().filter(|m| m.is_complete()).count();
    info!(
        clubs = out.table.len(),
        complete,
        aliases = out.aliases.len(),
        "club resolution finished"
    );
    Ok(out)
}
