use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info, warn};

use crate::cascade::GroupCascade;
use crate::club_resolver::CanonicalAliasMap;
use crate::error::PipelineError;
use crate::normalize::normalize;
use crate::pool::{AvailabilityPool, Candidate};
use crate::record::{NormalizedRecord, RecordKind, SourceRecords, SourceTag};
use crate::report::{DataGap, GapKind};

/// A player whose normalized name occurs exactly once on every source's
/// roster for the club. Complete without running the cascade.
#[derive(Debug, Clone)]
pub struct ExactRow {
    pub club: String,
    pub key: String,
    pub members: BTreeMap<SourceTag, NormalizedRecord>,
}

#[derive(Debug, Clone)]
pub struct ClubRoster {
    pub club: String,
    pub residual: BTreeMap<SourceTag, Vec<NormalizedRecord>>,
}

impl ClubRoster {
    pub fn residual_of(&self, source: SourceTag) -> &[NormalizedRecord] {
        self.residual
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn cascade(&self, anchor: SourceTag, sources: &[SourceTag]) -> GroupCascade {
        let anchors = candidates(self.residual_of(anchor));
        let mut pool = AvailabilityPool::new();
        for source in sources.iter().copied().filter(|s| *s != anchor) {
            pool.insert(source, candidates(self.residual_of(source)));
        }
        GroupCascade::new(self.club.clone(), anchor, anchors, pool, sources)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RosterPartition {
    pub exact: Vec<ExactRow>,
    pub clubs: Vec<ClubRoster>,
    pub gaps: Vec<DataGap>,
}

/// Re-labels every roster with its canonical club and splits each club into
/// exact-unique rows and residual rosters.
pub fn partition_rosters(
    players: &SourceRecords,
    aliases: &CanonicalAliasMap,
    anchor: SourceTag,
    sources: &[SourceTag],
) -> Result<RosterPartition, PipelineError> {
    if players.get(&anchor).is_none_or(|list| list.is_empty()) {
        return Err(PipelineError::MissingAnchor {
            site: anchor,
            kind: RecordKind::Player,
        });
    }

    let mut out = RosterPartition::default();
    let by_club = group_by_canonical_club(players, aliases, sources, &mut out.gaps);

    for (club, rosters) in by_club {
        let mut counts: HashMap<SourceTag, HashMap<String, usize>> = HashMap::new();
        for (source, list) in &rosters {
            let per_source = counts.entry(*source).or_default();
            for record in list {
                *per_source.entry(normalize(&record.name)).or_default() += 1;
            }
        }
        let unique_everywhere = |key: &str| {
            sources.iter().all(|source| {
                counts
                    .get(source)
                    .and_then(|c| c.get(key))
                    .is_some_and(|n| *n == 1)
            })
        };

        let mut exact_keys = BTreeSet::new();
        if let Some(anchor_list) = rosters.get(&anchor) {
            for record in anchor_list {
                let key = normalize(&record.name);
                if key.is_empty() || !unique_everywhere(&key) {
                    continue;
                }
                exact_keys.insert(key);
            }
        }

        let mut exact_members: BTreeMap<&str, BTreeMap<SourceTag, NormalizedRecord>> = BTreeMap::new();
        let mut residual: BTreeMap<SourceTag, Vec<NormalizedRecord>> = BTreeMap::new();
        for (source, list) in &rosters {
            for record in list {
                let key = normalize(&record.name);
                match exact_keys.get(key.as_str()) {
                    Some(stored) => {
                        exact_members
                            .entry(stored.as_str())
                            .or_default()
                            .insert(*source, record.clone());
                    }
                    None => residual.entry(*source).or_default().push(record.clone()),
                }
            }
        }

        for (key, members) in exact_members {
            out.exact.push(ExactRow {
                club: club.clone(),
                key: key.to_string(),
                members,
            });
        }

        let anchor_pending = residual.get(&anchor).map_or(0, Vec::len);
        if anchor_pending == 0 {
            let stranded: usize = residual.values().map(Vec::len).sum();
            if stranded > 0 {
                debug!(club = %club, stranded, "no anchor players left to disambiguate");
            }
            continue;
        }
        out.clubs.push(ClubRoster { club, residual });
    }

    info!(
        exact = out.exact.len(),
        clubs_to_disambiguate = out.clubs.len(),
        unaliased = out.gaps.len(),
        "rosters partitioned"
    );
    Ok(out)
}

fn group_by_canonical_club(
    players: &SourceRecords,
    aliases: &CanonicalAliasMap,
    sources: &[SourceTag],
    gaps: &mut Vec<DataGap>,
) -> BTreeMap<String, BTreeMap<SourceTag, Vec<NormalizedRecord>>> {
    let mut by_club: BTreeMap<String, BTreeMap<SourceTag, Vec<NormalizedRecord>>> = BTreeMap::new();
    for (source, list) in players {
        if !sources.contains(source) {
            debug!(site = %source, records = list.len(), "skipping non-participating source");
            continue;
        }
        for record in list {
            let Some(club) = aliases.canonical(*source, &record.group) else {
                gaps.push(DataGap {
                    kind: GapKind::UnaliasedPlayer,
                    site: *source,
                    group: record.group.clone(),
                    name: record.name.clone(),
                });
                continue;
            };
            let mut relabelled = record.clone();
            relabelled.group = club.to_string();
            by_club
                .entry(club.to_string())
                .or_default()
                .entry(*source)
                .or_default()
                .push(relabelled);
        }
    }

    let mut unaliased_labels: BTreeSet<(SourceTag, &str)> = BTreeSet::new();
    for gap in gaps.iter() {
        unaliased_labels.insert((gap.site, gap.group.as_str()));
    }
    for (site, label) in unaliased_labels {
        warn!(site = %site, club = label, "roster club has no canonical alias; players skipped");
    }
    by_club
}

fn candidates(records: &[NormalizedRecord]) -> Vec<Candidate> {
    records
        .iter()
        .enumerate()
        .map(|(idx, record)| Candidate::from_record(idx, record))
        .collect()
}
