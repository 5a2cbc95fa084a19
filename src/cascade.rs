//! Multi-stage matching of anchor records against the other sources' pools.
//!
//! Each pass walks the still-unresolved rows in anchor order and lets one
//! heuristic claim at most one candidate per outstanding source. Claimed
//! candidates leave the pool at once, so later rows in the same pass and every
//! later pass only see what is left. Rows with no outstanding source move to
//! the complete list after the pass and are never touched again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::match_row::{MatchRow, Slot};
use crate::normalize::last_token;
use crate::pool::{AvailabilityPool, Candidate};
use crate::record::SourceTag;
use crate::similarity::{Scorer, best_match};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Heuristic {
    Exact,
    Fuzzy,
    CommonSurname,
    External,
}

impl Heuristic {
    pub const CLUB_PLAN: [Heuristic; 2] = [Heuristic::Exact, Heuristic::Fuzzy];
    pub const PLAYER_SYNC_PLAN: [Heuristic; 3] =
        [Heuristic::Exact, Heuristic::Fuzzy, Heuristic::CommonSurname];

    pub fn as_str(self) -> &'static str {
        match self {
            Heuristic::Exact => "exact",
            Heuristic::Fuzzy => "fuzzy",
            Heuristic::CommonSurname => "common_surname",
            Heuristic::External => "external",
        }
    }
}

pub type AlternateNames = BTreeMap<usize, Vec<String>>;

#[derive(Debug, Clone, Copy)]
pub enum Stage<'a> {
    Exact,
    Fuzzy,
    CommonSurname,
    External(&'a AlternateNames),
}

impl Stage<'_> {
    pub fn heuristic(&self) -> Heuristic {
        match self {
            Stage::Exact => Heuristic::Exact,
            Stage::Fuzzy => Heuristic::Fuzzy,
            Stage::CommonSurname => Heuristic::CommonSurname,
            Stage::External(_) => Heuristic::External,
        }
    }
}

#[derive(Clone, Copy)]
pub struct Matcher<'a> {
    pub scorer: &'a dyn Scorer,
    pub cutoff: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Claim {
    source: SourceTag,
    position: usize,
    score: u8,
}

fn propose(stage: Stage<'_>, row: &MatchRow, pool: &AvailabilityPool, matcher: Matcher<'_>) -> Vec<Claim> {
    let key = row.anchor.key.as_str();
    if key.is_empty() {
        return Vec::new();
    }
    let mut claims = Vec::new();
    for source in row.outstanding().iter() {
        let found = match stage {
            Stage::Exact => pool
                .position_of_key(source, key)
                .map(|position| (position, 100)),
            Stage::Fuzzy => best_match(matcher.scorer, key, pool.keys(source), matcher.cutoff),
            Stage::CommonSurname => sole_surname_match(key, pool.candidates(source)),
            Stage::External(alternates) => alternates.get(&row.id).and_then(|names| {
                names.iter().find_map(|alt| {
                    best_match(matcher.scorer, alt, pool.keys(source), matcher.cutoff)
                })
            }),
        };
        if let Some((position, score)) = found {
            claims.push(Claim {
                source,
                position,
                score,
            });
        }
    }
    claims
}

fn sole_surname_match(key: &str, candidates: &[Candidate]) -> Option<(usize, u8)> {
    let surname = last_token(key)?;
    let mut hits = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| last_token(&c.key) == Some(surname))
        .map(|(position, _)| position);
    let first = hits.next()?;
    if hits.next().is_some() {
        return None;
    }
    Some((first, 100))
}

#[derive(Debug)]
pub struct GroupCascade {
    group: String,
    working: Vec<MatchRow>,
    complete: Vec<MatchRow>,
    pool: AvailabilityPool,
    filled: BTreeMap<Heuristic, usize>,
}

#[derive(Debug)]
pub struct CascadeOutcome {
    pub group: String,
    pub rows: Vec<MatchRow>,
    pub filled: BTreeMap<Heuristic, usize>,
    pub leftovers: BTreeMap<SourceTag, Vec<Candidate>>,
}

impl CascadeOutcome {
    pub fn complete_rows(&self) -> impl Iterator<Item = &MatchRow> {
        self.rows.iter().filter(|r| r.is_complete())
    }

    pub fn unresolved_rows(&self) -> impl Iterator<Item = &MatchRow> {
        self.rows.iter().filter(|r| !r.is_complete())
    }
}

impl GroupCascade {
    pub fn new(
        group: impl Into<String>,
        anchor_source: SourceTag,
        anchors: Vec<Candidate>,
        pool: AvailabilityPool,
        sources: &[SourceTag],
    ) -> Self {
        let group = group.into();
        let rows: Vec<MatchRow> = anchors
            .into_iter()
            .enumerate()
            .map(|(id, anchor)| MatchRow::new(id, group.clone(), anchor_source, anchor, sources))
            .collect();
        let (complete, working): (Vec<_>, Vec<_>) = rows.into_iter().partition(|r| r.is_complete());
        Self {
            group,
            working,
            complete,
            pool,
            filled: BTreeMap::new(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn pending(&self) -> &[MatchRow] {
        &self.working
    }

    pub fn pool(&self) -> &AvailabilityPool {
        &self.pool
    }

    pub fn is_settled(&self) -> bool {
        self.working.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &MatchRow> {
        self.complete.iter().chain(self.working.iter())
    }

    pub fn withdraw(&mut self, claimed: impl Fn(SourceTag, &Candidate) -> bool) {
        self.pool.retain(|source, candidate| !claimed(source, candidate));
    }

    pub fn apply(&mut self, stage: Stage<'_>, matcher: Matcher<'_>) -> usize {
        if self.working.is_empty() {
            return 0;
        }
        let heuristic = stage.heuristic();
        let mut filled = 0usize;
        for row in self.working.iter_mut() {
            let claims = propose(stage, row, &self.pool, matcher);
            for claim in claims {
                let Some(candidate) = self.pool.take(claim.source, claim.position) else {
                    continue;
                };
                let slot = Slot {
                    candidate,
                    heuristic,
                    score: claim.score,
                };
                if row.fill(claim.source, slot) {
                    filled += 1;
                }
            }
        }
        *self.filled.entry(heuristic).or_default() += filled;

        let (done, still): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.working).into_iter().partition(|r| r.is_complete());
        let newly_complete = done.len();
        self.complete.extend(done);
        self.working = still;

        debug!(
            group = %self.group,
            heuristic = heuristic.as_str(),
            filled,
            newly_complete,
            pending = self.working.len(),
            "cascade pass"
        );
        filled
    }

    /// Applies the synchronous heuristics of `plan` in order. `External` entries
    /// are skipped; they need alternates from [`GroupCascade::apply`].
    pub fn run_sync(&mut self, plan: &[Heuristic], matcher: Matcher<'_>) {
        for heuristic in plan {
            if self.is_settled() {
                break;
            }
            let stage = match heuristic {
                Heuristic::Exact => Stage::Exact,
                Heuristic::Fuzzy => Stage::Fuzzy,
                Heuristic::CommonSurname => Stage::CommonSurname,
                Heuristic::External => continue,
            };
            self.apply(stage, matcher);
        }
    }

    pub fn finish(self) -> CascadeOutcome {
        let mut rows = self.complete;
        rows.extend(self.working);
        rows.sort_by_key(|r| r.id);
        CascadeOutcome {
            group: self.group,
            rows,
            filled: self.filled,
            leftovers: self.pool.into_leftovers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::WeightedRatio;

    const S: [SourceTag; 3] = [SourceTag::Fotmob, SourceTag::Fbref, SourceTag::Understat];

    fn cand(key: &str, index: usize) -> Candidate {
        Candidate {
            key: key.to_string(),
            display: key.to_string(),
            index,
        }
    }

    fn pool_of(fbref: &[&str], understat: &[&str]) -> AvailabilityPool {
        let mut pool = AvailabilityPool::new();
        pool.insert(
            SourceTag::Fbref,
            fbref.iter().enumerate().map(|(i, k)| cand(k, i)).collect(),
        );
        pool.insert(
            SourceTag::Understat,
            understat.iter().enumerate().map(|(i, k)| cand(k, i)).collect(),
        );
        pool
    }

    fn anchors(keys: &[&str]) -> Vec<Candidate> {
        keys.iter().enumerate().map(|(i, k)| cand(k, i)).collect()
    }

    fn matcher() -> Matcher<'static> {
        Matcher {
            scorer: &WeightedRatio,
            cutoff: 80,
        }
    }

    #[test]
    fn exact_pass_completes_and_consumes() {
        let mut cascade = GroupCascade::new(
            "Arsenal",
            SourceTag::Fotmob,
            anchors(&["bukayo saka", "declan rice"]),
            pool_of(&["declan rice", "bukayo saka"], &["bukayo saka"]),
            &S,
        );
        let filled = cascade.apply(Stage::Exact, matcher());
        assert_eq!(filled, 3);
        assert_eq!(cascade.pending().len(), 1);
        assert_eq!(cascade.pending()[0].anchor.key, "declan rice");
        assert_eq!(cascade.pool().candidates(SourceTag::Fbref).len(), 0);
        assert_eq!(cascade.pool().candidates(SourceTag::Understat).len(), 0);
    }

    #[test]
    fn surname_pass_needs_a_single_candidate() {
        let mut cascade = GroupCascade::new(
            "Everton",
            SourceTag::Fotmob,
            anchors(&["james smith", "kevin okafor"]),
            pool_of(&["j smith", "john smith"], &["k okafor"]),
            &S,
        );
        cascade.apply(Stage::CommonSurname, matcher());
        let outcome = cascade.finish();
        let james = &outcome.rows[0];
        assert!(james.slot(SourceTag::Fbref).is_none());
        let kevin = &outcome.rows[1];
        let slot = kevin.slot(SourceTag::Understat).expect("surname match");
        assert_eq!(slot.candidate.key, "k okafor");
        assert_eq!(slot.heuristic, Heuristic::CommonSurname);
        assert_eq!(outcome.leftovers[&SourceTag::Fbref].len(), 2);
    }

    #[test]
    fn external_uses_first_matching_alternate() {
        let mut cascade = GroupCascade::new(
            "Real Madrid",
            SourceTag::Fotmob,
            anchors(&["vinicius junior"]),
            pool_of(&["vinicius jose paixao de oliveira junior"], &["vini jr"]),
            &S,
        );
        let mut alternates = AlternateNames::new();
        alternates.insert(
            0,
            vec![
                "vini jr".to_string(),
                "vinicius jose paixao de oliveira junior".to_string(),
            ],
        );
        cascade.apply(Stage::External(&alternates), matcher());
        let outcome = cascade.finish();
        let row = &outcome.rows[0];
        assert!(row.is_complete());
        assert_eq!(row.slot(SourceTag::Understat).unwrap().candidate.key, "vini jr");
        assert_eq!(
            row.slot(SourceTag::Fbref).unwrap().heuristic,
            Heuristic::External
        );
        assert_eq!(outcome.filled[&Heuristic::External], 2);
    }

    #[test]
    fn empty_anchor_key_never_matches() {
        let mut cascade = GroupCascade::new(
            "X",
            SourceTag::Fotmob,
            anchors(&[""]),
            pool_of(&[""], &[""]),
            &S,
        );
        cascade.run_sync(&Heuristic::PLAYER_SYNC_PLAN, matcher());
        assert_eq!(cascade.pending().len(), 1);
    }

    #[test]
    fn withdrawn_candidates_cannot_be_claimed() {
        let mut cascade = GroupCascade::new(
            "Serie A",
            SourceTag::Fotmob,
            anchors(&["inter"]),
            pool_of(&["inter milan", "inter miami cf"], &["inter milan"]),
            &S,
        );
        cascade.withdraw(|source, c| source == SourceTag::Fbref && c.key == "inter milan");
        assert_eq!(cascade.pool().keys(SourceTag::Fbref).collect::<Vec<_>>(), vec!["inter miami cf"]);
        assert_eq!(cascade.pool().candidates(SourceTag::Understat).len(), 1);
        assert_eq!(cascade.rows().count(), 1);
    }

    #[test]
    fn settled_cascade_skips_remaining_passes() {
        let mut cascade = GroupCascade::new(
            "Arsenal",
            SourceTag::Fotmob,
            anchors(&["bukayo saka"]),
            pool_of(&["bukayo saka"], &["bukayo saka", "b saka"]),
            &S,
        );
        cascade.run_sync(&Heuristic::PLAYER_SYNC_PLAN, matcher());
        assert!(cascade.is_settled());
        let outcome = cascade.finish();
        assert_eq!(outcome.filled.get(&Heuristic::Fuzzy), None);
        assert_eq!(outcome.leftovers[&SourceTag::Understat][0].key, "b saka");
    }
}
