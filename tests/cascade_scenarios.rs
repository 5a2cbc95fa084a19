use std::collections::HashMap;

use footy_xref::cascade::{AlternateNames, GroupCascade, Heuristic, Matcher, Stage};
use footy_xref::normalize::normalize;
use footy_xref::pool::{AvailabilityPool, Candidate};
use footy_xref::record::{NormalizedRecord, SourceTag};
use footy_xref::similarity::Scorer;

const SOURCES: [SourceTag; 2] = [SourceTag::Fotmob, SourceTag::Fbref];

/// Scores only the pairs it is told about; everything else is 0.
#[derive(Default)]
struct TableScorer {
    scores: HashMap<(String, String), u8>,
}

impl TableScorer {
    fn with(mut self, a: &str, b: &str, score: u8) -> Self {
        self.scores.insert((a.to_string(), b.to_string()), score);
        self
    }
}

impl Scorer for TableScorer {
    fn score(&self, a: &str, b: &str) -> u8 {
        self.scores
            .get(&(a.to_string(), b.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

fn candidates(source: SourceTag, names: &[&str]) -> Vec<Candidate> {
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let record = NormalizedRecord::new(source, *name, idx.to_string(), "Club", "https://example.test");
            Candidate::from_record(idx, &record)
        })
        .collect()
}

fn cascade(anchors: &[&str], fbref: &[&str]) -> GroupCascade {
    let mut pool = AvailabilityPool::new();
    pool.insert(SourceTag::Fbref, candidates(SourceTag::Fbref, fbref));
    GroupCascade::new(
        "Club",
        SourceTag::Fotmob,
        candidates(SourceTag::Fotmob, anchors),
        pool,
        &SOURCES,
    )
}

#[test]
fn fuzzy_claims_the_candidate_above_cutoff() {
    let scorer = TableScorer::default()
        .with("robert lewandowski", "r lewandowski", 85)
        .with("robert lewandowski", "robert lewa", 70);
    let matcher = Matcher {
        scorer: &scorer,
        cutoff: 80,
    };
    let mut cascade = cascade(&["Robert Lewandowski"], &["R. Lewandowski", "Robert Lewa"]);

    assert_eq!(cascade.apply(Stage::Exact, matcher), 0);
    assert_eq!(cascade.apply(Stage::Fuzzy, matcher), 1);
    assert!(cascade.is_settled());
    assert_eq!(cascade.pool().candidates(SourceTag::Fbref).len(), 1);
    assert_eq!(cascade.pool().candidates(SourceTag::Fbref)[0].key, "robert lewa");

    let outcome = cascade.finish();
    let slot = outcome.rows[0].slot(SourceTag::Fbref).expect("filled slot");
    assert_eq!(slot.candidate.display, "R. Lewandowski");
    assert_eq!(slot.heuristic, Heuristic::Fuzzy);
    assert_eq!(slot.score, 85);
}

#[test]
fn shared_surname_is_left_for_the_external_stage() {
    let scorer = TableScorer::default();
    let matcher = Matcher {
        scorer: &scorer,
        cutoff: 80,
    };
    let mut cascade = cascade(&["James Smith"], &["J. Smith", "John Smith"]);
    cascade.run_sync(&Heuristic::PLAYER_SYNC_PLAN, matcher);

    assert_eq!(cascade.pending().len(), 1);
    assert!(cascade.pending()[0].outstanding().contains(SourceTag::Fbref));
    assert_eq!(cascade.pool().candidates(SourceTag::Fbref).len(), 2);
}

#[test]
fn exact_match_wins_before_fuzzy_runs() {
    let scorer = TableScorer::default()
        .with("kai havertz", "k havertz", 99)
        .with("kai havertz", "kai havertz", 100);
    let matcher = Matcher {
        scorer: &scorer,
        cutoff: 80,
    };
    let mut cascade = cascade(&["Kai Havertz"], &["K. Havertz", "Kai Havertz"]);
    cascade.run_sync(&Heuristic::PLAYER_SYNC_PLAN, matcher);

    let outcome = cascade.finish();
    let slot = outcome.rows[0].slot(SourceTag::Fbref).expect("filled slot");
    assert_eq!(slot.heuristic, Heuristic::Exact);
    assert_eq!(slot.candidate.index, 1);
    assert_eq!(outcome.filled.get(&Heuristic::Fuzzy), None);
}

#[test]
fn consumed_candidates_are_invisible_to_later_anchors() {
    let scorer = TableScorer::default()
        .with("bukayo saka", "b saka", 90)
        .with("bukayo saka jr", "b saka", 95);
    let matcher = Matcher {
        scorer: &scorer,
        cutoff: 80,
    };
    let mut cascade = cascade(&["Bukayo Saka", "Bukayo Saka Jr"], &["B. Saka"]);
    cascade.run_sync(&Heuristic::PLAYER_SYNC_PLAN, matcher);

    let outcome = cascade.finish();
    assert!(outcome.rows[0].is_complete());
    assert!(!outcome.rows[1].is_complete());
    assert!(outcome.leftovers[&SourceTag::Fbref].is_empty());
}

#[test]
fn complete_rows_ignore_later_stages() {
    let scorer = TableScorer::default().with("declan rice", "d rice", 100);
    let matcher = Matcher {
        scorer: &scorer,
        cutoff: 80,
    };
    let mut cascade = cascade(&["Declan Rice"], &["Declan Rice", "D. Rice"]);
    cascade.run_sync(&Heuristic::PLAYER_SYNC_PLAN, matcher);

    let mut alternates = AlternateNames::new();
    alternates.insert(0, vec!["d rice".to_string()]);
    assert_eq!(cascade.apply(Stage::External(&alternates), matcher), 0);

    let outcome = cascade.finish();
    let slot = outcome.rows[0].slot(SourceTag::Fbref).expect("filled slot");
    assert_eq!(slot.candidate.key, "declan rice");
    assert_eq!(outcome.leftovers[&SourceTag::Fbref][0].key, "d rice");
}

#[test]
fn normalization_is_idempotent() {
    let samples = [
        "Kylian Mbappé",
        "  Ødegaard,   Martin ",
        "N'Golo Kanté",
        "Son Heung-min",
        "Ilkay Gündoğan",
        "Wojciech Szczęsny",
        "Đorđe Petrović",
        "",
        "123 !!!",
        "Łukasz Fabiański",
    ];
    for raw in samples {
        let once = normalize(raw);
        assert_eq!(normalize(&once), once, "not idempotent for {raw:?}");
        assert!(!once.starts_with(' ') && !once.ends_with(' '));
        assert!(!once.contains("  "));
    }
}
