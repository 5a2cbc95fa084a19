//! Name similarity scores on a 0-100 scale.
//!
//! `WeightedRatio` mixes a plain edit-distance ratio with token-order-insensitive
//! and substring variants, scaling the weaker signals down so a plain full match
//! always dominates. Inputs are expected to be normalized keys.

use std::collections::BTreeSet;

use strsim::normalized_levenshtein;

pub trait Scorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> u8;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedRatio;

impl Scorer for WeightedRatio {
    fn score(&self, a: &str, b: &str) -> u8 {
        to_score(weighted_ratio(a, b))
    }
}

/// Index and score of the best candidate at or above `cutoff`.
/// Ties keep the earliest candidate.
pub fn best_match<'a, I>(scorer: &dyn Scorer, probe: &str, candidates: I, cutoff: u8) -> Option<(usize, u8)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, u8)> = None;
    for (idx, candidate) in candidates.into_iter().enumerate() {
        let score = scorer.score(probe, candidate);
        if score < cutoff {
            continue;
        }
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((idx, score));
        }
    }
    best
}

pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    normalized_levenshtein(a, b) * 100.0
}

pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let short_len = short.chars().count();
    if short_len == 0 {
        return 0.0;
    }
    let long_chars: Vec<char> = long.chars().collect();
    if long_chars.len() == short_len {
        return ratio(short, long);
    }
    let mut best = 0.0f64;
    for start in 0..=(long_chars.len() - short_len) {
        let window: String = long_chars[start..start + short_len].iter().collect();
        let r = ratio(short, &window);
        if r > best {
            best = r;
            if best >= 100.0 {
                break;
            }
        }
    }
    best
}

pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    token_set_with(a, b, ratio)
}

fn partial_token_sort_ratio(a: &str, b: &str) -> f64 {
    partial_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn partial_token_set_ratio(a: &str, b: &str) -> f64 {
    let ta = token_set(a);
    let tb = token_set(b);
    if ta.intersection(&tb).next().is_some() {
        return 100.0;
    }
    partial_ratio(&join(ta.iter()), &join(tb.iter()))
}

pub fn weighted_ratio(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }
    const UNBASE_SCALE: f64 = 0.95;

    let base = ratio(a, b);
    let len_ratio = len_a.max(len_b) as f64 / len_a.min(len_b) as f64;

    if len_ratio < 1.5 {
        let tsor = token_sort_ratio(a, b) * UNBASE_SCALE;
        let tser = token_set_ratio(a, b) * UNBASE_SCALE;
        return base.max(tsor).max(tser);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    let partial = partial_ratio(a, b) * partial_scale;
    let ptsor = partial_token_sort_ratio(a, b) * UNBASE_SCALE * partial_scale;
    let ptser = partial_token_set_ratio(a, b) * UNBASE_SCALE * partial_scale;
    base.max(partial).max(ptsor).max(ptser)
}

fn token_set_with(a: &str, b: &str, score: fn(&str, &str) -> f64) -> f64 {
    let ta = token_set(a);
    let tb = token_set(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let inter = join(ta.intersection(&tb));
    let diff_ab = join(ta.difference(&tb));
    let diff_ba = join(tb.difference(&ta));

    let combined_ab = concat(&inter, &diff_ab);
    let combined_ba = concat(&inter, &diff_ba);

    let mut best = score(&combined_ab, &combined_ba);
    if !inter.is_empty() {
        best = best
            .max(score(&inter, &combined_ab))
            .max(score(&inter, &combined_ba));
    }
    best
}

fn token_set(s: &str) -> BTreeSet<&str> {
    s.split_whitespace().collect()
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn join<'a, 'b: 'a>(tokens: impl Iterator<Item = &'a &'b str>) -> String {
    tokens.copied().collect::<Vec<_>>().join(" ")
}

fn concat(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{head} {tail}"),
    }
}

fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_scores_full() {
        assert_eq!(WeightedRatio.score("bukayo saka", "bukayo saka"), 100);
    }

    #[test]
    fn empty_scores_zero() {
        assert_eq!(WeightedRatio.score("", "saka"), 0);
        assert_eq!(WeightedRatio.score("saka", ""), 0);
    }

    #[test]
    fn token_order_is_mostly_ignored() {
        assert_eq!(WeightedRatio.score("son heung min", "heung min son"), 95);
    }

    #[test]
    fn abbreviation_clears_default_cutoff() {
        assert!(WeightedRatio.score("manchester united", "manchester utd") >= 80);
    }

    #[test]
    fn acronym_stays_below_default_cutoff() {
        assert!(WeightedRatio.score("paris saint germain", "psg") < 80);
        assert!(WeightedRatio.score("psg", "paris saint germain") < 80);
    }

    #[test]
    fn unrelated_names_score_low() {
        assert!(WeightedRatio.score("harry kane", "virgil van dijk") < 50);
    }

    #[test]
    fn partial_ratio_finds_substring() {
        assert_eq!(partial_ratio("lewa", "robert lewandowski"), 100.0);
        assert_eq!(partial_ratio("", "x"), 0.0);
    }

    #[test]
    fn token_set_subset_is_full() {
        assert_eq!(token_set_ratio("kane", "harry kane"), 100.0);
    }

    struct Table;

    impl Scorer for Table {
        fn score(&self, _a: &str, b: &str) -> u8 {
            match b {
                "first" => 90,
                "second" => 90,
                "low" => 40,
                _ => 0,
            }
        }
    }

    #[test]
    fn best_match_respects_cutoff_and_keeps_first_on_tie() {
        let pool = ["low", "first", "second"];
        assert_eq!(best_match(&Table, "x", pool, 80), Some((1, 90)));
        assert_eq!(best_match(&Table, "x", ["low"], 80), None);
    }
}
