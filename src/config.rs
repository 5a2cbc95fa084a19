use std::env;

use crate::error::PipelineError;
use crate::record::SourceTag;

pub const DEFAULT_FUZZY_CUTOFF: u8 = 80;
pub const DEFAULT_WIKI_BASE: &str = "https://en.wikipedia.org";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub club_anchor: SourceTag,
    pub player_anchor: SourceTag,
    pub sources: Vec<SourceTag>,
    pub fuzzy_cutoff: u8,
    pub external_lookup: bool,
    pub lookup_concurrency: usize,
    pub parallelism: usize,
    pub wiki_base: String,
    pub http_cache: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            club_anchor: SourceTag::Sofascore,
            player_anchor: SourceTag::Fotmob,
            sources: SourceTag::ALL.to_vec(),
            fuzzy_cutoff: DEFAULT_FUZZY_CUTOFF,
            external_lookup: true,
            lookup_concurrency: 8,
            parallelism: 4,
            wiki_base: DEFAULT_WIKI_BASE.to_string(),
            http_cache: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key/value source; unknown or unparsable values
    /// fall back to the defaults.
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let club_anchor = get("XREF_CLUB_ANCHOR")
            .and_then(|v| SourceTag::parse(&v))
            .unwrap_or(defaults.club_anchor);
        let player_anchor = get("XREF_PLAYER_ANCHOR")
            .and_then(|v| SourceTag::parse(&v))
            .unwrap_or(defaults.player_anchor);
        let sources = get("XREF_SOURCES")
            .map(|v| parse_source_list(&v))
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.sources);
        let fuzzy_cutoff = get("XREF_FUZZY_CUTOFF")
            .and_then(|v| v.trim().parse::<u8>().ok())
            .unwrap_or(defaults.fuzzy_cutoff)
            .clamp(50, 100);
        let external_lookup = get("XREF_LOOKUP")
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.external_lookup);
        let lookup_concurrency = get("XREF_LOOKUP_CONCURRENCY")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(defaults.lookup_concurrency)
            .clamp(1, 32);
        let parallelism = get("XREF_PARALLELISM")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(defaults.parallelism)
            .clamp(1, 32);
        let wiki_base = get("XREF_WIKI_BASE")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.wiki_base);
        let http_cache = get("XREF_HTTP_CACHE")
            .map(|v| parse_flag(&v))
            .unwrap_or(defaults.http_cache);

        Self {
            club_anchor,
            player_anchor,
            sources,
            fuzzy_cutoff,
            external_lookup,
            lookup_concurrency,
            parallelism,
            wiki_base,
            http_cache,
        }
    }

    pub fn check(&self) -> Result<(), PipelineError> {
        for anchor in [self.club_anchor, self.player_anchor] {
            if !self.sources.contains(&anchor) {
                return Err(PipelineError::AnchorNotParticipating { site: anchor });
            }
        }
        Ok(())
    }
}

fn parse_source_list(raw: &str) -> Vec<SourceTag> {
    let mut out = Vec::new();
    for part in raw.split(',') {
        if let Some(tag) = SourceTag::parse(part) {
            if !out.contains(&tag) {
                out.push(tag);
            }
        }
    }
    out
}

fn parse_flag(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no"
    )
}
