//! Last-resort alternate names from an external reference service.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cascade::AlternateNames;
use crate::config::PipelineConfig;
use crate::error::LookupError;
use crate::http_cache::fetch_text_cached;
use crate::http_client::http_client;
use crate::normalize::normalize;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub alternate_names: Vec<String>,
}

/// Text search plus summary retrieval. `Ok(None)` from `search` means no hit.
#[async_trait]
pub trait ReferenceLookup: Send + Sync {
    async fn search(&self, text: &str) -> Result<Option<String>, LookupError>;

    async fn summary(&self, key: &str) -> Result<Summary, LookupError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    pages: Vec<SearchPage>,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    key: String,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    extract_html: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WikipediaLookup {
    client: Client,
    base: Url,
    cached: bool,
}

impl WikipediaLookup {
    pub fn new(base: &str, cached: bool) -> anyhow::Result<Self> {
        let base = Url::parse(base).map_err(|err| anyhow::anyhow!("invalid wiki base '{base}': {err}"))?;
        Ok(Self {
            client: http_client()?.clone(),
            base,
            cached,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> anyhow::Result<Self> {
        Self::new(&config.wiki_base, config.http_cache)
    }

    pub(crate) fn search_url(&self, text: &str) -> Result<Url, LookupError> {
        let mut url = self.endpoint(&["w", "rest.php", "v1", "search", "page"])?;
        url.query_pairs_mut()
            .append_pair("q", text)
            .append_pair("limit", "1");
        Ok(url)
    }

    pub(crate) fn summary_url(&self, key: &str) -> Result<Url, LookupError> {
        self.endpoint(&["api", "rest_v1", "page", "summary", key])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, LookupError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| LookupError::Malformed(format!("wiki base {} cannot take a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_text(&self, url: Url) -> Result<String, LookupError> {
        if self.cached {
            return fetch_text_cached(&self.client, url.as_str())
                .await
                .map_err(|err| match err.status {
                    Some(status) => LookupError::Api {
                        status: status.as_u16(),
                        message: format!("{:#}", err.error),
                    },
                    None => LookupError::Unavailable(format!("{:#}", err.error)),
                });
        }
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(LookupError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl ReferenceLookup for WikipediaLookup {
    async fn search(&self, text: &str) -> Result<Option<String>, LookupError> {
        let body = self.get_text(self.search_url(text)?).await?;
        let parsed: SearchResponse = serde_json::from_str(&body)?;
        Ok(parsed.pages.into_iter().next().map(|page| page.key))
    }

    async fn summary(&self, key: &str) -> Result<Summary, LookupError> {
        let body = self.get_text(self.summary_url(key)?).await?;
        let parsed: SummaryResponse = serde_json::from_str(&body)?;
        let html = parsed.extract_html.unwrap_or_default();
        Ok(Summary {
            alternate_names: extract_bold_terms(&html),
        })
    }
}

pub fn extract_bold_terms(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("b") else {
        return Vec::new();
    };
    let doc = Html::parse_fragment(html);
    let mut out: Vec<String> = Vec::new();
    for element in doc.select(&selector) {
        let text: String = element.text().collect();
        let key = normalize(&text);
        if !key.is_empty() && !out.contains(&key) {
            out.push(key);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupProbe {
    pub group_index: usize,
    pub row_id: usize,
    pub name: String,
    pub group: String,
}

#[derive(Debug, Default)]
pub struct LookupBatch {
    pub alternates: BTreeMap<usize, AlternateNames>,
    pub issued: usize,
    pub failed: usize,
    pub with_alternates: usize,
}

pub struct ExternalDisambiguator<'a, L: ReferenceLookup + ?Sized> {
    lookup: &'a L,
}

impl<'a, L: ReferenceLookup + ?Sized> ExternalDisambiguator<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }

    pub async fn alternate_names(&self, anchor: &str, group: &str) -> Vec<String> {
        match self.lookup_alternates(anchor, group).await {
            Ok(names) => names,
            Err(err) => {
                warn!(anchor, group, error = %err, "alternate name lookup failed");
                Vec::new()
            }
        }
    }

    pub async fn lookup_alternates(&self, anchor: &str, group: &str) -> Result<Vec<String>, LookupError> {
        let Some(key) = self.lookup.search(&format!("{anchor} {group}")).await? else {
            debug!(anchor, group, "no search hit");
            return Ok(Vec::new());
        };
        let summary = self.lookup.summary(&key).await?;
        let anchor_key = normalize(anchor);
        let mut names: Vec<String> = Vec::new();
        for alt in summary.alternate_names.iter().map(|alt| normalize(alt)) {
            if is_alternate(&anchor_key, &alt) && !names.contains(&alt) {
                names.push(alt);
            }
        }
        Ok(names)
    }

    pub async fn resolve_all(&self, probes: Vec<LookupProbe>, concurrency: usize) -> LookupBatch {
        let issued = probes.len();
        let mut results: Vec<(LookupProbe, Result<Vec<String>, LookupError>)> =
            stream::iter(probes.into_iter().map(|probe| async move {
                let outcome = self.lookup_alternates(&probe.name, &probe.group).await;
                (probe, outcome)
            }))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        results.sort_by_key(|(probe, _)| (probe.group_index, probe.row_id));

        let mut batch = LookupBatch {
            issued,
            ..LookupBatch::default()
        };
        for (probe, outcome) in results {
            let names = match outcome {
                Ok(names) => names,
                Err(err) => {
                    warn!(
                        player = %probe.name,
                        club = %probe.group,
                        error = %err,
                        "alternate name lookup failed"
                    );
                    batch.failed += 1;
                    continue;
                }
            };
            if names.is_empty() {
                continue;
            }
            batch.with_alternates += 1;
            batch
                .alternates
                .entry(probe.group_index)
                .or_default()
                .insert(probe.row_id, names);
        }
        info!(
            issued = batch.issued,
            failed = batch.failed,
            with_alternates = batch.with_alternates,
            "external lookups finished"
        );
        batch
    }
}

fn is_alternate(anchor_key: &str, alt: &str) -> bool {
    !alt.is_empty() && !anchor_key.contains(alt) && !alt.contains(anchor_key)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct StubLookup {
        hits: HashMap<String, String>,
        summaries: HashMap<String, Vec<String>>,
        broken: Vec<String>,
    }

    #[async_trait]
    impl ReferenceLookup for StubLookup {
        async fn search(&self, text: &str) -> Result<Option<String>, LookupError> {
            if self.broken.iter().any(|b| text.starts_with(b.as_str())) {
                return Err(LookupError::Unavailable("connection reset".to_string()));
            }
            Ok(self.hits.get(text).cloned())
        }

        async fn summary(&self, key: &str) -> Result<Summary, LookupError> {
            self.summaries
                .get(key)
                .map(|names| Summary {
                    alternate_names: names.clone(),
                })
                .ok_or_else(|| LookupError::Api {
                    status: 404,
                    message: "not found".to_string(),
                })
        }
    }

    fn stub() -> StubLookup {
        let mut lookup = StubLookup::default();
        lookup
            .hits
            .insert("Vinicius Junior Real Madrid".to_string(), "Vinícius_Júnior".to_string());
        lookup.summaries.insert(
            "Vinícius_Júnior".to_string(),
            vec![
                "vinicius jose paixao de oliveira junior".to_string(),
                "vinicius".to_string(),
                "vini jr".to_string(),
            ],
        );
        lookup.broken.push("Rodrygo".to_string());
        lookup
    }

    #[test]
    fn bold_terms_are_normalized_and_deduplicated() {
        let html = "<p><b>Vinícius José Paixão de Oliveira Júnior</b> (born 12 July 2000), \
                    known as <b>Vinícius Júnior</b> or <b>Vini Jr.</b>, is a <b>Vini Jr</b> \
                    Brazilian footballer.</p>";
        assert_eq!(
            extract_bold_terms(html),
            vec![
                "vinicius jose paixao de oliveira junior",
                "vinicius junior",
                "vini jr"
            ]
        );
        assert!(extract_bold_terms("").is_empty());
    }

    #[tokio::test]
    async fn substring_alternates_are_dropped() {
        let lookup = stub();
        let names = ExternalDisambiguator::new(&lookup)
            .alternate_names("Vinicius Junior", "Real Madrid")
            .await;
        assert_eq!(
            names,
            vec!["vinicius jose paixao de oliveira junior", "vini jr"]
        );
    }

    #[tokio::test]
    async fn raw_summary_names_are_normalized() {
        let mut lookup = StubLookup::default();
        lookup
            .hits
            .insert("Vinicius Junior Real Madrid".to_string(), "Vini".to_string());
        lookup.summaries.insert(
            "Vini".to_string(),
            vec![
                "Vini Jr.".to_string(),
                "VINI JR".to_string(),
                "Vinícius Júnior".to_string(),
            ],
        );
        let names = ExternalDisambiguator::new(&lookup)
            .alternate_names("Vinicius Junior", "Real Madrid")
            .await;
        assert_eq!(names, vec!["vini jr"]);
    }

    #[tokio::test]
    async fn failures_degrade_to_no_alternates() {
        let lookup = stub();
        let disambiguator = ExternalDisambiguator::new(&lookup);
        assert!(disambiguator.alternate_names("Rodrygo", "Real Madrid").await.is_empty());
        assert!(disambiguator.alternate_names("Nobody", "Real Madrid").await.is_empty());
        assert!(
            disambiguator
                .lookup_alternates("Rodrygo", "Real Madrid")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn batch_is_keyed_by_group_and_row() {
        let lookup = stub();
        let probes = vec![
            LookupProbe {
                group_index: 3,
                row_id: 7,
                name: "Rodrygo".to_string(),
                group: "Real Madrid".to_string(),
            },
            LookupProbe {
                group_index: 3,
                row_id: 2,
                name: "Vinicius Junior".to_string(),
                group: "Real Madrid".to_string(),
            },
            LookupProbe {
                group_index: 1,
                row_id: 0,
                name: "Nobody".to_string(),
                group: "Getafe".to_string(),
            },
        ];
        let batch = ExternalDisambiguator::new(&lookup).resolve_all(probes, 2).await;
        assert_eq!(batch.issued, 3);
        assert_eq!(batch.failed, 1);
        assert_eq!(batch.with_alternates, 1);
        assert_eq!(batch.alternates.len(), 1);
        assert_eq!(batch.alternates[&3][&2][1], "vini jr");
    }

    #[test]
    fn wikipedia_urls_are_built_under_the_base() {
        let lookup = WikipediaLookup::new("http://localhost:9000/", false).expect("lookup");
        let search = lookup.search_url("Vinicius Junior Real Madrid").expect("url");
        assert_eq!(search.path(), "/w/rest.php/v1/search/page");
        let pairs: Vec<(String, String)> = search
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "Vinicius Junior Real Madrid".to_string()),
                ("limit".to_string(), "1".to_string())
            ]
        );
        let summary = lookup.summary_url("AC/DC").expect("url");
        assert_eq!(summary.path(), "/api/rest_v1/page/summary/AC%2FDC");
    }
}
