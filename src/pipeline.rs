//! End-to-end matching run: clubs, rosters, cascades, lookups, join.

use tracing::{info, warn};

use crate::cascade::{CascadeOutcome, GroupCascade, Heuristic, Matcher, Stage};
use crate::club_resolver::resolve_clubs;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::join::{MatchedTables, Resolution, assemble_clubs, assemble_players};
use crate::lookup::{ExternalDisambiguator, LookupProbe, ReferenceLookup};
use crate::record::{RecordKind, SourceRecords, validate_records};
use crate::report::{DataGap, GapKind, RunReport};
use crate::roster::{ClubRoster, partition_rosters};
use crate::similarity::{Scorer, WeightedRatio};

#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    pub clubs: SourceRecords,
    pub players: SourceRecords,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub tables: MatchedTables,
    pub report: RunReport,
}

pub async fn run_pipeline<L>(
    input: &PipelineInput,
    config: &PipelineConfig,
    lookup: &L,
) -> Result<PipelineOutput, PipelineError>
where
    L: ReferenceLookup + ?Sized,
{
    run_pipeline_with_scorer(input, config, lookup, &WeightedRatio).await
}

pub async fn run_pipeline_with_scorer<L>(
    input: &PipelineInput,
    config: &PipelineConfig,
    lookup: &L,
    scorer: &dyn Scorer,
) -> Result<PipelineOutput, PipelineError>
where
    L: ReferenceLookup + ?Sized,
{
    config.check()?;
    validate_records(RecordKind::Club, &input.clubs)?;
    validate_records(RecordKind::Player, &input.players)?;

    let matcher = Matcher {
        scorer,
        cutoff: config.fuzzy_cutoff,
    };
    let mut report = RunReport::default();

    let clubs = resolve_clubs(&input.clubs, config.club_anchor, &config.sources, matcher)?;
    report.add_filled(&clubs.filled);
    report.gaps.extend(clubs.gaps.iter().cloned());

    let partition = partition_rosters(
        &input.players,
        &clubs.aliases,
        config.player_anchor,
        &config.sources,
    )?;
    report.gaps.extend(partition.gaps.iter().cloned());

    let mut cascades = run_sync_cascades(&partition.clubs, config, matcher);

    if config.external_lookup {
        let probes = lookup_probes(&cascades);
        if !probes.is_empty() {
            let batch = ExternalDisambiguator::new(lookup)
                .resolve_all(probes, config.lookup_concurrency)
                .await;
            report.lookups_issued = batch.issued;
            report.lookups_failed = batch.failed;
            report.lookups_with_alternates = batch.with_alternates;
            for (group_index, alternates) in &batch.alternates {
                if let Some(cascade) = cascades.get_mut(*group_index) {
                    cascade.apply(Stage::External(alternates), matcher);
                }
            }
        }
    }

    let outcomes: Vec<CascadeOutcome> = cascades.into_iter().map(GroupCascade::finish).collect();
    for outcome in &outcomes {
        report.add_filled(&outcome.filled);
        for row in outcome.unresolved_rows() {
            for source in row.outstanding().iter() {
                report.gaps.push(DataGap {
                    kind: GapKind::UnresolvedPlayer,
                    site: source,
                    group: outcome.group.clone(),
                    name: row.anchor.display.clone(),
                });
            }
        }
    }

    let paired: Vec<(&ClubRoster, &CascadeOutcome)> = partition.clubs.iter().zip(outcomes.iter()).collect();
    let tables = MatchedTables {
        clubs: assemble_clubs(&clubs.table, config.club_anchor),
        players: assemble_players(&partition.exact, &paired, config.player_anchor),
    };

    report.clubs_total = tables.clubs.len();
    report.clubs_complete = clubs.table.iter().filter(|m| m.is_complete()).count();
    if !partition.exact.is_empty() {
        *report.filled_by.entry(Heuristic::Exact).or_default() +=
            partition.exact.iter().map(|row| row.members.len().saturating_sub(1)).sum::<usize>();
    }
    for player in &tables.players {
        let complete = player.sources.len() + 1 == config.sources.len();
        match (player.resolution, complete) {
            (Resolution::Exact, _) => report.players_exact += 1,
            (Resolution::Cascade, true) => report.players_cascade_complete += 1,
            (Resolution::Cascade, false) => report.players_partial += 1,
        }
    }

    let unresolved = report
        .gaps
        .iter()
        .filter(|g| g.kind == GapKind::UnresolvedPlayer)
        .count();
    if unresolved > 0 {
        warn!(slots = unresolved, "player slots left unresolved");
    }
    info!(
        clubs = report.clubs_total,
        clubs_complete = report.clubs_complete,
        players = report.players_total(),
        exact = report.players_exact,
        cascade_complete = report.players_cascade_complete,
        partial = report.players_partial,
        gaps = report.gaps.len(),
        "matching finished"
    );
    Ok(PipelineOutput { tables, report })
}

fn run_sync_cascades(rosters: &[ClubRoster], config: &PipelineConfig, matcher: Matcher<'_>) -> Vec<GroupCascade> {
    use rayon::prelude::*;

    let pool = build_match_pool(config.parallelism);
    let anchor = config.player_anchor;
    let sources = config.sources.as_slice();
    with_match_pool(&pool, || {
        rosters
            .par_iter()
            .map(|roster| {
                let mut cascade = roster.cascade(anchor, sources);
                cascade.run_sync(&Heuristic::PLAYER_SYNC_PLAN, matcher);
                cascade
            })
            .collect()
    })
}

fn lookup_probes(cascades: &[GroupCascade]) -> Vec<LookupProbe> {
    let mut probes = Vec::new();
    for (group_index, cascade) in cascades.iter().enumerate() {
        for row in cascade.pending() {
            probes.push(LookupProbe {
                group_index,
                row_id: row.id,
                name: row.anchor.display.clone(),
                group: cascade.group().to_string(),
            });
        }
    }
    probes
}

fn build_match_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .ok()
}

fn with_match_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}
