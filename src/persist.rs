use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, params};

use crate::http_cache::app_cache_dir;
use crate::join::{Identity, MatchedTables};
use crate::record::SourceTag;
use crate::report::RunReport;

#[derive(Debug, Clone)]
pub struct PersistSummary {
    pub db_path: PathBuf,
    pub run_id: i64,
    pub teams_written: usize,
    pub players_written: usize,
    pub site_rows_written: usize,
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("xref.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_run_log(&conn)?;
    Ok(conn)
}

/// The run log survives across runs; the identity tables do not.
pub fn init_run_log(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS xref_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            clubs INTEGER NOT NULL,
            players INTEGER NOT NULL,
            gaps INTEGER NOT NULL,
            gaps_json TEXT NOT NULL
        );
        "#,
    )
    .context("create run log schema")?;
    Ok(())
}

pub fn save_tables(
    conn: &mut Connection,
    db_path: &Path,
    tables: &MatchedTables,
    report: &RunReport,
    sources: &[SourceTag],
    started_at: DateTime<Utc>,
) -> Result<PersistSummary> {
    let gaps_json = serde_json::to_string(&report.gaps).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "INSERT INTO xref_runs(started_at, finished_at, clubs, players, gaps, gaps_json)
         VALUES (?1, NULL, ?2, ?3, ?4, ?5)",
        params![
            started_at.to_rfc3339(),
            tables.clubs.len() as i64,
            tables.players.len() as i64,
            report.gaps.len() as i64,
            gaps_json
        ],
    )
    .context("insert xref run")?;
    let run_id = conn.last_insert_rowid();

    let tx = conn.transaction().context("begin xref transaction")?;
    recreate_tables(&tx, sources)?;
    let team_ids = write_teams(&tx, tables)?;
    let players_written = write_players(&tx, tables, &team_ids)?;
    let site_rows_written = write_site_rows(&tx, tables, sources)?;
    tx.commit().context("commit xref transaction")?;

    conn.execute(
        "UPDATE xref_runs SET finished_at = ?1 WHERE run_id = ?2",
        params![Utc::now().to_rfc3339(), run_id],
    )
    .context("update xref run")?;

    Ok(PersistSummary {
        db_path: db_path.to_path_buf(),
        run_id,
        teams_written: team_ids.len(),
        players_written,
        site_rows_written,
    })
}

fn recreate_tables(tx: &Transaction<'_>, sources: &[SourceTag]) -> Result<()> {
    let mut sql = String::from(
        r#"
        DROP TABLE IF EXISTS players;
        DROP TABLE IF EXISTS teams;
        "#,
    );
    for source in SourceTag::ALL {
        sql.push_str(&format!(
            "DROP TABLE IF EXISTS {site}_players;\nDROP TABLE IF EXISTS {site}_teams;\n",
            site = source.as_str()
        ));
    }
    sql.push_str(
        r#"
        CREATE TABLE teams (
            team_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            league TEXT NOT NULL
        );
        CREATE TABLE players (
            player_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            team_id INTEGER NOT NULL REFERENCES teams(team_id)
        );
        CREATE INDEX idx_players_team ON players(team_id);
        "#,
    );
    for source in sources {
        sql.push_str(&format!(
            r#"
        CREATE TABLE {site}_teams (
            team_id INTEGER PRIMARY KEY REFERENCES teams(team_id),
            site_name TEXT NOT NULL,
            site_team_id TEXT NOT NULL,
            site_url TEXT NOT NULL
        );
        CREATE TABLE {site}_players (
            player_id INTEGER PRIMARY KEY REFERENCES players(player_id),
            site_player_name TEXT NOT NULL,
            site_player_id TEXT NOT NULL,
            site_url TEXT NOT NULL
        );
        "#,
            site = source.as_str()
        ));
    }
    tx.execute_batch(&sql).context("recreate xref tables")?;
    Ok(())
}

fn write_teams(tx: &Transaction<'_>, tables: &MatchedTables) -> Result<HashMap<String, i64>> {
    let mut stmt = tx
        .prepare("INSERT INTO teams(team_id, name, league) VALUES (?1, ?2, ?3)")
        .context("prepare team insert")?;
    let mut ids = HashMap::new();
    for (idx, club) in tables.clubs.iter().enumerate() {
        let team_id = idx as i64 + 1;
        stmt.execute(params![team_id, club.canonical.name, club.league])
            .with_context(|| format!("insert team {}", club.canonical.name))?;
        ids.insert(club.canonical.name.clone(), team_id);
    }
    Ok(ids)
}

fn write_players(
    tx: &Transaction<'_>,
    tables: &MatchedTables,
    team_ids: &HashMap<String, i64>,
) -> Result<usize> {
    let mut stmt = tx
        .prepare("INSERT INTO players(player_id, name, team_id) VALUES (?1, ?2, ?3)")
        .context("prepare player insert")?;
    for (idx, player) in tables.players.iter().enumerate() {
        let Some(team_id) = team_ids.get(&player.club) else {
            anyhow::bail!("player {} references unknown club {}", player.canonical.name, player.club);
        };
        stmt.execute(params![idx as i64 + 1, player.canonical.name, team_id])
            .with_context(|| format!("insert player {}", player.canonical.name))?;
    }
    Ok(tables.players.len())
}

fn write_site_rows(tx: &Transaction<'_>, tables: &MatchedTables, sources: &[SourceTag]) -> Result<usize> {
    let mut written = 0usize;
    for source in sources {
        let site = source.as_str();
        let mut team_stmt = tx
            .prepare(&format!(
                "INSERT INTO {site}_teams(team_id, site_name, site_team_id, site_url) VALUES (?1, ?2, ?3, ?4)"
            ))
            .with_context(|| format!("prepare {site} team insert"))?;
        for (idx, club) in tables.clubs.iter().enumerate() {
            let Some(cells) = club.cells(*source) else {
                continue;
            };
            team_stmt
                .execute(params![idx as i64 + 1, cells.name, cells.source_id, cells.url])
                .with_context(|| format!("insert {site} team {}", cells.name))?;
            written += 1;
        }

        let mut player_stmt = tx
            .prepare(&format!(
                "INSERT INTO {site}_players(player_id, site_player_name, site_player_id, site_url) VALUES (?1, ?2, ?3, ?4)"
            ))
            .with_context(|| format!("prepare {site} player insert"))?;
        for (idx, player) in tables.players.iter().enumerate() {
            let Some(cells) = player.cells(*source) else {
                continue;
            };
            player_stmt
                .execute(params![idx as i64 + 1, cells.name, cells.source_id, cells.url])
                .with_context(|| format!("insert {site} player {}", cells.name))?;
            written += 1;
        }
    }
    Ok(written)
}
