use super::{clamp_page, open, total_pages, Page};
use crate::error::{ReplayError, Result};
use crate::games::GameId;
use crate::predicate::{Op, Predicate};
use crate::scan::{Hit, ScanResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{Row as _, SqlitePool};
use std::path::Path;

const DEFAULT_RUNS_PER_PAGE: u32 = 50;
const MAX_RUNS_PER_PAGE: u32 = 500;
const DEFAULT_HITS_PER_PAGE: u32 = 100;
const MAX_HITS_PER_PAGE: u32 = 1000;
const HIT_BATCH_SIZE: usize = 1000;

pub struct NewRun {
    pub game: GameId,
    pub engine_version: &'static str,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce_start: u64,
    pub nonce_end: u64,
    pub params_json: Value,
    pub predicate: Predicate,
    pub hit_limit: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub game: GameId,
    pub engine_version: String,
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce_start: i64,
    pub nonce_end: i64,
    pub params_json: Value,
    pub predicate_op: String,
    pub predicate_val: f64,
    pub predicate_val2: Option<f64>,
    pub tolerance: Option<f64>,
    pub hit_limit: i64,
    pub timed_out: bool,
    pub hit_count: i64,
    pub total_evaluated: i64,
    pub summary_min: Option<f64>,
    pub summary_max: Option<f64>,
    pub summary_sum: Option<f64>,
    pub summary_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HitRow {
    pub nonce: i64,
    pub metric: f64,
    pub delta_nonce: Option<i64>,
}

pub type HitsPage = Page<HitRow>;

#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub game: Option<GameId>,
}

pub struct RunStore {
    pool: SqlitePool,
}

impl RunStore {
    pub async fn connect(path: &Path) -> Result<Self> {
        let pool = open(path, 1).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                game TEXT NOT NULL,
                engine_version TEXT NOT NULL,
                server_seed_hash TEXT NOT NULL,
                client_seed TEXT NOT NULL,
                nonce_start INTEGER NOT NULL,
                nonce_end INTEGER NOT NULL,
                params_json TEXT NOT NULL,
                predicate_op TEXT NOT NULL,
                predicate_val REAL NOT NULL,
                predicate_val2 REAL,
                tolerance REAL,
                hit_limit INTEGER NOT NULL,
                timed_out INTEGER NOT NULL,
                hit_count INTEGER NOT NULL,
                total_evaluated INTEGER NOT NULL,
                summary_min REAL,
                summary_max REAL,
                summary_sum REAL,
                summary_count INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS hits (
                run_id INTEGER NOT NULL,
                nonce INTEGER NOT NULL,
                metric REAL NOT NULL,
                PRIMARY KEY (run_id, nonce)
            )",
        )
        .execute(pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS hits_run_nonce ON hits (run_id, nonce)")
            .execute(pool)
            .await
            .map_err(db_err)?;
        sqlx::query("CREATE INDEX IF NOT EXISTS runs_game_created ON runs (game, created_at)")
            .execute(pool)
            .await
            .map_err(db_err)?;
        sqlx::query("CREATE INDEX IF NOT EXISTS runs_seed ON runs (server_seed_hash, client_seed)")
            .execute(pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    pub async fn save_run(&self, run: &NewRun, result: &ScanResult) -> Result<RunRecord> {
        let created_at = Utc::now();
        let row = sqlx::query(
            "INSERT INTO runs (
                created_at, game, engine_version, server_seed_hash, client_seed,
                nonce_start, nonce_end, params_json, predicate_op, predicate_val,
                predicate_val2, tolerance, hit_limit, timed_out, hit_count,
                total_evaluated, summary_min, summary_max, summary_sum, summary_count
            ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?) RETURNING id",
        )
        .bind(created_at.to_rfc3339())
        .bind(run.game.label())
        .bind(run.engine_version)
        .bind(&run.server_seed_hash)
        .bind(&run.client_seed)
        .bind(run.nonce_start as i64)
        .bind(run.nonce_end as i64)
        .bind(run.params_json.to_string())
        .bind(op_label(run.predicate.op))
        .bind(run.predicate.val)
        .bind(run.predicate.val2)
        .bind(run.predicate.tolerance)
        .bind(run.hit_limit as i64)
        .bind(result.timed_out)
        .bind(result.summary.hit_count as i64)
        .bind(result.summary.evaluated as i64)
        .bind(result.summary.min)
        .bind(result.summary.max)
        .bind(result.summary.sum)
        .bind(result.summary.count as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        let id: i64 = row.get("id");
        self.get_run(id).await
    }

    /// Batch-inserts hits in a single transaction, committing every
    /// `HIT_BATCH_SIZE` rows to bound worst-case rollback size.
    pub async fn save_hits(&self, run_id: i64, hits: &[Hit]) -> Result<()> {
        for chunk in hits.chunks(HIT_BATCH_SIZE) {
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            for hit in chunk {
                sqlx::query("INSERT INTO hits (run_id, nonce, metric) VALUES (?,?,?)")
                    .bind(run_id)
                    .bind(hit.nonce as i64)
                    .bind(hit.metric)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
            }
            tx.commit().await.map_err(db_err)?;
        }
        Ok(())
    }

    pub async fn get_run(&self, id: i64) -> Result<RunRecord> {
        let row = sqlx::query("SELECT * FROM runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| ReplayError::not_found(format!("run {id} not found")))?;
        run_from_row(&row)
    }

    pub async fn list_runs(
        &self,
        filter: &RunFilter,
        page: u32,
        per_page: u32,
    ) -> Result<Page<RunRecord>> {
        let page = clamp_page(page);
        let per_page = if per_page == 0 {
            DEFAULT_RUNS_PER_PAGE
        } else {
            per_page.min(MAX_RUNS_PER_PAGE)
        };
        let offset = (page as i64 - 1) * per_page as i64;

        let (rows, total_count) = match &filter.game {
            Some(game) => {
                let total: i64 = sqlx::query("SELECT COUNT(*) AS c FROM runs WHERE game = ?")
                    .bind(game.label())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(db_err)?
                    .get("c");
                let rows = sqlx::query(
                    "SELECT * FROM runs WHERE game = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(game.label())
                .bind(per_page as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
                (rows, total as u64)
            }
            None => {
                let total: i64 = sqlx::query("SELECT COUNT(*) AS c FROM runs")
                    .fetch_one(&self.pool)
                    .await
                    .map_err(db_err)?
                    .get("c");
                let rows = sqlx::query("SELECT * FROM runs ORDER BY created_at DESC LIMIT ? OFFSET ?")
                    .bind(per_page as i64)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(db_err)?;
                (rows, total as u64)
            }
        };

        let rows = rows.iter().map(run_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page {
            rows,
            total_count,
            page,
            per_page,
            total_pages: total_pages(total_count, per_page),
        })
    }

    pub async fn list_runs_by_seed(
        &self,
        server_seed_hash: &str,
        client_seed: &str,
    ) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM runs WHERE server_seed_hash = ? AND client_seed = ? ORDER BY created_at DESC",
        )
        .bind(server_seed_hash)
        .bind(client_seed)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(run_from_row).collect()
    }

    /// Returns hits ordered by nonce ascending, with each row's `deltaNonce`
    /// derived against the previous hit in the *entire run*, not just the
    /// page: the first hit of page p > 1 looks up the greatest nonce below
    /// the page's first nonce.
    pub async fn get_run_hits(&self, run_id: i64, page: u32, per_page: u32) -> Result<HitsPage> {
        let page = clamp_page(page);
        let per_page = if per_page == 0 {
            DEFAULT_HITS_PER_PAGE
        } else {
            per_page.min(MAX_HITS_PER_PAGE)
        };
        let offset = (page as i64 - 1) * per_page as i64;

        let total_count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM hits WHERE run_id = ?")
            .bind(run_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .get("c");

        let rows = sqlx::query(
            "SELECT nonce, metric FROM hits WHERE run_id = ? ORDER BY nonce ASC LIMIT ? OFFSET ?",
        )
        .bind(run_id)
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut previous_nonce: Option<i64> = if page == 1 {
            None
        } else if let Some(first) = rows.first() {
            let first_nonce: i64 = first.get("nonce");
            sqlx::query(
                "SELECT MAX(nonce) AS m FROM hits WHERE run_id = ? AND nonce < ?",
            )
            .bind(run_id)
            .bind(first_nonce)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .get::<Option<i64>, _>("m")
        } else {
            None
        };

        let mut hit_rows = Vec::with_capacity(rows.len());
        for row in &rows {
            let nonce: i64 = row.get("nonce");
            let metric: f64 = row.get("metric");
            let delta_nonce = previous_nonce.map(|p| nonce - p);
            hit_rows.push(HitRow {
                nonce,
                metric,
                delta_nonce,
            });
            previous_nonce = Some(nonce);
        }

        Ok(Page {
            rows: hit_rows,
            total_count: total_count as u64,
            page,
            per_page,
            total_pages: total_pages(total_count as u64, per_page),
        })
    }
}

fn op_label(op: Op) -> &'static str {
    match op {
        Op::Eq => "EQ",
        Op::Ne => "NE",
        Op::Gt => "GT",
        Op::Ge => "GE",
        Op::Lt => "LT",
        Op::Le => "LE",
        Op::Between => "BETWEEN",
        Op::Outside => "OUTSIDE",
    }
}

fn run_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<RunRecord> {
    use std::str::FromStr;
    let game: String = row.get("game");
    let created_at: String = row.get("created_at");
    let params_json: String = row.get("params_json");
    Ok(RunRecord {
        id: row.get("id"),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| ReplayError::system("CORRUPT_ROW", "bad created_at timestamp").with_cause(e))?
            .with_timezone(&Utc),
        game: GameId::from_str(&game)?,
        engine_version: row.get("engine_version"),
        server_seed_hash: row.get("server_seed_hash"),
        client_seed: row.get("client_seed"),
        nonce_start: row.get("nonce_start"),
        nonce_end: row.get("nonce_end"),
        params_json: serde_json::from_str(&params_json).unwrap_or(Value::Null),
        predicate_op: row.get("predicate_op"),
        predicate_val: row.get("predicate_val"),
        predicate_val2: row.get("predicate_val2"),
        tolerance: row.get("tolerance"),
        hit_limit: row.get("hit_limit"),
        timed_out: row.get::<i64, _>("timed_out") != 0,
        hit_count: row.get("hit_count"),
        total_evaluated: row.get("total_evaluated"),
        summary_min: row.get("summary_min"),
        summary_max: row.get("summary_max"),
        summary_sum: row.get("summary_sum"),
        summary_count: row.get("summary_count"),
    })
}

fn db_err(e: sqlx::Error) -> ReplayError {
    ReplayError::system("DB_ERROR", "storage operation failed").with_cause(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{Hit, Summary};
    use std::path::PathBuf;

    fn temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("stake-replay-run-store-test-{}.db", uuid::Uuid::new_v4()))
    }

    fn new_run() -> NewRun {
        NewRun {
            game: GameId::Dice,
            engine_version: "0.1.0",
            server_seed_hash: "deadbeef".into(),
            client_seed: "client-abc".into(),
            nonce_start: 1,
            nonce_end: 1000,
            params_json: Value::Null,
            predicate: Predicate {
                op: Op::Ge,
                val: 50.0,
                val2: None,
                tolerance: None,
            },
            hit_limit: 0,
        }
    }

    fn result_for(hits: Vec<Hit>) -> ScanResult {
        let min = hits.iter().map(|h| h.metric).fold(None, |acc: Option<f64>, m| {
            Some(acc.map_or(m, |a| a.min(m)))
        });
        let max = hits.iter().map(|h| h.metric).fold(None, |acc: Option<f64>, m| {
            Some(acc.map_or(m, |a| a.max(m)))
        });
        let sum = hits.iter().map(|h| h.metric).sum();
        let count = hits.len() as u64;
        ScanResult {
            summary: Summary {
                evaluated: 1000,
                hit_count: count,
                min,
                max,
                sum,
                count,
            },
            hits,
            timed_out: false,
            cancelled: false,
        }
    }

    #[tokio::test]
    async fn save_run_then_get_run_round_trips() {
        let store = RunStore::connect(&temp_db_path()).await.unwrap();
        let run = new_run();
        let result = result_for(vec![Hit { nonce: 5, metric: 51.0 }]);
        let saved = store.save_run(&run, &result).await.unwrap();

        let fetched = store.get_run(saved.id).await.unwrap();
        assert_eq!(fetched.id, saved.id);
        assert_eq!(fetched.game, GameId::Dice);
        assert_eq!(fetched.server_seed_hash, "deadbeef");
        assert_eq!(fetched.client_seed, "client-abc");
        assert_eq!(fetched.hit_count, 1);
        assert_eq!(fetched.summary_sum, Some(51.0));
    }

    #[tokio::test]
    async fn get_run_missing_is_not_found() {
        let store = RunStore::connect(&temp_db_path()).await.unwrap();
        let err = store.get_run(999).await.unwrap_err();
        assert_eq!(err.kind, crate::error::Kind::Resource);
    }

    #[tokio::test]
    async fn delta_nonce_is_null_on_first_hit_of_page_one_and_derived_across_page_boundaries() {
        let store = RunStore::connect(&temp_db_path()).await.unwrap();
        let run = new_run();
        let nonces = [100u64, 250, 500, 750, 900];
        let hits: Vec<Hit> = nonces.iter().map(|&n| Hit { nonce: n, metric: 60.0 }).collect();
        let result = result_for(hits.clone());
        let saved = store.save_run(&run, &result).await.unwrap();
        store.save_hits(saved.id, &hits).await.unwrap();

        let page1 = store.get_run_hits(saved.id, 1, 3).await.unwrap();
        let deltas1: Vec<Option<i64>> = page1.rows.iter().map(|r| r.delta_nonce).collect();
        assert_eq!(deltas1, vec![None, Some(150), Some(250)]);

        let page2 = store.get_run_hits(saved.id, 2, 3).await.unwrap();
        let deltas2: Vec<Option<i64>> = page2.rows.iter().map(|r| r.delta_nonce).collect();
        assert_eq!(deltas2, vec![Some(250), Some(150)]);
    }

    #[tokio::test]
    async fn list_runs_filters_by_game_and_paginates() {
        let store = RunStore::connect(&temp_db_path()).await.unwrap();
        let dice_run = new_run();
        let mut limbo_run = new_run();
        limbo_run.game = GameId::Limbo;

        let result = result_for(vec![]);
        store.save_run(&dice_run, &result).await.unwrap();
        store.save_run(&limbo_run, &result).await.unwrap();

        let filtered = store
            .list_runs(
                &RunFilter {
                    game: Some(GameId::Limbo),
                },
                1,
                50,
            )
            .await
            .unwrap();
        assert_eq!(filtered.total_count, 1);
        assert_eq!(filtered.rows[0].game, GameId::Limbo);
    }
}
