use super::{open, Page};
use crate::error::{ReplayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row as _, SqlitePool};
use std::path::Path;

const MAX_STREAM_LIMIT: u32 = 500;
const MAX_BET_LIMIT: u32 = 10_000;

#[derive(Debug, Clone, Serialize)]
pub struct LiveStream {
    pub id: String,
    pub server_seed_hashed: String,
    pub client_seed: String,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub hit_count: i64,
    pub highest_multiplier: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveBet {
    pub id: i64,
    pub stream_id: String,
    pub antebot_bet_id: String,
    pub date_time: DateTime<Utc>,
    pub nonce: i64,
    pub amount: f64,
    pub payout: f64,
    pub difficulty: String,
    pub round_target: f64,
    pub round_result: f64,
}

pub struct LiveStore {
    pool: SqlitePool,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Order {
    Asc,
    Desc,
}

impl LiveStore {
    pub async fn connect(path: &Path) -> Result<Self> {
        let pool = open(path, 8).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS streams (
                id TEXT PRIMARY KEY,
                server_seed_hashed TEXT NOT NULL,
                client_seed TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_seen_at TEXT NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 0,
                highest_multiplier REAL NOT NULL DEFAULT 0,
                notes TEXT,
                UNIQUE (server_seed_hashed, client_seed)
            )",
        )
        .execute(pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS bets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stream_id TEXT NOT NULL,
                antebot_bet_id TEXT NOT NULL,
                date_time TEXT NOT NULL,
                nonce INTEGER NOT NULL,
                amount REAL NOT NULL,
                payout REAL NOT NULL,
                difficulty TEXT NOT NULL,
                round_target REAL NOT NULL,
                round_result REAL NOT NULL,
                UNIQUE (stream_id, antebot_bet_id)
            )",
        )
        .execute(pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS bets_stream_nonce ON bets (stream_id, nonce)")
            .execute(pool)
            .await
            .map_err(db_err)?;
        sqlx::query("CREATE INDEX IF NOT EXISTS bets_stream_id_order ON bets (stream_id, id)")
            .execute(pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    /// Idempotent: returns the existing stream's id if the
    /// `(serverSeedHashed, clientSeed)` pair was already seen.
    pub async fn find_or_create_stream(
        &self,
        server_seed_hashed: &str,
        client_seed: &str,
    ) -> Result<String> {
        if let Some(row) = sqlx::query(
            "SELECT id FROM streams WHERE server_seed_hashed = ? AND client_seed = ?",
        )
        .bind(server_seed_hashed)
        .bind(client_seed)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        {
            return Ok(row.get("id"));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let inserted = sqlx::query(
            "INSERT INTO streams (id, server_seed_hashed, client_seed, created_at, last_seen_at)
             VALUES (?,?,?,?,?)
             ON CONFLICT (server_seed_hashed, client_seed) DO NOTHING",
        )
        .bind(&id)
        .bind(server_seed_hashed)
        .bind(client_seed)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if inserted.rows_affected() == 0 {
            // Lost a race with a concurrent insert; the winner's row is authoritative.
            let row = sqlx::query(
                "SELECT id FROM streams WHERE server_seed_hashed = ? AND client_seed = ?",
            )
            .bind(server_seed_hashed)
            .bind(client_seed)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            return Ok(row.get("id"));
        }

        Ok(id)
    }

    /// Enforces `(streamId, antebotBetId)` uniqueness via the table's unique
    /// index rather than an application-level check-then-insert.
    pub async fn ingest_bet(&self, stream_id: &str, bet: &LiveBet) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO bets (
                stream_id, antebot_bet_id, date_time, nonce, amount, payout,
                difficulty, round_target, round_result
            ) VALUES (?,?,?,?,?,?,?,?,?)
             ON CONFLICT (stream_id, antebot_bet_id) DO NOTHING",
        )
        .bind(stream_id)
        .bind(&bet.antebot_bet_id)
        .bind(bet.date_time.to_rfc3339())
        .bind(bet.nonce)
        .bind(bet.amount)
        .bind(bet.payout)
        .bind(&bet.difficulty)
        .bind(bet.round_target)
        .bind(bet.round_result)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let accepted = result.rows_affected() > 0;
        if accepted {
            sqlx::query(
                "UPDATE streams SET
                    last_seen_at = ?,
                    hit_count = hit_count + 1,
                    highest_multiplier = MAX(highest_multiplier, ?)
                 WHERE id = ?",
            )
            .bind(Utc::now().to_rfc3339())
            .bind(bet.round_result)
            .bind(stream_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }
        Ok(accepted)
    }

    pub async fn list_streams(&self, limit: u32, offset: u32) -> Result<(Vec<LiveStream>, u64)> {
        let limit = limit.clamp(1, MAX_STREAM_LIMIT);
        let total: i64 = sqlx::query("SELECT COUNT(*) AS c FROM streams")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .get("c");
        let rows = sqlx::query(
            "SELECT * FROM streams ORDER BY last_seen_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        let streams = rows.iter().map(stream_from_row).collect::<Result<Vec<_>>>()?;
        Ok((streams, total as u64))
    }

    pub async fn get_stream(&self, stream_id: &str) -> Result<LiveStream> {
        let row = sqlx::query("SELECT * FROM streams WHERE id = ?")
            .bind(stream_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| ReplayError::not_found(format!("stream {stream_id} not found")))?;
        stream_from_row(&row)
    }

    pub async fn list_bets(
        &self,
        stream_id: &str,
        min_multiplier: Option<f64>,
        order: Order,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<LiveBet>, u64)> {
        let limit = limit.clamp(1, MAX_BET_LIMIT);
        let order_sql = match order {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        };
        let min_multiplier = min_multiplier.unwrap_or(f64::MIN);

        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS c FROM bets WHERE stream_id = ? AND round_result >= ?",
        )
        .bind(stream_id)
        .bind(min_multiplier)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?
        .get("c");

        let sql = format!(
            "SELECT * FROM bets WHERE stream_id = ? AND round_result >= ? ORDER BY nonce {order_sql} LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(stream_id)
            .bind(min_multiplier)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        let bets = rows.iter().map(bet_from_row).collect::<Result<Vec<_>>>()?;
        Ok((bets, total as u64))
    }

    /// Returns bets whose monotone id is strictly greater than `since_id`,
    /// ordered ascending; the caller's new cursor is the last id returned.
    pub async fn tail_bets(&self, stream_id: &str, since_id: i64, limit: u32) -> Result<Vec<LiveBet>> {
        let limit = limit.clamp(1, MAX_BET_LIMIT);
        let rows = sqlx::query(
            "SELECT * FROM bets WHERE stream_id = ? AND id > ? ORDER BY id ASC LIMIT ?",
        )
        .bind(stream_id)
        .bind(since_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(bet_from_row).collect()
    }

    /// Streams every bet in nonce order with the fixed export column set.
    pub async fn export_csv(&self, stream_id: &str, writer: &mut impl std::io::Write) -> Result<()> {
        writeln!(
            writer,
            "id,nonce,date_time,amount,payout,difficulty,round_target,round_result"
        )
        .map_err(io_err)?;
        let rows = sqlx::query("SELECT * FROM bets WHERE stream_id = ? ORDER BY nonce ASC")
            .bind(stream_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        for row in &rows {
            let bet = bet_from_row(row)?;
            writeln!(
                writer,
                "{},{},{},{},{},{},{},{}",
                bet.id,
                bet.nonce,
                bet.date_time.to_rfc3339(),
                bet.amount,
                bet.payout,
                bet.difficulty,
                bet.round_target,
                bet.round_result
            )
            .map_err(io_err)?;
        }
        Ok(())
    }

    pub async fn delete_stream(&self, stream_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM bets WHERE stream_id = ?")
            .bind(stream_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        let result = sqlx::query("DELETE FROM streams WHERE id = ?")
            .bind(stream_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(ReplayError::not_found(format!("stream {stream_id} not found")));
        }
        Ok(())
    }

    pub async fn update_notes(&self, stream_id: &str, notes: &str) -> Result<()> {
        let result = sqlx::query("UPDATE streams SET notes = ? WHERE id = ?")
            .bind(notes)
            .bind(stream_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(ReplayError::not_found(format!("stream {stream_id} not found")));
        }
        Ok(())
    }
}

fn stream_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LiveStream> {
    Ok(LiveStream {
        id: row.get("id"),
        server_seed_hashed: row.get("server_seed_hashed"),
        client_seed: row.get("client_seed"),
        created_at: parse_ts(row.get("created_at"))?,
        last_seen_at: parse_ts(row.get("last_seen_at"))?,
        hit_count: row.get("hit_count"),
        highest_multiplier: row.get("highest_multiplier"),
        notes: row.get("notes"),
    })
}

fn bet_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LiveBet> {
    Ok(LiveBet {
        id: row.get("id"),
        stream_id: row.get("stream_id"),
        antebot_bet_id: row.get("antebot_bet_id"),
        date_time: parse_ts(row.get("date_time"))?,
        nonce: row.get("nonce"),
        amount: row.get("amount"),
        payout: row.get("payout"),
        difficulty: row.get("difficulty"),
        round_target: row.get("round_target"),
        round_result: row.get("round_result"),
    })
}

fn parse_ts(raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ReplayError::system("CORRUPT_ROW", "bad timestamp").with_cause(e))
}

fn db_err(e: sqlx::Error) -> ReplayError {
    ReplayError::system("DB_ERROR", "storage operation failed").with_cause(e)
}

fn io_err(e: std::io::Error) -> ReplayError {
    ReplayError::system("IO_ERROR", "csv export failed").with_cause(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("stake-replay-live-store-test-{}.db", uuid::Uuid::new_v4()))
    }

    fn bet(antebot_bet_id: &str, nonce: i64) -> LiveBet {
        LiveBet {
            id: 0,
            stream_id: String::new(),
            antebot_bet_id: antebot_bet_id.into(),
            date_time: Utc::now(),
            nonce,
            amount: 1.0,
            payout: 2.0,
            difficulty: "easy".into(),
            round_target: 2.0,
            round_result: 1.5,
        }
    }

    #[tokio::test]
    async fn find_or_create_stream_is_idempotent_for_the_same_seed_pair() {
        let store = LiveStore::connect(&temp_db_path()).await.unwrap();
        let first = store.find_or_create_stream("hash1", "client1").await.unwrap();
        let second = store.find_or_create_stream("hash1", "client1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn duplicate_antebot_bet_id_is_rejected_on_second_insert() {
        let store = LiveStore::connect(&temp_db_path()).await.unwrap();
        let stream_id = store.find_or_create_stream("hash2", "client2").await.unwrap();

        let first = store.ingest_bet(&stream_id, &bet("bet-1", 10)).await.unwrap();
        let second = store.ingest_bet(&stream_id, &bet("bet-1", 10)).await.unwrap();
        assert!(first);
        assert!(!second);

        let (bets, total) = store
            .list_bets(&stream_id, None, Order::Asc, 100, 0)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(bets.len(), 1);
    }

    #[tokio::test]
    async fn tail_bets_returns_only_ids_strictly_greater_than_cursor_in_ascending_order() {
        let store = LiveStore::connect(&temp_db_path()).await.unwrap();
        let stream_id = store.find_or_create_stream("hash3", "client3").await.unwrap();
        store.ingest_bet(&stream_id, &bet("bet-1", 1)).await.unwrap();
        store.ingest_bet(&stream_id, &bet("bet-2", 2)).await.unwrap();
        store.ingest_bet(&stream_id, &bet("bet-3", 3)).await.unwrap();

        let all = store.tail_bets(&stream_id, 0, 100).await.unwrap();
        assert_eq!(all.len(), 3);

        let since = all[0].id;
        let rest = store.tail_bets(&stream_id, since, 100).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|b| b.id > since));
        assert!(rest.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn delete_stream_cascades_to_its_bets() {
        let store = LiveStore::connect(&temp_db_path()).await.unwrap();
        let stream_id = store.find_or_create_stream("hash4", "client4").await.unwrap();
        store.ingest_bet(&stream_id, &bet("bet-1", 1)).await.unwrap();

        store.delete_stream(&stream_id).await.unwrap();
        assert!(store.get_stream(&stream_id).await.is_err());
    }
}
