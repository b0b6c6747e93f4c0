
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A single accepted (video, transcript) pair. Created exactly once per
/// video id, never updated or deleted by this system.
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub published_at: Option<DateTime<Utc>>,
    pub transcript_text: String,
    pub language_code: String,
    pub has_caption: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The marker was written; this caller owns the video.
    Claimed,
    /// A marker or an entry already exists; the video must never be
    /// re-attempted.
    AlreadyProcessed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The exact transcript text is already stored (content dedup enabled).
    DuplicateTranscriptText,
    /// Another writer inserted this video id despite our claim.
    IdConflict,
}

#[derive(Debug, Clone)]
pub struct CorpusStats {
    pub entries: usize,
    pub captioned: usize,
    pub markers: usize,
}

/// SQLite-backed corpus store. Cloning shares the underlying connection;
/// separate processes open their own store over the same file and are
/// serialized by SQLite's write lock.
#[derive(Clone)]
pub struct CorpusStore {
    conn: Arc<Mutex<Connection>>,
    dedup_transcript_text: bool,
}

impl CorpusStore {
    pub fn open(db_path: &Path, dedup_transcript_text: bool) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open corpus store at {}", db_path.display()))?;

        // Bounded busy wait keeps concurrent claimers from blocking forever
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=5000;
        ",
        )?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            dedup_transcript_text,
        };
        store.init_schema()?;

        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS corpus_entries (
                video_id        TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                channel         TEXT,
                published_at    TEXT,
                transcript_text TEXT NOT NULL,
                language        TEXT,
                has_caption     INTEGER NOT NULL DEFAULT 0,
                ingested_at     TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS processed_markers (
                video_id     TEXT PRIMARY KEY,
                processed_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    /// Atomically claim a video id for processing.
    ///
    /// The two-table duplicate check and the marker insert share one
    /// immediate transaction, so two callers racing on the same id cannot
    /// both observe "absent".
    pub fn try_claim(&self, video_id: &str) -> Result<ClaimOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let seen: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM corpus_entries WHERE video_id = ?1)
                 OR EXISTS(SELECT 1 FROM processed_markers WHERE video_id = ?1)",
            params![video_id],
            |row| row.get(0),
        )?;

        if seen {
            // Dropping the transaction rolls back: no side effects
            return Ok(ClaimOutcome::AlreadyProcessed);
        }

        tx.execute(
            "INSERT INTO processed_markers (video_id) VALUES (?1)",
            params![video_id],
        )?;
        tx.commit()?;

        Ok(ClaimOutcome::Claimed)
    }

    /// Insert a corpus entry. A primary-key violation on `video_id` means
    /// another writer won the race despite our claim; it is reported as an
    /// outcome, not an error.
    pub fn commit_entry(&self, entry: &CorpusEntry) -> Result<CommitOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if self.dedup_transcript_text {
            let duplicate: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM corpus_entries WHERE transcript_text = ?1)",
                params![entry.transcript_text],
                |row| row.get(0),
            )?;
            if duplicate {
                return Ok(CommitOutcome::DuplicateTranscriptText);
            }
        }

        let inserted = tx.execute(
            "INSERT INTO corpus_entries
                 (video_id, title, channel, published_at, transcript_text, language, has_caption)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.video_id,
                entry.title,
                entry.channel,
                entry.published_at.map(|t| t.to_rfc3339()),
                entry.transcript_text,
                entry.language_code,
                entry.has_caption,
            ],
        );

        match inserted {
            Ok(_) => {
                tx.commit()?;
                Ok(CommitOutcome::Committed)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Ok(CommitOutcome::IdConflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// True if the id has an entry or a marker. Read-only; the pipeline
    /// goes through `try_claim`.
    pub fn is_processed(&self, video_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let seen: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM corpus_entries WHERE video_id = ?1)
                 OR EXISTS(SELECT 1 FROM processed_markers WHERE video_id = ?1)",
            params![video_id],
            |row| row.get(0),
        )?;
        Ok(seen)
    }

    pub fn stats(&self) -> Result<CorpusStats> {
        let conn = self.conn.lock().unwrap();

        let entries: i64 = conn.query_row("SELECT COUNT(*) FROM corpus_entries", [], |row| {
            row.get(0)
        })?;
        let captioned: i64 = conn.query_row(
            "SELECT COUNT(*) FROM corpus_entries WHERE has_caption = 1",
            [],
            |row| row.get(0),
        )?;
        let markers: i64 = conn.query_row("SELECT COUNT(*) FROM processed_markers", [], |row| {
            row.get(0)
        })?;

        Ok(CorpusStats {
            entries: entries as usize,
            captioned: captioned as usize,
            markers: markers as usize,
        })
    }
}
