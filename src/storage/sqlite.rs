//! `SQLite`-based record store.
//!
//! Durable storage for file metadata using `SQLite` as the authoritative
//! source of truth. Graph repair (promotion and re-pointing on delete) runs
//! inside a single transaction so a partial failure never leaves the
//! original/duplicate graph inconsistent.

use crate::models::{FileId, FileRecord, OwnerScope};
use crate::storage::traits::{RecordStore, RepairPlan};
use crate::{Error, Result, current_timestamp};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::instrument;

/// Helper to acquire the connection mutex with poison recovery.
///
/// If the mutex is poisoned by a panic in a previous critical section, we
/// recover the inner value and log a warning rather than cascade the failure.
fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("filedup_sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a `SQLite` connection for concurrent access.
///
/// - **WAL mode**: concurrent readers with a single writer
/// - **NORMAL synchronous**: balances durability with performance
/// - **`busy_timeout`**: waits up to 5 seconds for locks instead of failing
fn configure_connection(conn: &Connection) {
    // journal_mode returns a string result, so pragma_update's Err is expected
    // for in-memory databases; ignore it.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
}

/// Records latency and status metrics for a store operation.
fn record_operation_metrics(operation: &'static str, start: Instant, ok: bool) {
    let status = if ok { "success" } else { "error" };
    metrics::counter!(
        "filedup_record_store_operations_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "filedup_record_store_duration_ms",
        "operation" => operation
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Escapes `%`, `_`, and `\` for use in a LIKE pattern with `ESCAPE '\'`.
fn escape_like(fragment: &str) -> String {
    fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

const SELECT_COLUMNS: &str = "id, blob_locator, original_filename, content_type, size, \
     created_at, updated_at, owner_kind, owner_id, content_digest, \
     is_original, original_ref, reference_count, similarity_score, sequence_number";

/// Maps a result row (in `SELECT_COLUMNS` order) to a [`FileRecord`].
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let owner_kind: String = row.get(7)?;
    let owner_id: String = row.get(8)?;
    let owner = if owner_kind == "user" {
        OwnerScope::User(owner_id)
    } else {
        OwnerScope::Session(owner_id)
    };

    Ok(FileRecord {
        id: FileId::new(row.get::<_, String>(0)?),
        blob_locator: row.get(1)?,
        original_filename: row.get(2)?,
        content_type: row.get(3)?,
        size: row.get::<_, i64>(4)? as u64,
        created_at: row.get::<_, i64>(5)? as u64,
        updated_at: row.get::<_, i64>(6)? as u64,
        owner,
        content_digest: row.get(9)?,
        is_original: row.get(10)?,
        original_ref: row.get::<_, Option<String>>(11)?.map(FileId::new),
        reference_count: row.get::<_, i64>(12)? as u32,
        similarity_score: row.get::<_, Option<f64>>(13)?.map(|s| s as f32),
        sequence_number: row.get::<_, i64>(14)? as u32,
    })
}

/// `SQLite`-backed record store.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` because `rusqlite::Connection` is not `Sync`.
/// WAL mode and the `busy_timeout` pragma keep contention graceful. Write
/// paths use explicit `BEGIN IMMEDIATE` transactions so check-then-act
/// sequences inside the store are atomic.
pub struct SqliteRecordStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database file (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteRecordStore {
    /// Creates a record store backed by a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory record store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_sqlite_in_memory".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Initializes the schema and indexes.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn);

        conn.execute(
            "CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                blob_locator TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                owner_kind TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                content_digest TEXT NOT NULL,
                is_original INTEGER NOT NULL DEFAULT 1,
                original_ref TEXT,
                reference_count INTEGER NOT NULL DEFAULT 0,
                similarity_score REAL,
                sequence_number INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_files_table".to_string(),
            cause: e.to_string(),
        })?;

        Self::create_indexes(&conn);
        Ok(())
    }

    /// Creates indexes for the common query patterns.
    fn create_indexes(conn: &Connection) {
        // Digest lookup is the hot path of duplicate resolution
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_files_digest ON files(content_digest)",
            [],
        );

        // Scope + filename powers sequencing and prefix lookups
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_files_owner_filename
             ON files(owner_kind, owner_id, original_filename)",
            [],
        );

        // Scope + digest for exact-match resolution
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_files_owner_digest
             ON files(owner_kind, owner_id, content_digest)",
            [],
        );

        // Duplicate-group traversal for deletion repair
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_files_original_ref ON files(original_ref)",
            [],
        );

        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_files_created_at ON files(created_at)",
            [],
        );
    }

    /// Runs `f` inside a `BEGIN IMMEDIATE` transaction, rolling back on error.
    fn in_transaction<T>(
        conn: &Connection,
        operation: &str,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        conn.execute("BEGIN IMMEDIATE", [])
            .map_err(|e| Error::OperationFailed {
                operation: format!("{operation}_begin"),
                cause: e.to_string(),
            })?;

        let result = f(conn);

        if result.is_ok() {
            conn.execute("COMMIT", []).map_err(|e| Error::OperationFailed {
                operation: format!("{operation}_commit"),
                cause: e.to_string(),
            })?;
        } else {
            let _ = conn.execute("ROLLBACK", []);
        }

        result
    }

    /// Fetches `(is_original, original_ref)` for a record inside a transaction.
    fn link_state(conn: &Connection, id: &FileId) -> Result<Option<(bool, Option<String>)>> {
        conn.query_row(
            "SELECT is_original, original_ref FROM files WHERE id = ?1",
            params![id.as_str()],
            |row| Ok((row.get::<_, bool>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()
        .map_err(|e| Error::OperationFailed {
            operation: "link_state".to_string(),
            cause: e.to_string(),
        })
    }
}

impl RecordStore for SqliteRecordStore {
    #[instrument(skip(self, record), fields(operation = "insert", record.id = %record.id))]
    #[allow(clippy::cast_possible_wrap)]
    fn insert(&self, record: &FileRecord) -> Result<()> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);

            Self::in_transaction(&conn, "insert_record", |conn| {
                // Depth-1 graph enforcement happens here, at the write
                // boundary, rather than by convention.
                if let Some(target) = &record.original_ref {
                    match Self::link_state(conn, target)? {
                        None => {
                            return Err(Error::InvalidInput(format!(
                                "original_ref {target} does not exist"
                            )));
                        },
                        Some((false, _)) => {
                            return Err(Error::InvalidInput(format!(
                                "original_ref {target} is itself a duplicate (graph depth > 1)"
                            )));
                        },
                        Some((true, _)) => {},
                    }
                }

                conn.execute(
                    "INSERT INTO files (id, blob_locator, original_filename, content_type, size,
                        created_at, updated_at, owner_kind, owner_id, content_digest,
                        is_original, original_ref, reference_count, similarity_score, sequence_number)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    params![
                        record.id.as_str(),
                        record.blob_locator,
                        record.original_filename,
                        record.content_type,
                        record.size as i64,
                        record.created_at as i64,
                        record.updated_at as i64,
                        record.owner.kind(),
                        record.owner.id(),
                        record.content_digest,
                        record.is_original,
                        record.original_ref.as_ref().map(FileId::as_str),
                        i64::from(record.reference_count),
                        record.similarity_score.map(f64::from),
                        i64::from(record.sequence_number),
                    ],
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "insert_record".to_string(),
                    cause: e.to_string(),
                })?;

                // A new duplicate link bumps the original's informational
                // reference count in the same transaction.
                if let Some(target) = &record.original_ref {
                    conn.execute(
                        "UPDATE files SET reference_count = reference_count + 1 WHERE id = ?1",
                        params![target.as_str()],
                    )
                    .map_err(|e| Error::OperationFailed {
                        operation: "bump_reference_count".to_string(),
                        cause: e.to_string(),
                    })?;
                }

                Ok(())
            })
        })();

        record_operation_metrics("insert", start, result.is_ok());
        result
    }

    #[instrument(skip(self), fields(operation = "get", record.id = %id))]
    fn get(&self, id: &FileId) -> Result<Option<FileRecord>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM files WHERE id = ?1"),
                params![id.as_str()],
                record_from_row,
            )
            .optional()
            .map_err(|e| Error::OperationFailed {
                operation: "get_record".to_string(),
                cause: e.to_string(),
            })
        })();

        record_operation_metrics("get", start, result.is_ok());
        result
    }

    #[instrument(skip(self), fields(operation = "find_original_by_digest", owner = %owner))]
    fn find_original_by_digest(
        &self,
        owner: &OwnerScope,
        digest: &str,
    ) -> Result<Option<FileRecord>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            conn.query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM files
                     WHERE owner_kind = ?1 AND owner_id = ?2
                       AND content_digest = ?3 AND is_original = 1
                     ORDER BY created_at ASC, rowid ASC
                     LIMIT 1"
                ),
                params![owner.kind(), owner.id(), digest],
                record_from_row,
            )
            .optional()
            .map_err(|e| Error::OperationFailed {
                operation: "find_original_by_digest".to_string(),
                cause: e.to_string(),
            })
        })();

        record_operation_metrics("find_original_by_digest", start, result.is_ok());
        result
    }

    #[instrument(skip(self, mime_types), fields(operation = "find_originals_by_mime", owner = %owner))]
    fn find_originals_by_mime(
        &self,
        owner: &OwnerScope,
        mime_types: &[&str],
    ) -> Result<Vec<FileRecord>> {
        if mime_types.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let placeholders = (0..mime_types.len())
                .map(|i| format!("?{}", i + 3))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM files
                 WHERE owner_kind = ?1 AND owner_id = ?2 AND is_original = 1
                   AND content_type IN ({placeholders})
                 ORDER BY created_at ASC, rowid ASC"
            );

            let mut stmt = conn.prepare(&sql).map_err(|e| Error::OperationFailed {
                operation: "prepare_find_originals_by_mime".to_string(),
                cause: e.to_string(),
            })?;

            let bind: Vec<&str> = [owner.kind(), owner.id()]
                .into_iter()
                .chain(mime_types.iter().copied())
                .collect();
            let rows = stmt
                .query_map(params_from_iter(bind), record_from_row)
                .map_err(|e| Error::OperationFailed {
                    operation: "find_originals_by_mime".to_string(),
                    cause: e.to_string(),
                })?;

            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| Error::OperationFailed {
                    operation: "collect_originals_by_mime".to_string(),
                    cause: e.to_string(),
                })
        })();

        record_operation_metrics("find_originals_by_mime", start, result.is_ok());
        result
    }

    #[instrument(skip(self), fields(operation = "find_by_stem_prefix", owner = %owner, stem = stem))]
    fn find_by_stem_prefix(&self, owner: &OwnerScope, stem: &str) -> Result<Vec<FileRecord>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let pattern = format!("{}%", escape_like(stem));

            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM files
                     WHERE owner_kind = ?1 AND owner_id = ?2
                       AND original_filename LIKE ?3 ESCAPE '\\'
                     ORDER BY sequence_number DESC"
                ))
                .map_err(|e| Error::OperationFailed {
                    operation: "prepare_find_by_stem_prefix".to_string(),
                    cause: e.to_string(),
                })?;

            let rows = stmt
                .query_map(params![owner.kind(), owner.id(), pattern], record_from_row)
                .map_err(|e| Error::OperationFailed {
                    operation: "find_by_stem_prefix".to_string(),
                    cause: e.to_string(),
                })?;

            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| Error::OperationFailed {
                    operation: "collect_by_stem_prefix".to_string(),
                    cause: e.to_string(),
                })
        })();

        record_operation_metrics("find_by_stem_prefix", start, result.is_ok());
        result
    }

    #[instrument(skip(self), fields(operation = "duplicates_of", record.id = %id))]
    fn duplicates_of(&self, id: &FileId) -> Result<Vec<FileRecord>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM files
                     WHERE original_ref = ?1
                     ORDER BY created_at DESC, rowid DESC"
                ))
                .map_err(|e| Error::OperationFailed {
                    operation: "prepare_duplicates_of".to_string(),
                    cause: e.to_string(),
                })?;

            let rows = stmt
                .query_map(params![id.as_str()], record_from_row)
                .map_err(|e| Error::OperationFailed {
                    operation: "duplicates_of".to_string(),
                    cause: e.to_string(),
                })?;

            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| Error::OperationFailed {
                    operation: "collect_duplicates_of".to_string(),
                    cause: e.to_string(),
                })
        })();

        record_operation_metrics("duplicates_of", start, result.is_ok());
        result
    }

    #[instrument(skip(self), fields(operation = "used_bytes", owner = %owner))]
    #[allow(clippy::cast_sign_loss)]
    fn used_bytes(&self, owner: &OwnerScope) -> Result<u64> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            conn.query_row(
                "SELECT COALESCE(SUM(size), 0) FROM files
                 WHERE owner_kind = ?1 AND owner_id = ?2 AND is_original = 1",
                params![owner.kind(), owner.id()],
                |row| row.get::<_, i64>(0),
            )
            .map(|total| total as u64)
            .map_err(|e| Error::OperationFailed {
                operation: "used_bytes".to_string(),
                cause: e.to_string(),
            })
        })();

        record_operation_metrics("used_bytes", start, result.is_ok());
        result
    }

    #[instrument(skip(self, plan), fields(operation = "apply_delete", record.id = %id, has_plan = plan.is_some()))]
    #[allow(clippy::cast_possible_wrap)]
    fn apply_delete(&self, id: &FileId, plan: Option<&RepairPlan>) -> Result<bool> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);

            Self::in_transaction(&conn, "apply_delete", |conn| {
                let Some((_, parent_ref)) = Self::link_state(conn, id)? else {
                    return Ok(false);
                };
                let now = current_timestamp() as i64;

                if let Some(plan) = plan {
                    // Promote the chosen duplicate to original.
                    let promoted = conn
                        .execute(
                            "UPDATE files
                             SET is_original = 1, original_ref = NULL, similarity_score = NULL,
                                 reference_count = ?2, updated_at = ?3
                             WHERE id = ?1",
                            params![plan.promote.as_str(), plan.repoint.len() as i64, now],
                        )
                        .map_err(|e| Error::GraphRepair {
                            cause: format!("promotion update failed: {e}"),
                        })?;
                    if promoted != 1 {
                        return Err(Error::GraphRepair {
                            cause: format!("promotion target {} not found", plan.promote),
                        });
                    }

                    // Re-point every remaining duplicate at the new original.
                    for dup in &plan.repoint {
                        let repointed = conn
                            .execute(
                                "UPDATE files SET original_ref = ?2, updated_at = ?3 WHERE id = ?1",
                                params![dup.as_str(), plan.promote.as_str(), now],
                            )
                            .map_err(|e| Error::GraphRepair {
                                cause: format!("re-point update failed: {e}"),
                            })?;
                        if repointed != 1 {
                            return Err(Error::GraphRepair {
                                cause: format!("duplicate {dup} not found during re-point"),
                            });
                        }
                    }
                } else if let Some(parent) = parent_ref {
                    // Deleting a duplicate link releases its slot on the
                    // original's informational reference count.
                    conn.execute(
                        "UPDATE files
                         SET reference_count = CASE WHEN reference_count > 0
                                                    THEN reference_count - 1 ELSE 0 END
                         WHERE id = ?1",
                        params![parent],
                    )
                    .map_err(|e| Error::OperationFailed {
                        operation: "release_reference_count".to_string(),
                        cause: e.to_string(),
                    })?;
                }

                let deleted = conn
                    .execute("DELETE FROM files WHERE id = ?1", params![id.as_str()])
                    .map_err(|e| Error::OperationFailed {
                        operation: "delete_record".to_string(),
                        cause: e.to_string(),
                    })?;

                Ok(deleted > 0)
            })
        })();

        record_operation_metrics("apply_delete", start, result.is_ok());
        result
    }

    fn count(&self) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        conn.query_row("SELECT COUNT(*) FROM files", [], |row| {
            row.get::<_, i64>(0).map(|n| n as usize)
        })
        .map_err(|e| Error::OperationFailed {
            operation: "count_records".to_string(),
            cause: e.to_string(),
        })
    }
}
