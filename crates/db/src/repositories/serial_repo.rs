//! Repository for the `serial_scopes` counter table.
//!
//! Serial sequence numbers are allocated with a single atomic
//! INSERT … ON CONFLICT … DO UPDATE per scope — never read-then-write —
//! so concurrent coordinators can never hand out the same number, even
//! across processes. Gaps from rolled-back transactions are acceptable;
//! duplicates are not.

use sqlx::PgConnection;

/// Provides atomic per-scope sequence allocation.
pub struct SerialRepo;

impl SerialRepo {
    /// Atomically increment and return the next sequence number for
    /// `scope_key`.
    ///
    /// The first call for a new scope returns 1. Takes a connection so it
    /// can participate in the caller's transaction: if that transaction
    /// rolls back, the allocated number is simply a gap.
    pub async fn next_seq(conn: &mut PgConnection, scope_key: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO serial_scopes (scope_key, last_seq) VALUES ($1, 1) \
             ON CONFLICT (scope_key) \
             DO UPDATE SET last_seq = serial_scopes.last_seq + 1, updated_at = NOW() \
             RETURNING last_seq",
        )
        .bind(scope_key)
        .fetch_one(conn)
        .await
    }
}
