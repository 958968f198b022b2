// Automatic ordering for records that live in a sibling group.
//
// A new record takes 1 + the highest order among its siblings, or 0 when it
// is the first. Gaps left by deletions are never refilled.

use sqlx::SqliteConnection;

use crate::error::{AppError, Result};

/// Largest order value accepted from clients.
pub const MAX_ORDER: i64 = 2_147_483_647;

/// The sibling group a record is ordered within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope<'a> {
    /// Content slots of one structure.
    Structure(&'a str),
    /// Item associations of one content slot.
    Content(&'a str),
}

impl OrderScope<'_> {
    fn table(&self) -> &'static str {
        match self {
            OrderScope::Structure(_) => "contents",
            OrderScope::Content(_) => "diverse_contents",
        }
    }

    fn scope_column(&self) -> &'static str {
        match self {
            OrderScope::Structure(_) => "structure_id",
            OrderScope::Content(_) => "content_id",
        }
    }

    fn key(&self) -> &str {
        match self {
            OrderScope::Structure(id) | OrderScope::Content(id) => id,
        }
    }
}

/// Next free order value in `scope`. Run it on the connection that performs the insert.
pub async fn next_order(conn: &mut SqliteConnection, scope: OrderScope<'_>) -> Result<i64> {
    let sql = format!(
        "SELECT MAX(position) FROM {} WHERE {} = ?",
        scope.table(),
        scope.scope_column()
    );

    let max = sqlx::query_scalar::<_, Option<i64>>(&sql)
        .bind(scope.key())
        .fetch_one(&mut *conn)
        .await?;

    match max {
        None => Ok(0),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| AppError::Validation("No order value left after the last sibling".to_string())),
    }
}

/// Keeps an explicitly supplied order, otherwise computes the next one.
pub async fn assign_order(
    conn: &mut SqliteConnection,
    scope: OrderScope<'_>,
    explicit: Option<i64>,
) -> Result<i64> {
    match explicit {
        Some(order) => Ok(order),
        None => next_order(conn, scope).await,
    }
}
