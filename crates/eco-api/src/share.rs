//! Generic lifecycle engine for claimable shareable entities.
//!
//! Food posts, e-waste items, and donations share one create/claim/delete
//! shape; each kind supplies its table layout and its impact magnitude
//! mapping through [`Shareable`], and the handlers delegate here instead of
//! repeating the lifecycle logic per kind.

use axum::http::StatusCode;
use eco_core::impact::ImpactDelta;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Pool, Sqlite};

use crate::auth::AuthContext;
use crate::{policy, ApiError, ApiResult, AppState};

pub(crate) const STATUS_AVAILABLE: &str = "available";
pub(crate) const STATUS_CLAIMED: &str = "claimed";
pub(crate) const STATUS_COMPLETED: &str = "completed";

pub(crate) const STATUSES: [&str; 3] = [STATUS_AVAILABLE, STATUS_CLAIMED, STATUS_COMPLETED];

/// A claimable entity kind. `impact_delta` is the row's full contribution
/// to the aggregate record; a kind with no wired magnitude returns zero and
/// the ledger skips the write.
pub(crate) trait Shareable: for<'r> FromRow<'r, SqliteRow> + Send + Unpin + 'static {
    const TABLE: &'static str;
    const NOUN: &'static str;

    fn owner(&self) -> &str;
    fn status(&self) -> &str;
    fn claimed_by(&self) -> Option<&str>;
    fn impact_delta(&self) -> ImpactDelta;
}

pub(crate) fn not_found<T: Shareable>() -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
        format!("{} not found", T::NOUN),
    )
}

pub(crate) fn conflict(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "CONFLICT", message)
}

pub(crate) async fn fetch<T: Shareable>(pool: &Pool<Sqlite>, id: &str) -> ApiResult<T> {
    let row = sqlx::query_as::<_, T>(&format!("SELECT * FROM {} WHERE id = ?", T::TABLE))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.ok_or_else(not_found::<T>)
}

pub(crate) async fn list<T: Shareable>(pool: &Pool<Sqlite>) -> ApiResult<Vec<T>> {
    let rows = sqlx::query_as::<_, T>(&format!(
        "SELECT * FROM {} ORDER BY created_at DESC, id",
        T::TABLE
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Moves `available` to `claimed` and applies the positive impact delta.
/// The precondition
/// check and the status write are separate statements; two racing claims
/// can both pass the check (lost-update hazard, kept as designed).
pub(crate) async fn claim<T: Shareable>(
    state: &AppState,
    id: &str,
    actor: &AuthContext,
) -> ApiResult<T> {
    let entity = fetch::<T>(&state.pool, id).await?;
    if entity.status() != STATUS_AVAILABLE {
        return Err(conflict("already claimed or completed"));
    }

    sqlx::query(&format!(
        "UPDATE {} SET status = ?, claimed_by = ?, updated_at = unixepoch() WHERE id = ?",
        T::TABLE
    ))
    .bind(STATUS_CLAIMED)
    .bind(&actor.user_id)
    .bind(id)
    .execute(&state.pool)
    .await?;

    state.ledger.apply(entity.impact_delta()).await;

    fetch::<T>(&state.pool, id).await
}

/// Owner-only delete; a claimed row's contribution is reversed first so the
/// totals stay correct.
pub(crate) async fn delete_owned<T: Shareable>(
    state: &AppState,
    id: &str,
    actor: &AuthContext,
) -> ApiResult<()> {
    let entity = fetch::<T>(&state.pool, id).await?;
    policy::require_owner(actor, entity.owner())?;

    if entity.status() == STATUS_CLAIMED {
        state.ledger.apply(entity.impact_delta().inverse()).await;
    }

    sqlx::query(&format!("DELETE FROM {} WHERE id = ?", T::TABLE))
        .bind(id)
        .execute(&state.pool)
        .await?;
    Ok(())
}

/// Applies the while-claimed edit adjustment: per-field `new − old`,
/// computed from the row read before the update and the row read after.
pub(crate) async fn apply_edit_delta<T: Shareable>(state: &AppState, before: &T, after: &T) {
    if before.status() == STATUS_CLAIMED {
        state
            .ledger
            .apply(after.impact_delta().minus(&before.impact_delta()))
            .await;
    }
}

pub(crate) fn validate_status(status: &str) -> ApiResult<()> {
    if STATUSES.contains(&status) {
        return Ok(());
    }
    Err(ApiError::new(
        StatusCode::BAD_REQUEST,
        "VALIDATION",
        "unknown status",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_validation_accepts_lifecycle_values_only() {
        assert!(validate_status("available").is_ok());
        assert!(validate_status("claimed").is_ok());
        assert!(validate_status("completed").is_ok());
        assert!(validate_status("cancelled").is_err());
        assert!(validate_status("Available").is_err());
    }
}
