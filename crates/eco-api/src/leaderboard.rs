use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::{require_auth, ROLE_STUDENT};
use crate::{ApiResult, AppState};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub(crate) struct LeaderboardQuery {
    pub limit: Option<String>,
}

#[derive(Debug, FromRow, Serialize)]
pub(crate) struct LeaderboardEntry {
    pub id: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub volunteer_points: i64,
    pub role: String,
}

/// Students ranked by accumulated points. A malformed limit falls back to
/// the default rather than erroring.
pub(crate) async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    require_auth(&state, &headers).await?;

    let limit = query
        .limit
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);

    let entries = sqlx::query_as::<_, LeaderboardEntry>(
        "SELECT id, full_name, avatar_url, volunteer_points, role FROM users          WHERE role = ? ORDER BY volunteer_points DESC, id LIMIT ?",
    )
    .bind(ROLE_STUDENT)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(entries))
}
