use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use eco_core::impact::ImpactTotals;

use crate::auth::require_auth;
use crate::{ApiResult, AppState};

/// Read the aggregate record, creating the zero row on first access. Unlike
/// the delta path, a storage failure here surfaces as a plain 500.
pub(crate) async fn get_impact(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ImpactTotals>> {
    require_auth(&state, &headers).await?;
    let totals = state.ledger.read().await?;
    Ok(Json(totals))
}
