use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use eco_core::impact::ImpactDelta;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::require_auth;
use crate::share::{self, Shareable, STATUS_AVAILABLE};
use crate::{policy, ApiError, ApiResult, AppState};

const CATEGORIES: [&str; 5] = ["books", "clothes", "stationery", "electronics", "other"];
const CONDITIONS: [&str; 3] = ["new", "good", "fair"];

#[derive(Debug, Clone, FromRow, Serialize)]
pub(crate) struct DonationRow {
    pub id: String,
    pub donated_by: String,
    pub item_name: String,
    pub category: String,
    pub condition: Option<String>,
    pub quantity: f64,
    pub description: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub status: String,
    pub claimed_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Shareable for DonationRow {
    const TABLE: &'static str = "donations";
    const NOUN: &'static str = "donation";

    fn owner(&self) -> &str {
        &self.donated_by
    }

    fn status(&self) -> &str {
        &self.status
    }

    fn claimed_by(&self) -> Option<&str> {
        self.claimed_by.as_deref()
    }

    // Donations carry no magnitude wired to the impact record; the ledger
    // skips the zero delta. Intentional scope gap, kept from the original
    // behavior, so unclaim has nothing to reverse either.
    fn impact_delta(&self) -> ImpactDelta {
        ImpactDelta::ZERO
    }
}

#[derive(Deserialize)]
pub(crate) struct CreateDonationRequest {
    pub item_name: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub quantity: Option<f64>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
}

pub(crate) async fn list_donations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<DonationRow>>> {
    require_auth(&state, &headers).await?;
    Ok(Json(share::list::<DonationRow>(&state.pool).await?))
}

pub(crate) async fn create_donation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateDonationRequest>,
) -> ApiResult<(StatusCode, Json<DonationRow>)> {
    let actor = require_auth(&state, &headers).await?;

    let item_name = payload
        .item_name
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid("item_name is required"))?;
    let category = payload
        .category
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid("category is required"))?;
    if !CATEGORIES.contains(&category.as_str()) {
        return Err(invalid("unknown category"));
    }
    if let Some(condition) = payload.condition.as_deref() {
        if !CONDITIONS.contains(&condition) {
            return Err(invalid("unknown condition"));
        }
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO donations          (id, donated_by, item_name, category, condition, quantity, description, location, image_url, status)          VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&actor.user_id)
    .bind(&item_name)
    .bind(&category)
    .bind(&payload.condition)
    .bind(payload.quantity.unwrap_or(1.0))
    .bind(&payload.description)
    .bind(&payload.location)
    .bind(&payload.image_url)
    .bind(STATUS_AVAILABLE)
    .execute(&state.pool)
    .await?;

    let created = share::fetch::<DonationRow>(&state.pool, &id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn claim_donation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<DonationRow>> {
    let actor = require_auth(&state, &headers).await?;
    Ok(Json(share::claim::<DonationRow>(&state, &id, &actor).await?))
}

/// Reverts a donation to `available`. No status precondition: unclaiming an
/// unclaimed donation is a no-op that still succeeds.
pub(crate) async fn unclaim_donation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<DonationRow>> {
    let actor = require_auth(&state, &headers).await?;
    let donation = share::fetch::<DonationRow>(&state.pool, &id).await?;
    policy::require_unclaim_party(&actor, &donation.donated_by, donation.claimed_by())?;

    sqlx::query(
        "UPDATE donations SET status = ?, claimed_by = NULL, updated_at = unixepoch() WHERE id = ?",
    )
    .bind(STATUS_AVAILABLE)
    .bind(&id)
    .execute(&state.pool)
    .await?;

    Ok(Json(share::fetch::<DonationRow>(&state.pool, &id).await?))
}

fn invalid(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
}
