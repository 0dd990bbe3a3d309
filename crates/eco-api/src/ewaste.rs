use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use eco_core::impact::ImpactDelta;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::require_auth;
use crate::share::{self, Shareable, STATUS_AVAILABLE};
use crate::{ApiError, ApiResult, AppState};

const ITEM_TYPES: [&str; 5] = ["mobile", "laptop", "charger", "tablet", "other"];

#[derive(Debug, Clone, FromRow, Serialize)]
pub(crate) struct EwasteRow {
    pub id: String,
    pub posted_by: String,
    pub item_type: String,
    pub quantity: f64,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub status: String,
    pub claimed_by: Option<String>,
    pub co2_saved_kg: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Shareable for EwasteRow {
    const TABLE: &'static str = "ewaste_items";
    const NOUN: &'static str = "e-waste post";

    fn owner(&self) -> &str {
        &self.posted_by
    }

    fn status(&self) -> &str {
        &self.status
    }

    fn claimed_by(&self) -> Option<&str> {
        self.claimed_by.as_deref()
    }

    fn impact_delta(&self) -> ImpactDelta {
        ImpactDelta {
            ewaste_items: self.quantity,
            co2_saved_kg: self.co2_saved_kg,
            ..ImpactDelta::ZERO
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct CreateEwasteRequest {
    pub item_type: Option<String>,
    pub quantity: Option<f64>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub co2_saved_kg: Option<f64>,
}

#[derive(Deserialize)]
pub(crate) struct UpdateEwasteRequest {
    pub item_type: Option<String>,
    pub quantity: Option<f64>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub co2_saved_kg: Option<f64>,
    pub status: Option<String>,
}

pub(crate) async fn list_ewaste(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<EwasteRow>>> {
    require_auth(&state, &headers).await?;
    Ok(Json(share::list::<EwasteRow>(&state.pool).await?))
}

pub(crate) async fn create_ewaste(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateEwasteRequest>,
) -> ApiResult<(StatusCode, Json<EwasteRow>)> {
    let actor = require_auth(&state, &headers).await?;

    let item_type = payload
        .item_type
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid("item_type is required"))?;
    if !ITEM_TYPES.contains(&item_type.as_str()) {
        return Err(invalid("unknown item_type"));
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO ewaste_items          (id, posted_by, item_type, quantity, condition, location, description, image_url, status, co2_saved_kg)          VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&actor.user_id)
    .bind(&item_type)
    .bind(payload.quantity.unwrap_or(0.0))
    .bind(&payload.condition)
    .bind(&payload.location)
    .bind(&payload.description)
    .bind(&payload.image_url)
    .bind(STATUS_AVAILABLE)
    .bind(payload.co2_saved_kg.unwrap_or(0.0))
    .execute(&state.pool)
    .await?;

    let created = share::fetch::<EwasteRow>(&state.pool, &id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn claim_ewaste(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<EwasteRow>> {
    let actor = require_auth(&state, &headers).await?;
    Ok(Json(share::claim::<EwasteRow>(&state, &id, &actor).await?))
}

pub(crate) async fn update_ewaste(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateEwasteRequest>,
) -> ApiResult<Json<EwasteRow>> {
    let actor = require_auth(&state, &headers).await?;
    let before = share::fetch::<EwasteRow>(&state.pool, &id).await?;
    crate::policy::require_owner(&actor, before.owner())?;

    if let Some(item_type) = payload.item_type.as_deref() {
        if !ITEM_TYPES.contains(&item_type) {
            return Err(invalid("unknown item_type"));
        }
    }
    let status = match payload.status {
        Some(status) => {
            share::validate_status(&status)?;
            status
        }
        None => before.status.clone(),
    };

    sqlx::query(
        "UPDATE ewaste_items SET item_type = ?, quantity = ?, condition = ?, location = ?,          description = ?, image_url = ?, co2_saved_kg = ?, status = ?, updated_at = unixepoch()          WHERE id = ?",
    )
    .bind(payload.item_type.unwrap_or_else(|| before.item_type.clone()))
    .bind(payload.quantity.unwrap_or(before.quantity))
    .bind(payload.condition.or_else(|| before.condition.clone()))
    .bind(payload.location.or_else(|| before.location.clone()))
    .bind(payload.description.or_else(|| before.description.clone()))
    .bind(payload.image_url.or_else(|| before.image_url.clone()))
    .bind(payload.co2_saved_kg.unwrap_or(before.co2_saved_kg))
    .bind(&status)
    .bind(&id)
    .execute(&state.pool)
    .await?;

    let after = share::fetch::<EwasteRow>(&state.pool, &id).await?;
    share::apply_edit_delta(&state, &before, &after).await;
    Ok(Json(after))
}

pub(crate) async fn delete_ewaste(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let actor = require_auth(&state, &headers).await?;
    share::delete_owned::<EwasteRow>(&state, &id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn invalid(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
}
