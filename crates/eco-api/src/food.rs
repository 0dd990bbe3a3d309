use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use eco_core::impact::ImpactDelta;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::require_auth;
use crate::share::{self, Shareable, STATUS_AVAILABLE};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Clone, FromRow, Serialize)]
pub(crate) struct FoodRow {
    pub id: String,
    pub posted_by: String,
    pub food_type: String,
    pub quantity: String,
    pub expiry_time: i64,
    pub location: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub status: String,
    pub claimed_by: Option<String>,
    pub meals_saved: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Shareable for FoodRow {
    const TABLE: &'static str = "food_posts";
    const NOUN: &'static str = "food post";

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
            meals_saved: self.meals_saved,
            food_waste_kg: quantity_kg(&self.quantity),
            ..ImpactDelta::ZERO
        }
    }
}

/// The free-form quantity ("2kg", "1.5 kg") contributes its leading numeric
/// value to the waste total; anything without one counts as zero.
fn quantity_kg(quantity: &str) -> f64 {
    let trimmed = quantity.trim();
    let end = trimmed
        .char_indices()
        .take_while(|(index, c)| c.is_ascii_digit() || *c == '.' || (*index == 0 && *c == '-'))
        .map(|(index, c)| index + c.len_utf8())
        .last()
        .unwrap_or(0);
    trimmed[..end].parse().unwrap_or(0.0)
}

#[derive(Deserialize)]
pub(crate) struct CreateFoodRequest {
    pub food_type: Option<String>,
    pub quantity: Option<String>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub meals_saved: Option<f64>,
}

#[derive(Deserialize)]
pub(crate) struct UpdateFoodRequest {
    pub food_type: Option<String>,
    pub quantity: Option<String>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub meals_saved: Option<f64>,
    pub status: Option<String>,
}

pub(crate) async fn list_food(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<FoodRow>>> {
    require_auth(&state, &headers).await?;
    Ok(Json(share::list::<FoodRow>(&state.pool).await?))
}

pub(crate) async fn create_food(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateFoodRequest>,
) -> ApiResult<(StatusCode, Json<FoodRow>)> {
    let actor = require_auth(&state, &headers).await?;

    let food_type = required(payload.food_type, "food_type is required")?;
    let quantity = required(payload.quantity, "quantity is required")?;
    let expiry_time = payload
        .expiry_time
        .ok_or_else(|| invalid("expiry_time is required"))?;
    let location = required(payload.location, "location is required")?;

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO food_posts          (id, posted_by, food_type, quantity, expiry_time, location, description, image_url, status, meals_saved)          VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&actor.user_id)
    .bind(&food_type)
    .bind(&quantity)
    .bind(expiry_time.timestamp())
    .bind(&location)
    .bind(&payload.description)
    .bind(&payload.image_url)
    .bind(STATUS_AVAILABLE)
    .bind(payload.meals_saved.unwrap_or(0.0))
    .execute(&state.pool)
    .await?;

    let created = share::fetch::<FoodRow>(&state.pool, &id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn claim_food(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<FoodRow>> {
    let actor = require_auth(&state, &headers).await?;
    Ok(Json(share::claim::<FoodRow>(&state, &id, &actor).await?))
}

pub(crate) async fn update_food(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateFoodRequest>,
) -> ApiResult<Json<FoodRow>> {
    let actor = require_auth(&state, &headers).await?;
    let before = share::fetch::<FoodRow>(&state.pool, &id).await?;
    crate::policy::require_owner(&actor, before.owner())?;

    let status = match payload.status {
        Some(status) => {
            share::validate_status(&status)?;
            status
        }
        None => before.status.clone(),
    };

    sqlx::query(
        "UPDATE food_posts SET food_type = ?, quantity = ?, expiry_time = ?, location = ?,          description = ?, image_url = ?, meals_saved = ?, status = ?, updated_at = unixepoch()          WHERE id = ?",
    )
    .bind(payload.food_type.unwrap_or_else(|| before.food_type.clone()))
    .bind(payload.quantity.unwrap_or_else(|| before.quantity.clone()))
    .bind(
        payload
            .expiry_time
            .map(|t| t.timestamp())
            .unwrap_or(before.expiry_time),
    )
    .bind(payload.location.unwrap_or_else(|| before.location.clone()))
    .bind(payload.description.or_else(|| before.description.clone()))
    .bind(payload.image_url.or_else(|| before.image_url.clone()))
    .bind(payload.meals_saved.unwrap_or(before.meals_saved))
    .bind(&status)
    .bind(&id)
    .execute(&state.pool)
    .await?;

    let after = share::fetch::<FoodRow>(&state.pool, &id).await?;
    share::apply_edit_delta(&state, &before, &after).await;
    Ok(Json(after))
}

pub(crate) async fn delete_food(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let actor = require_auth(&state, &headers).await?;
    share::delete_owned::<FoodRow>(&state, &id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn required(value: Option<String>, message: &str) -> ApiResult<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid(message))
}

fn invalid(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_parses_leading_number() {
        assert_eq!(quantity_kg("2kg"), 2.0);
        assert_eq!(quantity_kg(" 1.5 kg "), 1.5);
        assert_eq!(quantity_kg("10"), 10.0);
    }

    #[test]
    fn quantity_without_number_counts_as_zero() {
        assert_eq!(quantity_kg("a few boxes"), 0.0);
        assert_eq!(quantity_kg(""), 0.0);
        assert_eq!(quantity_kg("kg2"), 0.0);
    }
}
