use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Pool, Sqlite};
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::require_auth;
use crate::{policy, ApiError, ApiResult, AppState};

const EVENT_TYPES: [&str; 5] = [
    "food_drive",
    "ewaste_cleanup",
    "awareness",
    "tree_planting",
    "other",
];

pub(crate) const EVENT_UPCOMING: &str = "upcoming";
pub(crate) const EVENT_ONGOING: &str = "ongoing";
pub(crate) const EVENT_COMPLETED: &str = "completed";

#[derive(Debug, Clone, FromRow, Serialize)]
pub(crate) struct EventRow {
    pub id: String,
    pub created_by: String,
    pub title: String,
    pub description: Option<String>,
    pub event_type: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub event_date: i64,
    pub duration_hours: Option<f64>,
    pub max_volunteers: Option<i64>,
    pub registered_count: i64,
    pub points_reward: i64,
    pub image_url: Option<String>,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub(crate) struct RegistrationRow {
    pub event_id: String,
    pub user_id: String,
    pub attendance: String,
    pub points_awarded: bool,
    pub awarded_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Serialize)]
pub(crate) struct EventResponse {
    #[serde(flatten)]
    pub event: EventRow,
    pub registered: Vec<RegistrationRow>,
}

#[derive(Deserialize)]
pub(crate) struct CreateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_type: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub event_date: Option<DateTime<Utc>>,
    pub duration_hours: Option<f64>,
    pub max_volunteers: Option<i64>,
    pub points_reward: Option<i64>,
    pub image_url: Option<String>,
}

pub(crate) async fn list_events(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<EventResponse>>> {
    require_auth(&state, &headers).await?;

    let events = sqlx::query_as::<_, EventRow>(
        "SELECT * FROM volunteer_events ORDER BY created_at DESC, id",
    )
    .fetch_all(&state.pool)
    .await?;

    let registrations = sqlx::query_as::<_, RegistrationRow>(
        "SELECT * FROM volunteer_registrations ORDER BY created_at, user_id",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut by_event: HashMap<String, Vec<RegistrationRow>> = HashMap::new();
    for registration in registrations {
        by_event
            .entry(registration.event_id.clone())
            .or_default()
            .push(registration);
    }

    let response = events
        .into_iter()
        .map(|event| {
            let registered = by_event.remove(&event.id).unwrap_or_default();
            EventResponse { event, registered }
        })
        .collect();
    Ok(Json(response))
}

pub(crate) async fn create_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<EventResponse>)> {
    let actor = require_auth(&state, &headers).await?;

    let title = payload
        .title
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid("title is required"))?;
    let event_type = payload
        .event_type
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid("event_type is required"))?;
    if !EVENT_TYPES.contains(&event_type.as_str()) {
        return Err(invalid("unknown event_type"));
    }
    let event_date = payload
        .event_date
        .ok_or_else(|| invalid("event_date is required"))?;

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO volunteer_events          (id, created_by, title, description, event_type, location, latitude, longitude,           event_date, duration_hours, max_volunteers, points_reward, image_url, status)          VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&actor.user_id)
    .bind(&title)
    .bind(&payload.description)
    .bind(&event_type)
    .bind(&payload.location)
    .bind(payload.latitude)
    .bind(payload.longitude)
    .bind(event_date.timestamp())
    .bind(payload.duration_hours)
    .bind(payload.max_volunteers)
    .bind(payload.points_reward.unwrap_or(0))
    .bind(&payload.image_url)
    .bind(EVENT_UPCOMING)
    .execute(&state.pool)
    .await?;

    let event = fetch_event(&state.pool, &id).await?;
    Ok((
        StatusCode::CREATED,
        Json(EventResponse {
            event,
            registered: Vec::new(),
        }),
    ))
}

pub(crate) async fn register_for_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<EventResponse>> {
    let actor = require_auth(&state, &headers).await?;
    let event = fetch_event(&state.pool, &id).await?;

    if event.status != EVENT_UPCOMING && event.status != EVENT_ONGOING {
        return Err(conflict("cannot register for this event"));
    }

    let already = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM volunteer_registrations WHERE event_id = ? AND user_id = ?",
    )
    .bind(&id)
    .bind(&actor.user_id)
    .fetch_one(&state.pool)
    .await?;
    if already > 0 {
        return Err(conflict("already registered"));
    }

    // NULL or 0 means unlimited capacity; the gate runs before the insert.
    if let Some(max) = event.max_volunteers {
        if max > 0 && event.registered_count >= max {
            return Err(conflict("event is full"));
        }
    }

    sqlx::query("INSERT INTO volunteer_registrations (event_id, user_id) VALUES (?, ?)")
        .bind(&id)
        .bind(&actor.user_id)
        .execute(&state.pool)
        .await?;
    sqlx::query(
        "UPDATE volunteer_events SET registered_count = registered_count + 1,          updated_at = unixepoch() WHERE id = ?",
    )
    .bind(&id)
    .execute(&state.pool)
    .await?;

    event_with_registrations(&state.pool, &id).await.map(Json)
}

/// Completes the event and awards `points_reward` to every registrant not
/// yet awarded. The per-entry flag guards against double-awarding; a second
/// completion reports a conflict and changes no points.
pub(crate) async fn complete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<EventResponse>> {
    let actor = require_auth(&state, &headers).await?;
    let event = fetch_event(&state.pool, &id).await?;
    policy::require_owner_or_admin(&actor, &event.created_by)?;

    if event.status == EVENT_COMPLETED {
        return Err(conflict("event already completed"));
    }

    let pending = sqlx::query_as::<_, RegistrationRow>(
        "SELECT * FROM volunteer_registrations WHERE event_id = ? AND points_awarded = 0",
    )
    .bind(&id)
    .fetch_all(&state.pool)
    .await?;

    for registration in &pending {
        award_points(&state.pool, &id, &registration.user_id, event.points_reward).await?;
    }

    sqlx::query("UPDATE volunteer_events SET status = ?, updated_at = unixepoch() WHERE id = ?")
        .bind(EVENT_COMPLETED)
        .bind(&id)
        .execute(&state.pool)
        .await?;

    event_with_registrations(&state.pool, &id).await.map(Json)
}

/// Single-entry variant of completion's award step: marks one registrant as
/// attended and awards their points, once.
pub(crate) async fn mark_attendance(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<RegistrationRow>> {
    let actor = require_auth(&state, &headers).await?;
    let event = fetch_event(&state.pool, &id).await?;
    policy::require_owner_or_admin(&actor, &event.created_by)?;

    let registration = sqlx::query_as::<_, RegistrationRow>(
        "SELECT * FROM volunteer_registrations WHERE event_id = ? AND user_id = ?",
    )
    .bind(&id)
    .bind(&user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| {
        ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", "user not registered")
    })?;

    if registration.points_awarded {
        return Err(conflict("points already awarded"));
    }

    award_points(&state.pool, &id, &user_id, event.points_reward).await?;
    sqlx::query(
        "UPDATE volunteer_registrations SET attendance = 'attended'          WHERE event_id = ? AND user_id = ?",
    )
    .bind(&id)
    .bind(&user_id)
    .execute(&state.pool)
    .await?;

    let updated = sqlx::query_as::<_, RegistrationRow>(
        "SELECT * FROM volunteer_registrations WHERE event_id = ? AND user_id = ?",
    )
    .bind(&id)
    .bind(&user_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(updated))
}

pub(crate) async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let actor = require_auth(&state, &headers).await?;
    let event = fetch_event(&state.pool, &id).await?;
    policy::require_owner_or_admin(&actor, &event.created_by)?;

    sqlx::query("DELETE FROM volunteer_registrations WHERE event_id = ?")
        .bind(&id)
        .execute(&state.pool)
        .await?;
    sqlx::query("DELETE FROM volunteer_events WHERE id = ?")
        .bind(&id)
        .execute(&state.pool)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Atomic point grant plus flag flip: the user update is a single
/// increment, and the flag row records that this entry has been paid.
async fn award_points(
    pool: &Pool<Sqlite>,
    event_id: &str,
    user_id: &str,
    reward: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET volunteer_points = volunteer_points + ?, updated_at = unixepoch()          WHERE id = ?",
    )
    .bind(reward)
    .bind(user_id)
    .execute(pool)
    .await?;
    sqlx::query(
        "UPDATE volunteer_registrations SET points_awarded = 1, awarded_at = unixepoch()          WHERE event_id = ? AND user_id = ?",
    )
    .bind(event_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn fetch_event(pool: &Pool<Sqlite>, id: &str) -> ApiResult<EventRow> {
    let event = sqlx::query_as::<_, EventRow>("SELECT * FROM volunteer_events WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    event.ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", "event not found"))
}

async fn event_with_registrations(pool: &Pool<Sqlite>, id: &str) -> ApiResult<EventResponse> {
    let event = fetch_event(pool, id).await?;
    let registered = sqlx::query_as::<_, RegistrationRow>(
        "SELECT * FROM volunteer_registrations WHERE event_id = ? ORDER BY created_at, user_id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;
    Ok(EventResponse { event, registered })
}

fn conflict(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "CONFLICT", message)
}

fn invalid(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION", message)
}
