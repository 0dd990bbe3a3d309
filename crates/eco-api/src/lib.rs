use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use eco_core::impact::ImpactLedger;
use eco_core::{auth::JwtConfig, config, db, http, logging, metrics, migrations, server};
use serde::Serialize;
use serde_json::Value;
use sqlx::{Pool, Sqlite};
use std::net::SocketAddr;

mod auth;
mod donations;
mod ewaste;
mod food;
mod global_stats;
mod impact;
mod leaderboard;
mod policy;
mod share;
mod volunteers;


const SERVICE_NAME: &str = "eco-api";
const JWT_ISSUER: &str = "ecoshare";
const JWT_AUDIENCE: &str = "eco-api";

#[derive(Clone)]
pub(crate) struct AppState {
    pool: Pool<Sqlite>,
    jwt_config: JwtConfig,
    ledger: ImpactLedger,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    details: Option<Value>,
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
    headers: Vec<(&'static str, String)>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            headers: Vec::new(),
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    fn with_header(mut self, name: &'static str, value: String) -> Self {
        self.headers.push((name, value));
        self
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "DB_ERROR", err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = ErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        let mut response = (self.status, Json(payload)).into_response();
        for (name, value) in self.headers {
            if let Ok(value) = value.parse() {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct HealthStatus {
    status: String,
}

pub struct EcoApiConfig {
    pub addr: SocketAddr,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_seconds: u64,
}

pub fn load_config() -> Result<EcoApiConfig> {
    let addr = config::socket_addr_from_env("ECO_API_ADDR", "0.0.0.0:8080")?;
    let database_url = config::required_env("DATABASE_URL")?;
    let jwt_secret = config::required_env("JWT_SECRET")?;
    let jwt_ttl_seconds = config::u64_from_env("JWT_TTL_SECONDS", 7 * 24 * 60 * 60)?;
    Ok(EcoApiConfig {
        addr,
        database_url,
        jwt_secret,
        jwt_ttl_seconds,
    })
}

pub async fn run(config: EcoApiConfig) -> Result<()> {
    logging::init(SERVICE_NAME);
    metrics::init(SERVICE_NAME);

    let pool = db::connect(&config.database_url).await?;
    migrations::run(&pool).await?;
    tracing::info!("database ready");

    let jwt_config = JwtConfig {
        issuer: JWT_ISSUER.to_string(),
        audience: JWT_AUDIENCE.to_string(),
        secret: config.jwt_secret,
        ttl_seconds: config.jwt_ttl_seconds,
    };
    let ledger = ImpactLedger::new(pool.clone(), SERVICE_NAME);
    let state = AppState {
        pool,
        jwt_config,
        ledger,
    };

    let router = http::apply_standard_layers(router(state), SERVICE_NAME);
    server::serve(config.addr, router).await
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/food", get(food::list_food).post(food::create_food))
        .route(
            "/api/food/:id",
            put(food::update_food).delete(food::delete_food),
        )
        .route("/api/food/:id/claim", patch(food::claim_food))
        .route(
            "/api/ewaste",
            get(ewaste::list_ewaste).post(ewaste::create_ewaste),
        )
        .route(
            "/api/ewaste/:id",
            put(ewaste::update_ewaste).delete(ewaste::delete_ewaste),
        )
        .route("/api/ewaste/:id/claim", patch(ewaste::claim_ewaste))
        .route(
            "/api/donations",
            get(donations::list_donations).post(donations::create_donation),
        )
        .route("/api/donations/:id/claim", patch(donations::claim_donation))
        .route(
            "/api/donations/:id/unclaim",
            patch(donations::unclaim_donation),
        )
        .route(
            "/api/volunteers",
            get(volunteers::list_events).post(volunteers::create_event),
        )
        .route("/api/volunteers/:id", delete(volunteers::delete_event))
        .route(
            "/api/volunteers/:id/register",
            post(volunteers::register_for_event),
        )
        .route(
            "/api/volunteers/:id/complete",
            post(volunteers::complete_event),
        )
        .route(
            "/api/volunteers/:id/attendance/:user_id",
            post(volunteers::mark_attendance),
        )
        .route("/api/impact", get(impact::get_impact))
        .route("/api/leaderboard", get(leaderboard::get_leaderboard))
        .route("/api/global-stats", get(global_stats::get_global_stats))
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match db::check_ready(&state.pool).await {
        Ok(_) => (StatusCode::OK, Json(HealthStatus { status: "ok".into() })),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthStatus {
                status: "unavailable".into(),
            }),
        ),
    }
}

async fn metrics_endpoint() -> impl IntoResponse {
    metrics::metrics_response(SERVICE_NAME)
}
