use tracing_subscriber::EnvFilter;

// The default filter keeps sqlx's per-statement logging out of production
// output; RUST_LOG overrides it entirely.
const DEFAULT_FILTER: &str = "info,sqlx=warn";

pub fn init(service_name: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(false)
        .init();

    tracing::info!(service = service_name, "logging initialized");
}
