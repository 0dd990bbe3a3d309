pub mod auth;
pub mod config;
pub mod db;
pub mod http;
pub mod impact;
pub mod logging;
pub mod metrics;
pub mod migrations;
pub mod server;
