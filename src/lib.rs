pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod models;
pub mod controllers;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
}
