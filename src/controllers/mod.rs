pub mod films;
pub mod halls;
pub mod sessions;
pub mod tickets;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(films::routes())
        .merge(halls::routes())
        .merge(sessions::routes())
        .merge(tickets::routes())
}
