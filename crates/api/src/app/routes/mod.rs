use axum::{Router, routing::post};

pub mod backup;
pub mod system;
pub mod tasks;

/// Router for the job submission and worker callback endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/db", backup::router())
        .route("/tasks/success", post(tasks::success))
        .route("/tasks/failure", post(tasks::failure))
        .route("/tasks/heartbeat", post(tasks::heartbeat))
}
