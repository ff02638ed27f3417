//! One handler module per HTTP concern: rendezvous codes/credit, and the
//! transfer protocol. `/health`/`/live` are trivial enough to live here
//! directly rather than get their own file.

pub mod code;
pub mod transfer;

use axum::http::StatusCode;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn live() -> StatusCode {
    StatusCode::OK
}
