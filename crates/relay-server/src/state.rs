//! Shared application state, built once in `main` and cloned (cheaply, via
//! `Arc`) into every handler.

use crate::config::RelayConfig;
use axum_extra::extract::cookie::Key;
use relay_core::repo::{CreditRepository, TransferRepository, UserRepository};
use relay_push::Hub;
use relay_storage::BlobStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub credits: Arc<dyn CreditRepository>,
    pub transfers: Arc<dyn TransferRepository>,
    pub hub: Arc<Hub>,
    pub blobs: Arc<BlobStore>,
    pub config: Arc<RelayConfig>,
    pub cookie_key: Key,
}

impl axum::extract::FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
