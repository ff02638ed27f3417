//! `/init-upload`, `/upload`, `/download`, `/completed-download` — the
//! two-phase upload protocol and its download/completion counterpart (C4)
//! at the HTTP boundary.

use crate::auth::caller_from_headers;
use crate::error::ApiResult;
use crate::state::AppState;
use crate::ticket;
use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::PrivateCookieJar;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use relay_core::error::RelayError;
use relay_core::transfer;
use serde::{Deserialize, Serialize};

/// Untrusted filename supplied in the multipart body: keep only the final
/// path segment so it can never be interpreted as a server path.
fn sanitize_filename(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("body")
        .to_string()
}

#[derive(Deserialize)]
pub struct InitUploadRequest {
    pub recipient_code: String,
    pub declared_size: i64,
}

#[derive(Serialize)]
pub struct InitUploadResponse {
    pub recipient_public_key: String,
}

pub async fn init_upload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: PrivateCookieJar,
    Json(body): Json<InitUploadRequest>,
) -> ApiResult<(PrivateCookieJar, Json<InitUploadResponse>)> {
    let (identity, identity_key) = caller_from_headers(&headers)?;
    if !relay_core::identity::validate(&*state.users, &identity, &identity_key).await? {
        return Err(RelayError::IdentityKeyMismatch.into());
    }

    let result = transfer::init_upload(
        &*state.users,
        &*state.credits,
        &*state.transfers,
        state.hub.as_ref(),
        &identity,
        &body.recipient_code,
        body.declared_size,
    )
    .await?;

    let jar = ticket::store(jar, &result.ticket);
    let recipient_public_key = STANDARD.encode(&result.recipient_public_key);

    Ok((jar, Json(InitUploadResponse { recipient_public_key })))
}

/// Multipart fields: `password` (encrypted-for-recipient blob), `file`
/// (the ciphertext body), `wanted_minutes` (text, the download-side
/// session length).
pub async fn upload_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut multipart: Multipart,
) -> ApiResult<(PrivateCookieJar, ())> {
    let (jar, ticket) = ticket::take(jar);
    let ticket = ticket.ok_or(RelayError::NoTicket)?;

    let mut password: Option<Vec<u8>> = None;
    let mut file: Option<Bytes> = None;
    let mut filename: Option<String> = None;
    let mut wanted_minutes: i64 = 10;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RelayError::MalformedRequest(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "password" => {
                password = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| RelayError::MalformedRequest(e.to_string()))?
                        .to_vec(),
                )
            }
            "file" => {
                filename = field.file_name().map(sanitize_filename);
                file = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| RelayError::MalformedRequest(e.to_string()))?,
                )
            }
            "wanted_minutes" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| RelayError::MalformedRequest(e.to_string()))?;
                wanted_minutes = text
                    .parse()
                    .map_err(|_| RelayError::MalformedRequest("wanted_minutes must be an integer".into()))?;
            }
            _ => {}
        }
    }

    let password = password.ok_or_else(|| RelayError::MalformedRequest("missing password field".into()))?;
    let file = file.ok_or_else(|| RelayError::MalformedRequest("missing file field".into()))?;

    if file.len() as i64 > ticket.declared_size {
        return Err(RelayError::SizeLied.into());
    }

    let filename = filename.unwrap_or_else(|| "body".to_string());
    let object_name = format!("{}/{}", ticket.transfer_id, filename);
    state.blobs.put(&object_name, file.to_vec()).await?;

    transfer::upload_body(
        &*state.transfers,
        state.hub.as_ref(),
        &ticket,
        object_name,
        file.len() as i64,
        password,
        wanted_minutes,
    )
    .await?;

    Ok((jar, ()))
}

#[derive(Deserialize)]
pub struct ObjectRequest {
    pub object_name: String,
}

pub async fn download_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ObjectRequest>,
) -> ApiResult<impl IntoResponse> {
    let (identity, identity_key) = caller_from_headers(&headers)?;
    if !relay_core::identity::validate(&*state.users, &identity, &identity_key).await? {
        return Err(RelayError::IdentityKeyMismatch.into());
    }

    transfer::authorize_download(&*state.transfers, &identity, &body.object_name).await?;
    let bytes = state.blobs.get(&body.object_name).await?;

    Ok(([("content-type", "application/octet-stream")], bytes))
}

#[derive(Serialize)]
pub struct CompletedDownloadResponse {
    pub password: String,
}

pub async fn completed_download_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ObjectRequest>,
) -> ApiResult<Json<CompletedDownloadResponse>> {
    let (identity, identity_key) = caller_from_headers(&headers)?;
    if !relay_core::identity::validate(&*state.users, &identity, &identity_key).await? {
        return Err(RelayError::IdentityKeyMismatch.into());
    }

    let password = transfer::completed_download(
        &*state.users,
        &*state.credits,
        &*state.transfers,
        state.hub.as_ref(),
        &identity,
        &body.object_name,
    )
    .await?;

    state.blobs.delete(&body.object_name).await?;

    Ok(Json(CompletedDownloadResponse {
        password: STANDARD.encode(password),
    }))
}
