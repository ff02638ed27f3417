//! Background sweep for expired transfers. Spawned once at startup; runs
//! until the process exits. A bad row never aborts the sweep — it's logged
//! and the reaper moves on to the next one.

use crate::state::AppState;
use chrono::Utc;
use relay_core::notify::Notifier;
use relay_core::types::PushMessage;
use std::time::Duration;

pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    let tick = Duration::from_secs(state.config.reaper.tick_seconds.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            sweep_once(&state).await;
        }
    })
}

async fn sweep_once(state: &AppState) {
    let expired = match state.transfers.sweep_expired(Utc::now()).await {
        Ok(rows) => rows,
        Err(err) => {
            tracing::error!(error = %err, "reaper sweep query failed");
            return;
        }
    };

    for transfer in expired {
        if let Err(err) = reap_one(state, &transfer).await {
            tracing::error!(
                error = %err,
                transfer_id = %transfer.id,
                "reaper failed on one row, continuing sweep"
            );
        }
    }
}

async fn reap_one(state: &AppState, transfer: &relay_core::types::Transfer) -> relay_core::Result<()> {
    if state.transfers.finish(transfer.id, true).await?.is_none() {
        return Ok(());
    }

    if let Some(object_name) = &transfer.object_name {
        state.blobs.delete(object_name).await?;
    }

    state
        .hub
        .send(
            &transfer.sender,
            PushMessage::Notice {
                title: "Expired Transfer".into(),
                body: "Your transfer expired before it was picked up.".into(),
            },
        )
        .await?;

    Ok(())
}
