use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{
    sync::{mpsc::UnboundedReceiver, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};

use super::Indicator;
use crate::board::LedMatrix;

/// Repaints the matrix every `period` until `shutdown` flips or its sender is dropped.
pub fn spawn_render_loop<M: LedMatrix + Send + 'static>(
    indicator: Arc<Indicator<M>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    let indicator = indicator.clone();
                    let rendered =
                        tokio::task::spawn_blocking(move || indicator.render(Instant::now())).await;

                    if let Err(err) = rendered {
                        tracing::error!("Render tick failed: {err}");
                    }
                }
            }
        }

        tracing::debug!("Render loop stopped");
    })
}

/// Applies inbound payloads one at a time, in arrival order.
pub fn spawn_event_loop<M: LedMatrix + Send + 'static>(
    indicator: Arc<Indicator<M>>,
    mut payloads: UnboundedReceiver<Vec<u8>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(payload) = payloads.recv().await {
            let indicator = indicator.clone();
            let handled =
                tokio::task::spawn_blocking(move || indicator.handle_payload(&payload, Instant::now()))
                    .await;

            if let Err(err) = handled {
                tracing::error!("Event handler failed: {err}");
            }
        }

        tracing::debug!("Event loop stopped");
    })
}
