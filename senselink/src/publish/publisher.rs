use core::future::Future;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};
use senselink_common::{SensorTopics, format_timestamp};
use tokio::time::MissedTickBehavior;

use super::{Emission, PublishEngine, SensorSnapshot};
use crate::{Transport, board::SensorBoard};

/// Polls the board, runs the engine and hands readings to the transport.
pub struct Publisher<B, T> {
    board: B,
    transport: T,
    engine: PublishEngine,
    topics: SensorTopics,
}

impl<B: SensorBoard, T: Transport> Publisher<B, T> {
    pub fn new(board: B, transport: T, engine: PublishEngine, topics: SensorTopics) -> Self {
        Self { board, transport, engine, topics }
    }

    pub fn engine(&self) -> &PublishEngine {
        &self.engine
    }

    /// One poll. Returns how many readings the transport accepted.
    pub async fn tick(&mut self, now: Instant, wall_clock: NaiveDateTime) -> usize {
        let snapshot = SensorSnapshot::read(&mut self.board);
        let time_stamp = format_timestamp(&wall_clock);

        let mut sent = 0;

        for Emission { kind, reading } in self.engine.tick(now, &time_stamp, &snapshot) {
            let topic = self.topics.topic(kind);

            // no retry; the engine already counts this reading as sent
            match self.transport.send(&topic, &reading).await {
                Ok(()) => {
                    tracing::info!(%topic, value = ?reading.value, "Published {}", reading.sensor);
                    sent += 1;
                }
                Err(err) => {
                    tracing::warn!(%topic, "Failed to publish {}: {err}", reading.sensor);
                }
            }
        }

        sent
    }

    /// Polls every `period` until `shutdown` resolves, then hands back its output.
    pub async fn run<S>(&mut self, period: Duration, shutdown: impl Future<Output = S>) -> S {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                reason = &mut shutdown => {
                    tracing::info!("Stopping sensor publisher");
                    break reason;
                }
                at = interval.tick() => {
                    self.tick(at.into_std(), Local::now().naive_local()).await;
                }
            }
        }
    }
}
