use std::time::Duration;

use bubblecam_frame::{HeartbeatMessage, Package};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Periodic keep-alive for an open stream.
///
/// The first tick fires one full period after creation. Must be created
/// inside a tokio runtime.
#[derive(Debug)]
pub struct HeartbeatScheduler {
    interval: Interval,
    sent: u64,
}

impl HeartbeatScheduler {
    pub fn new(period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, sent: 0 }
    }

    /// Wait for the next heartbeat slot. Cancel-safe.
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }

    /// Write one heartbeat to `writer`.
    pub async fn send<W>(&mut self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let wire = HeartbeatMessage::new()
            .to_bytes()
            .map_err(std::io::Error::other)?;
        writer.write_all(&wire).await?;
        writer.flush().await?;
        self.sent += 1;
        debug!(sent = self.sent, "heartbeat sent");
        Ok(())
    }

    /// Heartbeats written so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Configured period.
    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}
