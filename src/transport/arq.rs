//! Selective-repeat ARQ engine.
//!
//! [`ArqEngine::transfer`] drives a [`SelectiveRepeatWindow`] to completion
//! over any [`FrameIo`]. Timers are deadlines polled from the same loop that
//! receives ACKs: each iteration fires expired timers, sends whatever the
//! window allows, then waits for one frame no longer than the earliest
//! deadline. The window lives inside the call and is dropped with it, so no
//! timer can outlive its transfer.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::error::TransportResult;
use super::frame::{Frame, FrameType};
use super::io::FrameIo;
use super::window::{AckOutcome, SelectiveRepeatWindow};
use crate::core::SessionConfig;

/// Counters from one completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferReport {
    /// DATA frames delivered.
    pub frames: usize,
    /// Transmissions made, retransmissions included.
    pub transmissions: u32,
    /// Transmissions beyond the first per frame.
    pub retransmissions: u32,
}

/// Reliable delivery of an ordered sequence of DATA frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArqEngine {
    window_size: usize,
    retransmit_timeout: Duration,
    max_retransmits: u32,
}

impl ArqEngine {
    /// Create an engine with explicit parameters.
    pub fn new(window_size: usize, retransmit_timeout: Duration, max_retransmits: u32) -> Self {
        Self {
            window_size,
            retransmit_timeout,
            max_retransmits,
        }
    }

    /// Create an engine from a session configuration.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.window_size,
            config.retransmit_timeout,
            config.max_retransmits,
        )
    }

    /// Deliver `frames` and return once every one is acknowledged.
    ///
    /// Loss, duplication and reordering are absorbed here. The only transfer
    /// failures are a frame exhausting its retransmission budget and socket
    /// errors.
    #[tracing::instrument(skip_all, fields(frames = frames.len(), window = self.window_size))]
    pub async fn transfer<E: FrameIo>(&self, io: &mut E, frames: Vec<Frame>) -> TransportResult<TransferReport> {
        let mut window = SelectiveRepeatWindow::new(frames, self.window_size);

        while !window.is_complete() {
            for index in window.expire(now(), self.max_retransmits)? {
                warn!(
                    seq = window.frame(index).sequence_number,
                    transmissions = window.transmissions(index),
                    "retransmission timer fired"
                );
            }

            for index in window.pending_sends() {
                io.send(window.frame(index)).await?;
                window.mark_sent(index, now(), self.retransmit_timeout);
                debug!(
                    seq = window.frame(index).sequence_number,
                    transmission = window.transmissions(index),
                    "sent data"
                );
            }

            let deadline = window
                .next_deadline()
                .unwrap_or_else(|| now() + self.retransmit_timeout);

            let frame = match tokio::time::timeout_at(deadline.into(), io.receive()).await {
                Err(_) => continue,
                Ok(Ok(frame)) => frame,
                Ok(Err(err)) if err.is_recoverable_loss() => {
                    warn!(error = %err, "discarding malformed frame during transfer");
                    continue;
                }
                Ok(Err(err)) => return Err(err),
            };

            match frame.frame_type {
                FrameType::Ack => match window.on_ack(frame.sequence_number) {
                    AckOutcome::Accepted { slid } => {
                        debug!(seq = frame.sequence_number, slid, head = window.head(), "ack");
                    }
                    AckOutcome::Duplicate => {
                        debug!(seq = frame.sequence_number, "duplicate ack");
                    }
                    AckOutcome::OutOfRange => {
                        debug!(seq = frame.sequence_number, "ignoring ack outside transfer");
                    }
                },
                FrameType::Nak => {
                    warn!(peer = %frame.peer, "peer rejected a frame; waiting for its timer");
                }
                other => {
                    debug!(frame_type = %other, seq = frame.sequence_number, "ignoring frame during transfer");
                }
            }
        }

        let transmissions = window.total_transmissions();
        let report = TransferReport {
            frames: window.len(),
            transmissions,
            retransmissions: transmissions.saturating_sub(window.len() as u32),
        };
        info!(
            frames = report.frames,
            retransmissions = report.retransmissions,
            "transfer complete"
        );
        Ok(report)
    }
}

/// Current time on the runtime clock, so paused test runtimes drive the timers.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
