//! Deterministic fault injection.
//!
//! [`LossyEndpoint`] wraps any [`FrameIo`] and silently drops the frames a
//! [`FaultPlan`] names, in either direction. Rules are matched by frame type
//! and optionally by sequence number, and each rule fires a fixed number of
//! times, so a test can say "lose the first DATA 1 once" and assert the exact
//! retransmission count that follows.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::error::TransportResult;
use super::frame::{Frame, FrameType};
use super::io::FrameIo;

/// Drop matching frames a bounded number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropRule {
    frame_type: FrameType,
    sequence_number: Option<u32>,
    remaining: u32,
}

impl DropRule {
    /// Drop the next frame of `frame_type`, whatever its sequence number.
    pub fn once(frame_type: FrameType) -> Self {
        Self::times(frame_type, 1)
    }

    /// Drop the next `count` frames of `frame_type`.
    pub fn times(frame_type: FrameType, count: u32) -> Self {
        Self {
            frame_type,
            sequence_number: None,
            remaining: count,
        }
    }

    /// Only match frames carrying `sequence_number`.
    pub fn with_sequence(mut self, sequence_number: u32) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    /// Drops left before the rule is spent.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    fn take(&mut self, frame: &Frame) -> bool {
        let matches = self.remaining > 0
            && self.frame_type == frame.frame_type
            && self.sequence_number.is_none_or(|seq| seq == frame.sequence_number);
        if matches {
            self.remaining -= 1;
        }
        matches
    }
}

/// Drop rules for both directions.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    inbound: Vec<DropRule>,
    outbound: Vec<DropRule>,
}

impl FaultPlan {
    /// A plan that drops nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop received frames matching `rule`.
    pub fn drop_inbound(mut self, rule: DropRule) -> Self {
        self.inbound.push(rule);
        self
    }

    /// Drop sent frames matching `rule`.
    pub fn drop_outbound(mut self, rule: DropRule) -> Self {
        self.outbound.push(rule);
        self
    }

    fn consume(rules: &mut [DropRule], frame: &Frame) -> bool {
        rules.iter_mut().any(|rule| rule.take(frame))
    }
}

/// A [`FrameIo`] that loses frames according to a [`FaultPlan`].
#[derive(Debug)]
pub struct LossyEndpoint<E> {
    inner: E,
    plan: Mutex<FaultPlan>,
    dropped: Mutex<u32>,
}

impl<E: FrameIo> LossyEndpoint<E> {
    /// Wrap `inner` with `plan`.
    pub fn new(inner: E, plan: FaultPlan) -> Self {
        Self {
            inner,
            plan: Mutex::new(plan),
            dropped: Mutex::new(0),
        }
    }

    /// Frames dropped so far, both directions.
    pub fn dropped(&self) -> u32 {
        *self.dropped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The wrapped endpoint.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Unwrap the endpoint.
    pub fn into_inner(self) -> E {
        self.inner
    }

    fn should_drop(&self, frame: &Frame, outbound: bool) -> bool {
        let mut plan = self.plan.lock().unwrap_or_else(PoisonError::into_inner);
        let rules = if outbound {
            &mut plan.outbound
        } else {
            &mut plan.inbound
        };
        let drop = FaultPlan::consume(rules, frame);
        if drop {
            *self.dropped.lock().unwrap_or_else(PoisonError::into_inner) += 1;
            debug!(
                frame_type = %frame.frame_type,
                seq = frame.sequence_number,
                direction = if outbound { "out" } else { "in" },
                "simulated loss"
            );
        }
        drop
    }
}

impl<E: FrameIo> FrameIo for LossyEndpoint<E> {
    async fn send(&self, frame: &Frame) -> TransportResult<()> {
        if self.should_drop(frame, true) {
            return Ok(());
        }
        self.inner.send(frame).await
    }

    async fn receive(&mut self) -> TransportResult<Frame> {
        loop {
            let frame = self.inner.receive().await?;
            if !self.should_drop(&frame, false) {
                return Ok(frame);
            }
        }
    }
}
