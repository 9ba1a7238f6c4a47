//! Selective-repeat window bookkeeping.
//!
//! [`SelectiveRepeatWindow`] owns the outbound DATA frames of one transfer and
//! tracks, per frame, whether it is sent, acknowledged, when its
//! retransmission deadline falls and how often it went out. It performs no
//! I/O and reads no clock: the caller passes `now` explicitly, which keeps
//! every transition deterministic.
//!
//! ```text
//!        head                head + window_size
//!         │                          │
//!  ───────┼──────────────────────────┼──────────▶ index
//!  acked  │ in flight / sendable     │ not yet eligible
//! ```
//!
//! `head` only moves past acknowledged frames, so an ACK for a later frame is
//! recorded but never slides the window over an unacknowledged predecessor.

use std::time::{Duration, Instant};

use super::error::{TransportError, TransportResult};
use super::frame::Frame;
use crate::core::constants::FIRST_DATA_SEQUENCE;

/// What an inbound ACK did to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// First ACK for this frame; `slid` is how far `head` moved.
    Accepted {
        /// Frames the window advanced by.
        slid: usize,
    },
    /// The frame was already acknowledged.
    Duplicate,
    /// The sequence number maps outside this transfer.
    OutOfRange,
}

/// Sliding window over the DATA frames of one transfer.
#[derive(Debug, Clone)]
pub struct SelectiveRepeatWindow {
    frames: Vec<Frame>,
    acked: Vec<bool>,
    sent: Vec<bool>,
    deadlines: Vec<Option<Instant>>,
    transmissions: Vec<u32>,
    head: usize,
    window_size: usize,
}

impl SelectiveRepeatWindow {
    /// Create a window over `frames`, numbered from 1 in order.
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero.
    pub fn new(frames: Vec<Frame>, window_size: usize) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        let len = frames.len();
        Self {
            frames,
            acked: vec![false; len],
            sent: vec![false; len],
            deadlines: vec![None; len],
            transmissions: vec![0; len],
            head: 0,
            window_size,
        }
    }

    /// Number of frames in the transfer.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// `true` for a transfer with no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Index of the leftmost unacknowledged frame (or `len()` when done).
    pub fn head(&self) -> usize {
        self.head
    }

    /// Configured window size.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// `true` once every frame is acknowledged.
    pub fn is_complete(&self) -> bool {
        self.head == self.frames.len()
    }

    /// Frame at `index`.
    pub fn frame(&self, index: usize) -> &Frame {
        &self.frames[index]
    }

    /// `true` if frame `index` is acknowledged.
    pub fn is_acked(&self, index: usize) -> bool {
        self.acked[index]
    }

    /// `true` if frame `index` is sent and its timer has not yet fired.
    pub fn is_sent(&self, index: usize) -> bool {
        self.sent[index]
    }

    /// Times frame `index` has been transmitted.
    pub fn transmissions(&self, index: usize) -> u32 {
        self.transmissions[index]
    }

    /// Total transmissions across all frames.
    pub fn total_transmissions(&self) -> u32 {
        self.transmissions.iter().sum()
    }

    /// Frames sent but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.sent
            .iter()
            .zip(&self.acked)
            .filter(|(sent, acked)| **sent && !**acked)
            .count()
    }

    /// Indices inside the window that are neither sent nor acknowledged.
    pub fn pending_sends(&self) -> Vec<usize> {
        let end = (self.head + self.window_size).min(self.frames.len());
        (self.head..end)
            .filter(|&index| !self.sent[index] && !self.acked[index])
            .collect()
    }

    /// Record that frame `index` went out at `now` and arm its timer.
    pub fn mark_sent(&mut self, index: usize, now: Instant, timeout: Duration) {
        self.sent[index] = true;
        self.deadlines[index] = Some(now + timeout);
        self.transmissions[index] += 1;
    }

    /// Apply an inbound ACK for `sequence_number`.
    pub fn on_ack(&mut self, sequence_number: u32) -> AckOutcome {
        let Some(index) = self.index_of(sequence_number) else {
            return AckOutcome::OutOfRange;
        };
        if self.acked[index] {
            return AckOutcome::Duplicate;
        }

        self.acked[index] = true;
        self.deadlines[index] = None;

        let before = self.head;
        while self.head < self.frames.len() && self.acked[self.head] {
            self.head += 1;
        }
        AckOutcome::Accepted {
            slid: self.head - before,
        }
    }

    /// Fire every timer whose deadline is at or before `now`.
    ///
    /// An expired frame is cleared from `sent` so the next send phase
    /// retransmits it. Returns the indices that expired, or
    /// [`TransportError::WindowTimeout`] once a frame has already used up
    /// `max_retransmits` retransmissions.
    pub fn expire(&mut self, now: Instant, max_retransmits: u32) -> TransportResult<Vec<usize>> {
        let mut expired = Vec::new();
        for index in self.head..self.frames.len() {
            let Some(deadline) = self.deadlines[index] else {
                continue;
            };
            if deadline > now || self.acked[index] {
                continue;
            }
            if self.transmissions[index] > max_retransmits {
                return Err(TransportError::WindowTimeout {
                    sequence_number: self.frames[index].sequence_number,
                    attempts: self.transmissions[index],
                });
            }
            self.sent[index] = false;
            self.deadlines[index] = None;
            expired.push(index);
        }
        Ok(expired)
    }

    /// Earliest armed retransmission deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines[self.head..].iter().flatten().min().copied()
    }

    fn index_of(&self, sequence_number: u32) -> Option<usize> {
        let index = sequence_number.checked_sub(FIRST_DATA_SEQUENCE)? as usize;
        (index < self.frames.len()).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::frame::{FrameType, segment};

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn window(frames: usize, window_size: usize) -> SelectiveRepeatWindow {
        let payload = vec![7u8; frames * 4];
        let peer = "127.0.0.1:8080".parse().unwrap();
        SelectiveRepeatWindow::new(segment(&payload, FrameType::Data, peer, 4), window_size)
    }

    /// One send phase: transmit everything eligible at `now`.
    fn send_phase(window: &mut SelectiveRepeatWindow, now: Instant) -> Vec<usize> {
        let due = window.pending_sends();
        for &index in &due {
            window.mark_sent(index, now, TIMEOUT);
        }
        due
    }

    fn first_unacked(window: &SelectiveRepeatWindow) -> usize {
        (0..window.len())
            .find(|&i| !window.is_acked(i))
            .unwrap_or(window.len())
    }

    #[test]
    fn test_initial_send_respects_window() {
        let mut w = window(5, 2);
        let now = Instant::now();
        assert_eq!(send_phase(&mut w, now), vec![0, 1]);
        assert_eq!(w.in_flight(), 2);
        assert!(w.pending_sends().is_empty());
    }

    #[test]
    fn test_in_order_acks_slide() {
        let mut w = window(3, 2);
        let now = Instant::now();
        send_phase(&mut w, now);

        assert_eq!(w.on_ack(1), AckOutcome::Accepted { slid: 1 });
        assert_eq!(w.head(), 1);
        assert_eq!(send_phase(&mut w, now), vec![2]);

        assert_eq!(w.on_ack(2), AckOutcome::Accepted { slid: 1 });
        assert_eq!(w.on_ack(3), AckOutcome::Accepted { slid: 1 });
        assert!(w.is_complete());
        assert_eq!(w.next_deadline(), None);
    }

    #[test]
    fn test_out_of_order_ack_does_not_slide_past_gap() {
        let mut w = window(4, 3);
        send_phase(&mut w, Instant::now());

        assert_eq!(w.on_ack(2), AckOutcome::Accepted { slid: 0 });
        assert_eq!(w.on_ack(3), AckOutcome::Accepted { slid: 0 });
        assert_eq!(w.head(), 0);
        assert!(w.pending_sends().is_empty());

        assert_eq!(w.on_ack(1), AckOutcome::Accepted { slid: 3 });
        assert_eq!(w.head(), 3);
        assert_eq!(w.pending_sends(), vec![3]);
    }

    #[test]
    fn test_duplicate_and_out_of_range_acks() {
        let mut w = window(2, 2);
        send_phase(&mut w, Instant::now());

        assert_eq!(w.on_ack(1), AckOutcome::Accepted { slid: 1 });
        assert_eq!(w.on_ack(1), AckOutcome::Duplicate);
        assert_eq!(w.on_ack(0), AckOutcome::OutOfRange);
        assert_eq!(w.on_ack(3), AckOutcome::OutOfRange);
        assert_eq!(w.on_ack(u32::MAX), AckOutcome::OutOfRange);
        assert_eq!(w.head(), 1);
    }

    #[test]
    fn test_head_tracks_first_unacked_for_any_ack_sequence() {
        let sequences: [&[u32]; 4] = [
            &[3, 3, 1, 9, 2, 0, 5, 4, 4, 6],
            &[6, 5, 4, 3, 2, 1],
            &[1, 1, 1, 2, 2, 3, 7, 4, 5, 6],
            &[2, 4, 6, 0, 100, 1, 3, 5],
        ];
        for acks in sequences {
            let mut w = window(6, 6);
            send_phase(&mut w, Instant::now());
            let mut previous = w.head();
            for &seq in acks {
                w.on_ack(seq);
                assert!(w.head() >= previous, "head moved backwards");
                assert_eq!(w.head(), first_unacked(&w));
                previous = w.head();
            }
            assert!(w.is_complete());
        }
    }

    #[test]
    fn test_expired_frame_is_resent() {
        let mut w = window(2, 2);
        let start = Instant::now();
        send_phase(&mut w, start);

        assert!(w.expire(start + TIMEOUT / 2, 3).unwrap().is_empty());
        assert_eq!(w.expire(start + TIMEOUT, 3).unwrap(), vec![0, 1]);
        assert!(!w.is_sent(0));
        assert_eq!(send_phase(&mut w, start + TIMEOUT), vec![0, 1]);
        assert_eq!(w.transmissions(0), 2);
    }

    #[test]
    fn test_retransmission_scenario() {
        // Three frames, window of two. The ACK for frame 0 arrives only after
        // its timer has fired twice; frame 1 is acknowledged early.
        let mut w = window(3, 2);
        let t0 = Instant::now();

        assert_eq!(send_phase(&mut w, t0), vec![0, 1]);
        assert_eq!(w.on_ack(2), AckOutcome::Accepted { slid: 0 });

        let t1 = t0 + TIMEOUT;
        assert_eq!(w.expire(t1, 10).unwrap(), vec![0]);
        assert_eq!(send_phase(&mut w, t1), vec![0]);

        let t2 = t1 + TIMEOUT;
        assert_eq!(w.expire(t2, 10).unwrap(), vec![0]);
        assert_eq!(send_phase(&mut w, t2), vec![0]);

        assert_eq!(w.transmissions(2), 0, "frame 2 sent before head passed 0");
        assert_eq!(w.on_ack(1), AckOutcome::Accepted { slid: 2 });
        assert_eq!(w.transmissions(0), 3);

        assert_eq!(send_phase(&mut w, t2), vec![2]);
        assert_eq!(w.on_ack(3), AckOutcome::Accepted { slid: 1 });
        assert!(w.is_complete());
        assert_eq!(w.total_transmissions(), 5);
    }

    #[test]
    fn test_window_timeout_after_budget() {
        let mut w = window(1, 1);
        let mut now = Instant::now();
        send_phase(&mut w, now);

        for _ in 0..2 {
            now += TIMEOUT;
            assert_eq!(w.expire(now, 2).unwrap(), vec![0]);
            send_phase(&mut w, now);
        }

        now += TIMEOUT;
        let err = w.expire(now, 2).unwrap_err();
        assert!(matches!(
            err,
            TransportError::WindowTimeout {
                sequence_number: 1,
                attempts: 3
            }
        ));
    }

    #[test]
    fn test_next_deadline_is_earliest() {
        let mut w = window(3, 3);
        let start = Instant::now();
        w.mark_sent(1, start, TIMEOUT);
        w.mark_sent(0, start + Duration::from_secs(1), TIMEOUT);
        assert_eq!(w.next_deadline(), Some(start + TIMEOUT));

        w.on_ack(2);
        assert_eq!(w.next_deadline(), Some(start + Duration::from_secs(1) + TIMEOUT));
    }

    #[test]
    fn test_empty_window_is_complete() {
        let w = SelectiveRepeatWindow::new(Vec::new(), 4);
        assert!(w.is_complete());
        assert!(w.pending_sends().is_empty());
    }
}
