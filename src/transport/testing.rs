//! In-memory peer for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::error::{TransportError, TransportResult};
use super::frame::{Frame, FrameError};
use super::io::FrameIo;

type Responder = Box<dyn FnMut(&Frame) -> Vec<Frame> + Send>;

/// A [`FrameIo`] whose inbound frames are scripted up front or produced by a
/// responder closure reacting to each sent frame. When nothing is queued,
/// `receive` waits forever so caller timeouts fire.
pub(crate) struct ScriptedPeer {
    inbound: Mutex<VecDeque<TransportResult<Frame>>>,
    sent: Mutex<Vec<Frame>>,
    responder: Mutex<Option<Responder>>,
}

impl ScriptedPeer {
    pub(crate) fn new() -> Self {
        Self {
            inbound: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            responder: Mutex::new(None),
        }
    }

    pub(crate) fn responding(responder: impl FnMut(&Frame) -> Vec<Frame> + Send + 'static) -> Self {
        let peer = Self::new();
        *peer.responder.lock().unwrap() = Some(Box::new(responder));
        peer
    }

    pub(crate) fn push(&self, frame: Frame) {
        self.inbound.lock().unwrap().push_back(Ok(frame));
    }

    pub(crate) fn push_malformed(&self) {
        self.inbound
            .lock()
            .unwrap()
            .push_back(Err(TransportError::MalformedFrame(FrameError::InvalidType(0xEE))));
    }

    pub(crate) fn sent(&self) -> Vec<Frame> {
        self.sent.lock().unwrap().clone()
    }
}

impl FrameIo for ScriptedPeer {
    async fn send(&self, frame: &Frame) -> TransportResult<()> {
        self.sent.lock().unwrap().push(frame.clone());
        let replies = match self.responder.lock().unwrap().as_mut() {
            Some(responder) => responder(frame),
            None => Vec::new(),
        };
        self.inbound
            .lock()
            .unwrap()
            .extend(replies.into_iter().map(Ok));
        Ok(())
    }

    async fn receive(&mut self) -> TransportResult<Frame> {
        let next = self.inbound.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}
