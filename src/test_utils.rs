//! Test helpers: skeleton frame builders and an in-memory publisher transport.
//!
//! The in-memory transport records everything sent through it and lets tests
//! inject connect failures, send failures, slow connects and server-side
//! closure.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::publisher::{Connector, PayloadSink};
use crate::types::{
    JOINT_COUNT, Joint, JointCoord, JointId, JointPayload, SkeletonCandidate, SkeletonFrame,
    TrackingState,
};
use crate::{RelayError, Result};

/// Tracked skeleton with every joint resolved at a distinct position.
pub fn tracked_candidate() -> SkeletonCandidate {
    let joints = (0..JOINT_COUNT)
        .map(|i| {
            let offset = (i as f32 + 1.0) * 0.01;
            Joint::new(offset, 0.5 - offset, 2.0)
        })
        .collect();
    SkeletonCandidate { tracking_state: TrackingState::Tracked, tracking_id: 7, joints }
}

/// Frame with one tracked skeleton and one empty slot.
pub fn tracked_frame(frame_number: u32) -> SkeletonFrame {
    SkeletonFrame::new(
        frame_number,
        vec![
            tracked_candidate(),
            SkeletonCandidate::new(TrackingState::NotTracked, vec![Joint::default(); JOINT_COUNT]),
        ],
    )
}

/// Frame in which nobody is tracked.
pub fn empty_frame(frame_number: u32) -> SkeletonFrame {
    SkeletonFrame::new(
        frame_number,
        vec![SkeletonCandidate::new(TrackingState::NotTracked, vec![Joint::default(); JOINT_COUNT])],
    )
}

pub fn sample_payload() -> JointPayload {
    [(JointId::SHOULDER_CENTER, JointCoord::new(384, 144))].into_iter().collect()
}

#[derive(Debug, Default)]
struct TransportState {
    sent: Vec<String>,
    connect_attempts: usize,
    closes: usize,
    fail_connects: bool,
    fail_sends: bool,
    stall_sends: bool,
    connect_delay: Duration,
    current: Option<Arc<AtomicBool>>,
}

/// Test-side controls of a [`MockConnector`].
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.lock().connect_attempts
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    pub fn fail_connects(&self, fail: bool) {
        self.state.lock().fail_connects = fail;
    }

    pub fn fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    /// Sends never complete, like a relay that stopped reading.
    pub fn stall_sends(&self, stall: bool) {
        self.state.lock().stall_sends = stall;
    }

    pub fn connect_delay(&self, delay: Duration) {
        self.state.lock().connect_delay = delay;
    }

    /// Simulate the server closing the current session.
    pub fn terminate_current(&self) {
        if let Some(flag) = &self.state.lock().current {
            flag.store(true, Ordering::Release);
        }
    }
}

/// In-memory [`Connector`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    transport: MockTransport,
}

impl MockConnector {
    pub fn new() -> (Self, MockTransport) {
        let transport = MockTransport::default();
        (Self { transport: transport.clone() }, transport)
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    type Sink = MockSink;

    async fn connect(&self) -> Result<MockSink> {
        let delay = {
            let mut state = self.transport.state.lock();
            state.connect_attempts += 1;
            state.connect_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.transport.state.lock();
        if state.fail_connects {
            return Err(RelayError::connection_failed("mock://relay", "connection refused"));
        }
        let terminated = Arc::new(AtomicBool::new(false));
        state.current = Some(Arc::clone(&terminated));
        Ok(MockSink { transport: self.transport.clone(), terminated, closed: false })
    }

    fn endpoint(&self) -> &str {
        "mock://relay"
    }
}

pub struct MockSink {
    transport: MockTransport,
    terminated: Arc<AtomicBool>,
    closed: bool,
}

#[async_trait::async_trait]
impl PayloadSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.is_terminated() {
            return Err(RelayError::send_failed("connection terminated", None));
        }
        if self.transport.state.lock().stall_sends {
            std::future::pending::<()>().await;
        }
        let mut state = self.transport.state.lock();
        if state.fail_sends {
            return Err(RelayError::send_failed("injected send failure", None));
        }
        state.sent.push(text);
        Ok(())
    }

    fn is_terminated(&self) -> bool {
        self.closed || self.terminated.load(Ordering::Acquire)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.terminated.store(true, Ordering::Release);
        self.transport.state.lock().closes += 1;
    }
}
