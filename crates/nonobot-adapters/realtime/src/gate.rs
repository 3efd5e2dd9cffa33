//! Startup frame gate.
//!
//! Frames that arrive before the bot pipeline is ready are held in a bounded
//! FIFO. Opening the gate hands back the held frames, in arrival order, and
//! from then on frames pass straight through.

use std::collections::VecDeque;

/// What happened to an admitted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The gate is open; handle the frame now.
    Pass,
    /// The frame was queued.
    Held,
    /// The queue is full; the frame was dropped.
    Overflow,
    /// The connection is gone; the frame was dropped.
    Closed,
}

#[derive(Debug)]
enum GateState {
    Buffering(VecDeque<String>),
    Open,
    Closed,
}

/// Two-state gate in front of the frame handler.
#[derive(Debug)]
pub struct FrameGate {
    state: GateState,
    capacity: usize,
}

impl FrameGate {
    /// Creates a buffering gate holding at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: GateState::Buffering(VecDeque::new()),
            capacity,
        }
    }

    /// Offers a frame to the gate.
    pub fn admit(&mut self, frame: &str) -> Admission {
        match &mut self.state {
            GateState::Open => Admission::Pass,
            GateState::Closed => Admission::Closed,
            GateState::Buffering(frames) if frames.len() >= self.capacity => Admission::Overflow,
            GateState::Buffering(frames) => {
                frames.push_back(frame.to_string());
                Admission::Held
            }
        }
    }

    /// Opens the gate, returning the held frames in arrival order.
    ///
    /// Returns `None` if the gate was closed in the meantime.
    pub fn open(&mut self) -> Option<VecDeque<String>> {
        match std::mem::replace(&mut self.state, GateState::Open) {
            GateState::Buffering(frames) => Some(frames),
            GateState::Open => Some(VecDeque::new()),
            GateState::Closed => {
                self.state = GateState::Closed;
                None
            }
        }
    }

    /// Closes the gate, dropping any held frames.
    pub fn close(&mut self) {
        self.state = GateState::Closed;
    }

    /// Number of held frames.
    pub fn pending(&self) -> usize {
        match &self.state {
            GateState::Buffering(frames) => frames.len(),
            _ => 0,
        }
    }

    /// Whether frames pass straight through.
    pub fn is_open(&self) -> bool {
        matches!(self.state, GateState::Open)
    }
}
