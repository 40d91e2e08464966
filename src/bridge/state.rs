// Motion state shared by the command handler and the motor refresh loop

use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::command::Command;

/// Commanded wheel percentages and the current speed scale
///
/// Copied out as a whole so the refresh loop never sees half an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionState {
    pub left: i32,
    pub right: i32,
    pub speed: i32,
}

impl MotionState {
    pub fn new(speed: i32) -> Self {
        Self {
            left: 0,
            right: 0,
            speed: speed.clamp(0, 100),
        }
    }

    /// Apply a motion command, servo commands leave the state untouched
    pub fn apply(&mut self, cmd: Command) {
        let s = self.speed;
        match cmd {
            Command::SetSpeed(speed) => self.speed = speed.clamp(0, 100),
            Command::Forward => self.set_wheels(s, s),
            Command::Backward => self.set_wheels(-s, -s),
            Command::Left => self.set_wheels(-s, s),
            Command::Right => self.set_wheels(s, -s),
            Command::Stop => self.set_wheels(0, 0),
            Command::Servo { .. } => {}
        }
    }

    fn set_wheels(&mut self, left: i32, right: i32) {
        self.left = left;
        self.right = right;
    }
}

/// Lock-protected motion state
#[derive(Debug)]
pub struct SharedMotion(Mutex<MotionState>);

impl SharedMotion {
    pub fn new(initial: MotionState) -> Self {
        Self(Mutex::new(initial))
    }

    pub fn snapshot(&self) -> MotionState {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a command and return the resulting state
    pub fn apply(&self, cmd: Command) -> MotionState {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        state.apply(cmd);
        debug!(
            "Motion state: left={}, right={}, speed={}",
            state.left, state.right, state.speed
        );
        *state
    }

    /// Zero both wheels, keeping the speed scale
    pub fn halt(&self) {
        self.apply(Command::Stop);
    }
}
