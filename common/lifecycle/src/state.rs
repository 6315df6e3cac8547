use std::fmt;

use crate::error::LifecycleError;

/// Lifecycle of a service instance. Transitions only ever move forward:
///
/// ```text
/// Starting -> Ready -> Draining -> Stopped
///     \________________________________^
/// ```
///
/// The shortcut from `Starting` to `Stopped` is taken when a termination
/// request arrives before the instance ever admitted traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    Starting = 0,
    Ready = 1,
    Draining = 2,
    Stopped = 3,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Ready => "ready",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        }
    }
}

impl From<LifecycleState> for u8 {
    fn from(state: LifecycleState) -> u8 {
        state as u8
    }
}

impl TryFrom<u8> for LifecycleState {
    type Error = LifecycleError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(LifecycleState::Starting),
            1 => Ok(LifecycleState::Ready),
            2 => Ok(LifecycleState::Draining),
            3 => Ok(LifecycleState::Stopped),
            other => Err(LifecycleError::CorruptState(other)),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
