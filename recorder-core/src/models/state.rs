use std::fmt;

/// Lifecycle of a [`Recorder`](crate::Recorder).
///
/// ```text
/// Uninitialized → Configured → Running → Stopped → Disposed
/// ```
/// `Configured` may also go straight to `Disposed` when capture never starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Uninitialized,
    Configured,
    Running,
    Stopped,
    Disposed,
}

impl EngineState {
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, Self::Uninitialized)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Whether a capture queue and output file are currently held.
    pub fn holds_resources(&self) -> bool {
        matches!(self, Self::Configured | Self::Running | Self::Stopped)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_live_states_hold_resources() {
        assert!(!EngineState::Uninitialized.holds_resources());
        assert!(EngineState::Configured.holds_resources());
        assert!(EngineState::Running.holds_resources());
        assert!(EngineState::Stopped.holds_resources());
        assert!(!EngineState::Disposed.holds_resources());
    }

    #[test]
    fn displays_lowercase() {
        assert_eq!(EngineState::Running.to_string(), "running");
        assert!(EngineState::Disposed.is_disposed());
    }
}
