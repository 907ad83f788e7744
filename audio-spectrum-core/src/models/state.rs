/// Coordinator state machine.
///
/// State transitions:
/// ```text
/// idle → initializing → streaming → draining → idle
///            ↓
///          idle (no device opened, backoff)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoordinatorState {
    #[default]
    Idle,
    Initializing,
    Streaming { active_streams: usize },
    Draining,
}

impl CoordinatorState {
    /// Number of open streams, if streaming.
    pub fn active_streams(&self) -> Option<usize> {
        match self {
            Self::Streaming { active_streams } => Some(*active_streams),
            _ => None,
        }
    }
}
