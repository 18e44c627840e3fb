// ABOUTME: Session state machine from image resolution through teardown

use serde::{Deserialize, Serialize};

/// Where a session is in its lifetime.
///
/// `ResolvingImage → CreatingContainer → WaitingForContainerRunning →
/// Monitoring → Cancelled → TearingDown → Done`, or `Failed` on an
/// unrecoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    ResolvingImage,
    CreatingContainer,
    WaitingForContainerRunning,
    Monitoring,
    Cancelled,
    TearingDown,
    Done,
    Failed,
}

impl SessionState {
    pub const fn description(self) -> &'static str {
        match self {
            Self::ResolvingImage => "Resolving image...",
            Self::CreatingContainer => "Creating container...",
            Self::WaitingForContainerRunning => "Waiting for container to be running...",
            Self::Monitoring => "Monitoring container",
            Self::Cancelled => "Cancelled by user",
            Self::TearingDown => "Tearing down container...",
            Self::Done => "Session finished",
            Self::Failed => "Session failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::ResolvingImage, Self::CreatingContainer)
                | (Self::CreatingContainer, Self::WaitingForContainerRunning)
                | (Self::WaitingForContainerRunning, Self::Monitoring)
                | (Self::Monitoring, Self::Cancelled)
                | (
                    Self::CreatingContainer
                        | Self::WaitingForContainerRunning
                        | Self::Monitoring
                        | Self::Cancelled,
                    Self::TearingDown
                )
                | (Self::TearingDown, Self::Done)
                | (
                    Self::ResolvingImage
                        | Self::CreatingContainer
                        | Self::WaitingForContainerRunning
                        | Self::TearingDown,
                    Self::Failed
                )
        )
    }
}
