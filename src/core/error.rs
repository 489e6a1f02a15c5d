use thiserror::Error;

/// Failures the scheduling core distinguishes between.
///
/// Device errors are logged and swallowed by the job bodies; `UnknownCamera`
/// aborts the current unit of work; `NoTransitionAvailable` stops a camera's
/// day/night chain until the next resync sweep.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("device unreachable: {0}")]
    DeviceUnreachable(String),

    #[error("device rejected request: {0}")]
    DeviceRejected(String),

    #[error("device call timed out after {0}s")]
    DeviceTimeout(u64),

    #[error("device call cancelled")]
    Cancelled,

    #[error("unknown camera: {0}")]
    UnknownCamera(String),

    #[error("no sunrise or sunset near {0}")]
    NoTransitionAvailable(String),
}

impl CoreError {
    pub fn is_device_failure(&self) -> bool {
        matches!(
            self,
            CoreError::DeviceUnreachable(_)
                | CoreError::DeviceRejected(_)
                | CoreError::DeviceTimeout(_)
                | CoreError::Cancelled
        )
    }
}
