#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("layout has not been initialized")]
    NotInitialized,

    #[error("layout has been disposed")]
    Disposed,

    #[error("a step is already in flight")]
    StepInFlight,

    #[error("layout worker disconnected")]
    WorkerDisconnected,

    #[error("failed to spawn layout worker")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("graph topology changed since init; call init again")]
    TopologyChanged,

    #[error("{what} buffer has {actual} values, expected {expected}")]
    BufferLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid force config: `{field}` {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
