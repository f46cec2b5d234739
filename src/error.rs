use thiserror::Error;

/// Errors surfaced by discovery, connection, and the relay loop.
///
/// Setup failures abort the process. `Send` is transient: it carries the
/// combined failures of one outbound batch and is only ever logged. A scan
/// that finds nothing is not an error — discovery returns `Ok(None)` for
/// that outcome and the orchestrator decides what it means.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no bluetooth adapter available")]
    NoAdapter,

    #[error("no matching device found")]
    DeviceNotFound,

    #[error("device does not expose a heart rate measurement characteristic")]
    MissingHeartRateCharacteristic,

    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] bluer::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("osc encoding error: {0}")]
    OscEncode(#[from] rosc::OscError),

    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to deliver messages: {0}")]
    Send(String),
}
