use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounterError {
    /// Observation with zero/negative extent. Dropped without touching any state.
    #[error("DegenerateBox: {0}")]
    DegenerateBox(String),
    /// Bad geometry or thresholds. Fatal at startup.
    #[error("Config: {0}")]
    Config(String),
    #[error("Io: {0}")]
    Io(#[from] std::io::Error),
    #[error("Yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Status: server answered {0}")]
    Status(u16),
    #[error("Timeout: no answer within {0} ms")]
    Timeout(u64),
    #[error("Closed: emitter queue is closed")]
    Closed,
    #[error("Rejected: {0}")]
    Rejected(String),
}
