use std::time::Duration;

use fixa_frame::FrameConfig;

/// Default coalescing window for controller edits.
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_millis(50);

/// Device-side session configuration.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Name announced in every registration.
    pub stream_name: String,
    /// Frame limits and socket timeouts for accepted connections.
    pub frame: FrameConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            stream_name: "fixa".to_string(),
            frame: FrameConfig::default(),
        }
    }
}

impl DeviceConfig {
    pub fn with_stream_name(mut self, name: impl Into<String>) -> Self {
        self.stream_name = name.into();
        self
    }
}

/// Controller-side session configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Minimum spacing between update flushes. Zero flushes every edit
    /// immediately.
    pub throttle_interval: Duration,
    /// Upper bound on establishing the TCP connection.
    pub connect_timeout: Option<Duration>,
    /// Frame limits and socket timeouts.
    pub frame: FrameConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            throttle_interval: DEFAULT_THROTTLE_INTERVAL,
            connect_timeout: Some(Duration::from_secs(5)),
            frame: FrameConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn with_throttle_interval(mut self, interval: Duration) -> Self {
        self.throttle_interval = interval;
        self
    }
}
