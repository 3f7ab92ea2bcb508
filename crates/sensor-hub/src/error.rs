//! Sensor-Hub Error Types

use thiserror::Error;

/// Errors raised by the sensor-hub connection
#[derive(Debug, Error)]
pub enum HubError {
    /// Service discovery exhausted every attempt
    #[error("Sensor-hub service unavailable after {attempts} attempts")]
    ServiceUnavailable { attempts: u32 },

    /// Encoded request exceeds the transport limit
    #[error("Request of {len} bytes exceeds maximum of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// Transport rejected a request
    #[error("Transport error code {0}")]
    Transport(i32),

    /// Transport event channel closed
    #[error("Transport event channel closed")]
    ChannelClosed,
}

impl HubError {
    /// No sensor data path can exist after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, HubError::ServiceUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(HubError::ServiceUnavailable { attempts: 4 }.is_fatal());
        assert!(!HubError::PayloadTooLarge { len: 2048, max: 1024 }.is_fatal());
        assert!(!HubError::Transport(-1).is_fatal());
        assert!(!HubError::ChannelClosed.is_fatal());
    }
}
