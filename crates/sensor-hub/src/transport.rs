//! Transport side of the connection

use crate::error::HubError;

/// Events the transport posts to the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Service discovered and reachable
    ServiceReady,
    /// Asynchronous message from the service
    Indication { payload: Vec<u8> },
    /// Connection to the service broke
    ConnectionError { code: i32 },
}

/// Underlying message transport.
///
/// Implementations report progress only through [`TransportEvent`]s on the
/// channel handed to them at construction; nothing here blocks.
pub trait Transport: Send {
    /// Ask for the service to be located; success arrives as `ServiceReady`
    fn start_discovery(&mut self);

    /// Queue an encoded request
    fn send(&mut self, payload: &[u8]) -> Result<(), HubError>;

    /// Tear down the current client handle
    fn release(&mut self) {}
}
