//! Sensor-Hub Transport
//!
//! Connection to the sensor-hub service. The transport posts typed events
//! onto a channel; the connection consumes them as a state machine and
//! owns all reconnect bookkeeping.

mod connection;
mod error;
mod transport;

pub use connection::{
    ConnectionState, DiscoveryPolicy, SendOutcome, SensorHubConnection, MAX_INDICATION_LEN,
    MAX_REQUEST_LEN,
};
pub use error::HubError;
pub use transport::{Transport, TransportEvent};
