//! Connection state machine

use crate::error::HubError;
use crate::transport::{Transport, TransportEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Largest encoded request the transport accepts
pub const MAX_REQUEST_LEN: usize = 1024;
/// Largest indication delivered to the consumer
pub const MAX_INDICATION_LEN: usize = 1024;

const INDICATION_CHANNEL_DEPTH: usize = 64;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Discovering,
    Connected,
    /// Connection broke; discovery is about to restart
    ReconnectPending,
}

/// How long and how often to wait for the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
}

impl DiscoveryPolicy {
    /// Service never reached yet: it may still be starting up
    pub const FIRST_CONNECT: Self = Self {
        attempts: 4,
        timeout: Duration::from_secs(2),
    };

    /// Service was reachable before; fail fast
    pub const RECONNECT: Self = Self {
        attempts: 2,
        timeout: Duration::from_millis(500),
    };
}

/// Result of a request that did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Connection not up; request discarded
    Dropped,
}

/// Client connection to the sensor-hub service.
///
/// Only this object reads the event channel, so the reconnect state and
/// error bookkeeping have a single owner.
pub struct SensorHubConnection<T: Transport> {
    transport: T,
    events: mpsc::Receiver<TransportEvent>,
    indications: mpsc::Sender<Vec<u8>>,
    state: ConnectionState,
    /// Service was reached at least once
    service_accessed: bool,
    error_count: u32,
    dropped_indications: u64,
}

impl<T: Transport> SensorHubConnection<T> {
    /// Create a connection and the receiver for delivered indications
    pub fn new(transport: T, events: mpsc::Receiver<TransportEvent>) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (indications, receiver) = mpsc::channel(INDICATION_CHANNEL_DEPTH);
        let connection = Self {
            transport,
            events,
            indications,
            state: ConnectionState::Disconnected,
            service_accessed: false,
            error_count: 0,
            dropped_indications: 0,
        };
        (connection, receiver)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn service_accessed(&self) -> bool {
        self.service_accessed
    }

    pub fn dropped_indications(&self) -> u64 {
        self.dropped_indications
    }

    fn discovery_policy(&self) -> DiscoveryPolicy {
        if self.service_accessed {
            DiscoveryPolicy::RECONNECT
        } else {
            DiscoveryPolicy::FIRST_CONNECT
        }
    }

    /// Discover the service, retrying per the current policy
    pub async fn connect(&mut self) -> Result<(), HubError> {
        let policy = self.discovery_policy();
        self.state = ConnectionState::Discovering;
        info!(
            "Discovering sensor-hub service ({} x {:?})",
            policy.attempts, policy.timeout
        );

        for attempt in 1..=policy.attempts {
            self.transport.start_discovery();
            match timeout(policy.timeout, self.wait_for_service()).await {
                Ok(Ok(())) => {
                    self.state = ConnectionState::Connected;
                    self.service_accessed = true;
                    info!("Sensor-hub service connected on attempt {}", attempt);
                    return Ok(());
                }
                Ok(Err(err)) => {
                    self.state = ConnectionState::Disconnected;
                    return Err(err);
                }
                Err(_) => warn!(
                    "Sensor-hub discovery attempt {}/{} timed out",
                    attempt, policy.attempts
                ),
            }
        }

        self.state = ConnectionState::Disconnected;
        error!("Sensor-hub service unavailable after {} attempts", policy.attempts);
        Err(HubError::ServiceUnavailable {
            attempts: policy.attempts,
        })
    }

    async fn wait_for_service(&mut self) -> Result<(), HubError> {
        loop {
            match self.events.recv().await {
                Some(TransportEvent::ServiceReady) => return Ok(()),
                Some(TransportEvent::Indication { payload }) => {
                    debug!("Dropping {} byte indication during discovery", payload.len());
                }
                Some(TransportEvent::ConnectionError { code }) => {
                    self.error_count += 1;
                    warn!("Transport error {} during discovery", code);
                }
                None => return Err(HubError::ChannelClosed),
            }
        }
    }

    /// Apply one transport event
    pub async fn handle_event(&mut self, event: TransportEvent) -> Result<(), HubError> {
        match event {
            TransportEvent::Indication { payload } => {
                self.deliver(payload).await;
                Ok(())
            }
            TransportEvent::ConnectionError { code } => {
                self.error_count += 1;
                error!(
                    "Sensor-hub connection error {} (total {})",
                    code, self.error_count
                );
                self.transport.release();
                self.state = ConnectionState::ReconnectPending;
                self.connect().await
            }
            TransportEvent::ServiceReady => {
                if self.state != ConnectionState::Connected {
                    self.state = ConnectionState::Connected;
                    self.service_accessed = true;
                }
                Ok(())
            }
        }
    }

    async fn deliver(&mut self, payload: Vec<u8>) {
        if payload.len() > MAX_INDICATION_LEN {
            self.dropped_indications += 1;
            error!(
                "Dropping indication of {} bytes (max {})",
                payload.len(),
                MAX_INDICATION_LEN
            );
            return;
        }
        if self.indications.send(payload).await.is_err() {
            warn!("Indication consumer gone");
        }
    }

    /// Send an encoded request
    pub fn send_request(&mut self, payload: &[u8]) -> Result<SendOutcome, HubError> {
        if payload.len() > MAX_REQUEST_LEN {
            return Err(HubError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_REQUEST_LEN,
            });
        }
        if self.state != ConnectionState::Connected {
            error!("Sensor-hub not connected ({:?}), dropping request", self.state);
            return Ok(SendOutcome::Dropped);
        }
        self.transport.send(payload)?;
        Ok(SendOutcome::Sent)
    }

    /// Connect, then process events until the transport goes away.
    ///
    /// Only fatal errors end the loop early.
    pub async fn run(mut self) -> Result<(), HubError> {
        self.connect().await?;
        while let Some(event) = self.events.recv().await {
            if let Err(err) = self.handle_event(event).await {
                if err.is_fatal() {
                    return Err(err);
                }
                warn!("Sensor-hub event failed: {}", err);
            }
        }
        info!("Sensor-hub transport closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    /// Answers discovery on the listed attempt numbers
    struct ScriptedTransport {
        events: mpsc::Sender<TransportEvent>,
        ready_on: Vec<u32>,
        discoveries: Arc<AtomicU32>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Transport for ScriptedTransport {
        fn start_discovery(&mut self) {
            let attempt = self.discoveries.fetch_add(1, Ordering::SeqCst) + 1;
            if self.ready_on.contains(&attempt) {
                let _ = self.events.try_send(TransportEvent::ServiceReady);
            }
        }

        fn send(&mut self, payload: &[u8]) -> Result<(), HubError> {
            self.sent.lock().unwrap().push(payload.to_vec());
            Ok(())
        }
    }

    struct Harness {
        connection: SensorHubConnection<ScriptedTransport>,
        indications: mpsc::Receiver<Vec<u8>>,
        discoveries: Arc<AtomicU32>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    fn harness(ready_on: Vec<u32>) -> Harness {
        let (tx, rx) = mpsc::channel(16);
        let discoveries = Arc::new(AtomicU32::new(0));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = ScriptedTransport {
            events: tx,
            ready_on,
            discoveries: discoveries.clone(),
            sent: sent.clone(),
        };
        let (connection, indications) = SensorHubConnection::new(transport, rx);
        Harness {
            connection,
            indications,
            discoveries,
            sent,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_four_timeouts_are_fatal() {
        let mut h = harness(vec![]);
        let start = Instant::now();

        let err = h.connection.connect().await.unwrap_err();
        assert!(matches!(err, HubError::ServiceUnavailable { attempts: 4 }));
        assert!(err.is_fatal());
        assert_eq!(h.discoveries.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(8));
        assert_eq!(h.connection.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_attempt_still_connects() {
        let mut h = harness(vec![4]);
        let start = Instant::now();

        h.connection.connect().await.unwrap();
        assert_eq!(h.connection.state(), ConnectionState::Connected);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_uses_short_policy() {
        let mut h = harness(vec![1]);
        h.connection.connect().await.unwrap();
        assert!(h.connection.service_accessed());

        let start = Instant::now();
        let err = h
            .connection
            .handle_event(TransportEvent::ConnectionError { code: -2 })
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::ServiceUnavailable { attempts: 2 }));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(h.connection.error_count(), 1);
        assert_eq!(h.discoveries.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_request_limits() {
        let mut h = harness(vec![1]);
        assert_eq!(h.connection.send_request(b"early").unwrap(), SendOutcome::Dropped);

        h.connection.connect().await.unwrap();
        let oversized = vec![0u8; MAX_REQUEST_LEN + 1];
        assert!(matches!(
            h.connection.send_request(&oversized),
            Err(HubError::PayloadTooLarge { len, max: MAX_REQUEST_LEN }) if len == MAX_REQUEST_LEN + 1
        ));
        assert_eq!(h.connection.send_request(b"config").unwrap(), SendOutcome::Sent);
        assert_eq!(*h.sent.lock().unwrap(), vec![b"config".to_vec()]);
    }

    #[tokio::test]
    async fn test_oversized_indication_dropped() {
        let mut h = harness(vec![]);
        h.connection
            .handle_event(TransportEvent::Indication {
                payload: vec![1u8; MAX_INDICATION_LEN + 1],
            })
            .await
            .unwrap();
        h.connection
            .handle_event(TransportEvent::Indication { payload: vec![7u8; 16] })
            .await
            .unwrap();

        assert_eq!(h.connection.dropped_indications(), 1);
        assert_eq!(h.indications.recv().await, Some(vec![7u8; 16]));
        assert!(h.indications.try_recv().is_err());
    }
}
