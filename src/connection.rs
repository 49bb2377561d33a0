/*!
 # Lamp connection manager

 [`LampController`] owns the BLE session to one lamp. Callers never see a
 failure from it: connect and send errors are logged and the controller falls
 back to [`ConnectionState::Disconnected`], so the next send reconnects.
*/

use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::transport::BleTransport;
use crate::Error;

/// Connection state of a lamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Handles connection and communication with one lamp
pub struct LampController {
    mac_address: String,
    transport: Box<dyn BleTransport>,
    /// Held across connect and write so concurrent sends cannot both connect
    state: Mutex<ConnectionState>,
}

impl fmt::Debug for LampController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LampController")
            .field("mac_address", &self.mac_address)
            .finish_non_exhaustive()
    }
}

impl LampController {
    pub fn new(mac_address: &str, transport: Box<dyn BleTransport>) -> Self {
        Self {
            mac_address: mac_address.to_string(),
            transport,
            state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    pub fn mac_address(&self) -> &str {
        &self.mac_address
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    /// Establishes the connection unless one is already up
    #[instrument(skip(self), fields(mac = %self.mac_address))]
    pub async fn connect(&self) {
        let mut state = self.state.lock().await;
        self.connect_locked(&mut state).await;
    }

    async fn connect_locked(&self, state: &mut ConnectionState) {
        if *state == ConnectionState::Connected && self.transport.is_connected().await {
            info!("Already connected.");
            return;
        }

        match self.transport.connect().await {
            Ok(()) => {
                *state = ConnectionState::Connected;
                info!("Connected to device: {}", self.mac_address);
            }
            Err(e) => {
                error!("Connection error: {}", e);
                *state = ConnectionState::Disconnected;
            }
        }
    }

    /// Closes the connection. Safe to call when already disconnected.
    #[instrument(skip(self), fields(mac = %self.mac_address))]
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        if *state == ConnectionState::Disconnected {
            return;
        }

        if let Err(e) = self.transport.disconnect().await {
            warn!("Error while disconnecting: {}", e);
        }
        *state = ConnectionState::Disconnected;
        info!("Disconnected from device: {}", self.mac_address);
    }

    /// Sends a hex-encoded command, reconnecting once first if needed
    #[instrument(skip(self, command), fields(mac = %self.mac_address))]
    pub async fn send_command(&self, command: &str) {
        let bytes = match hex::decode(command).map_err(Error::from) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Error sending command: {}", e);
                return;
            }
        };

        let mut state = self.state.lock().await;
        if *state == ConnectionState::Disconnected || !self.transport.is_connected().await {
            warn!("Reconnecting...");
            *state = ConnectionState::Disconnected;
            self.connect_locked(&mut state).await;
        }

        if *state == ConnectionState::Disconnected {
            error!("Error sending command: not connected, dropping {}", command);
            return;
        }

        match self.transport.write(&bytes).await {
            Ok(()) => debug!("Command sent: {}", command),
            Err(e) => {
                error!("Error sending command: {}", e);
                // Close the link too, or a later disconnect() would skip it
                if let Err(e) = self.transport.disconnect().await {
                    warn!("Error while disconnecting: {}", e);
                }
                *state = ConnectionState::Disconnected;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn controller() -> (LampController, Arc<crate::mock::MockState>) {
        let (transport, state) = MockTransport::new();
        (
            LampController::new("AA:BB:CC:DD:EE:FF", Box::new(transport)),
            state,
        )
    }

    #[tokio::test]
    async fn test_connect_twice_connects_once() {
        let (lamp, mock) = controller();
        lamp.connect().await;
        lamp.connect().await;
        assert_eq!(mock.connects(), 1);
        assert_eq!(lamp.state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_connect_failure_resets_state() {
        let (lamp, mock) = controller();
        mock.fail_connect.store(true, Ordering::SeqCst);
        lamp.connect().await;
        assert_eq!(lamp.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_when_disconnected_reconnects_once_then_writes() {
        let (lamp, mock) = controller();
        lamp.send_command("00ff").await;
        assert_eq!(mock.connects(), 1);
        assert_eq!(mock.written(), vec![vec![0x00, 0xff]]);
        assert_eq!(*mock.log.lock(), vec!["connect", "write"]);
    }

    #[tokio::test]
    async fn test_send_after_link_drop_reconnects() {
        let (lamp, mock) = controller();
        lamp.connect().await;
        mock.drop_link();
        lamp.send_command("01").await;
        assert_eq!(mock.connects(), 2);
        assert_eq!(mock.written().len(), 1);
    }

    #[tokio::test]
    async fn test_send_with_failed_reconnect_is_dropped() {
        let (lamp, mock) = controller();
        mock.fail_connect.store(true, Ordering::SeqCst);
        lamp.send_command("01").await;
        assert_eq!(mock.connects(), 1);
        assert!(mock.written().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_marks_disconnected() {
        let (lamp, mock) = controller();
        lamp.connect().await;
        mock.fail_write.store(true, Ordering::SeqCst);
        lamp.send_command("01").await;
        assert_eq!(lamp.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_write_failure_closes_session() {
        let (lamp, mock) = controller();
        lamp.connect().await;
        mock.fail_write.store(true, Ordering::SeqCst);
        lamp.send_command("01").await;
        lamp.disconnect().await;
        assert_eq!(mock.disconnect_calls.load(Ordering::SeqCst), 1);
        assert!(!mock.connected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_invalid_hex_is_dropped() {
        let (lamp, mock) = controller();
        lamp.send_command("zz").await;
        assert_eq!(mock.connects(), 0);
        assert!(mock.written().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (lamp, mock) = controller();
        lamp.disconnect().await;
        lamp.connect().await;
        lamp.disconnect().await;
        lamp.disconnect().await;
        assert_eq!(mock.disconnect_calls.load(Ordering::SeqCst), 1);
        assert_eq!(lamp.state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_concurrent_sends_share_one_connect() {
        let (lamp, mock) = controller();
        let lamp = Arc::new(lamp);
        let a = tokio::spawn({
            let lamp = lamp.clone();
            async move { lamp.send_command("01").await }
        });
        let b = tokio::spawn({
            let lamp = lamp.clone();
            async move { lamp.send_command("02").await }
        });
        a.await.unwrap();
        b.await.unwrap();
        assert_eq!(mock.connects(), 1);
        assert_eq!(mock.written().len(), 2);
    }
}
