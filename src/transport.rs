/*!
 # BLE transport

 The connection manager talks to the lamp through [`BleTransport`], a small
 session trait. [`BtleplugTransport`] is the real implementation: it resolves
 the configured MAC address on the first Bluetooth adapter, connects, and
 writes to the lamp's command characteristic.
*/

use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use crate::{Error, Result};

/// Characteristic the lamp accepts encrypted commands on
pub const WRITE_CHARACTERISTIC: Uuid = Uuid::from_u128(0x0000ac52_1212_efde_1523_785fedbeda25);

/// A single BLE session to one device
pub trait BleTransport: Send + Sync {
    /// Opens the session
    fn connect(&self) -> BoxFuture<'_, Result<()>>;

    /// Closes the session if one is open
    fn disconnect(&self) -> BoxFuture<'_, Result<()>>;

    /// Whether the link is currently up
    fn is_connected(&self) -> BoxFuture<'_, bool>;

    /// Writes raw bytes to the command characteristic
    fn write<'a>(&'a self, data: &'a [u8]) -> BoxFuture<'a, Result<()>>;
}

/// Builds a transport for a MAC address
pub type TransportFactory = Arc<dyn Fn(&str) -> Box<dyn BleTransport> + Send + Sync>;

/// Settings for [`BtleplugTransport`]
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long to scan for the configured address before giving up
    pub discovery_timeout: Duration,
    /// Delay between peripheral list polls while scanning
    pub poll_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Factory producing [`BtleplugTransport`]s with the given settings
pub fn btleplug_factory(config: TransportConfig) -> TransportFactory {
    Arc::new(move |mac: &str| {
        Box::new(BtleplugTransport::new(mac, config.clone())) as Box<dyn BleTransport>
    })
}

/// Gets the default Bluetooth adapter
#[instrument(skip(manager))]
async fn get_central(manager: &Manager) -> Result<Adapter> {
    debug!("Getting default Bluetooth adapter");
    let adapters = manager.adapters().await?;
    match adapters.into_iter().next() {
        Some(adapter) => Ok(adapter),
        None => {
            error!("No Bluetooth adapters found");
            Err(Error::NoBluetoothAdapters)
        }
    }
}

struct Session {
    peripheral: Peripheral,
    write_characteristic: Characteristic,
}

/// btleplug-backed session to one lamp
pub struct BtleplugTransport {
    mac_address: String,
    config: TransportConfig,
    session: Mutex<Option<Session>>,
}

impl BtleplugTransport {
    pub fn new(mac_address: &str, config: TransportConfig) -> Self {
        Self {
            mac_address: mac_address.to_string(),
            config,
            session: Mutex::new(None),
        }
    }

    /// Scans until a peripheral with our address shows up or the window closes
    #[instrument(skip(self, central), fields(mac = %self.mac_address))]
    async fn find_peripheral(&self, central: &Adapter) -> Result<Peripheral> {
        central.start_scan(ScanFilter::default()).await?;

        let result = self.scan_for_address(central).await;

        // Stop scanning on every exit path, including peripheral list errors
        if let Err(e) = central.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        result
    }

    async fn scan_for_address(&self, central: &Adapter) -> Result<Peripheral> {
        let wanted = self.mac_address.to_lowercase();
        let start_time = std::time::Instant::now();

        while start_time.elapsed() < self.config.discovery_timeout {
            let peripherals = central.peripherals().await?;
            trace!("Found {} BLE peripherals so far", peripherals.len());

            for p in peripherals {
                if p.address().to_string().to_lowercase() == wanted
                    || p.id().to_string().to_lowercase() == wanted
                {
                    debug!("Found device {}", self.mac_address);
                    return Ok(p);
                }
            }

            time::sleep(self.config.poll_interval).await;
        }

        error!(
            "Device {} not found within {} seconds",
            self.mac_address,
            self.config.discovery_timeout.as_secs()
        );
        Err(Error::DeviceNotFound(self.mac_address.clone()))
    }

    async fn open(&self) -> Result<Session> {
        let manager = Manager::new().await?;
        let central = get_central(&manager).await?;
        let peripheral = self.find_peripheral(&central).await?;

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }

        match Self::prepare(&peripheral).await {
            Ok(write_characteristic) => Ok(Session {
                peripheral,
                write_characteristic,
            }),
            Err(e) => {
                // No session will own this link, so close it here
                if let Err(err) = peripheral.disconnect().await {
                    warn!("Failed to disconnect after setup error: {}", err);
                }
                Err(e)
            }
        }
    }

    /// Discovers services on a connected peripheral and finds the write characteristic
    async fn prepare(peripheral: &Peripheral) -> Result<Characteristic> {
        debug!("Discovering services...");
        peripheral.discover_services().await?;

        let write_characteristic = find_write_characteristic(peripheral.characteristics())?;
        debug!("Found write characteristic: {}", write_characteristic.uuid);
        Ok(write_characteristic)
    }
}

/// Picks the lamp's command characteristic out of a discovered set
fn find_write_characteristic(
    characteristics: impl IntoIterator<Item = Characteristic>,
) -> Result<Characteristic> {
    characteristics
        .into_iter()
        .find(|c| c.uuid == WRITE_CHARACTERISTIC)
        .ok_or(Error::CharacteristicNotFound(WRITE_CHARACTERISTIC.to_string()))
}

impl BleTransport for BtleplugTransport {
    fn connect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let session = self.open().await?;
            *self.session.lock().await = Some(session);
            info!("Connected to device: {}", self.mac_address);
            Ok(())
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if let Some(session) = self.session.lock().await.take() {
                session.peripheral.disconnect().await?;
                info!("Disconnected from device: {}", self.mac_address);
            }
            Ok(())
        })
    }

    fn is_connected(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match self.session.lock().await.as_ref() {
                Some(session) => session.peripheral.is_connected().await.unwrap_or(false),
                None => false,
            }
        })
    }

    fn write<'a>(&'a self, data: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let guard = self.session.lock().await;
            let session = guard
                .as_ref()
                .ok_or_else(|| Error::NotConnected(self.mac_address.clone()))?;

            // Prefer WriteWithResponse when supported
            let write_type = if session
                .write_characteristic
                .properties
                .contains(CharPropFlags::WRITE)
            {
                WriteType::WithResponse
            } else {
                WriteType::WithoutResponse
            };

            session
                .peripheral
                .write(&session.write_characteristic, data, write_type)
                .await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_characteristic_uuid() {
        assert_eq!(
            WRITE_CHARACTERISTIC.to_string(),
            "0000ac52-1212-efde-1523-785fedbeda25"
        );
    }

    fn characteristic(uuid: Uuid) -> Characteristic {
        Characteristic {
            uuid,
            service_uuid: Uuid::nil(),
            properties: CharPropFlags::WRITE,
            descriptors: Default::default(),
        }
    }

    #[test]
    fn test_find_write_characteristic() {
        let other = Uuid::from_u128(0x0000fff3_0000_1000_8000_00805f9b34fb);
        let found = find_write_characteristic(vec![
            characteristic(other),
            characteristic(WRITE_CHARACTERISTIC),
        ])
        .unwrap();
        assert_eq!(found.uuid, WRITE_CHARACTERISTIC);
    }

    #[test]
    fn test_missing_write_characteristic_is_an_error() {
        let other = Uuid::from_u128(0x0000fff3_0000_1000_8000_00805f9b34fb);
        assert!(matches!(
            find_write_characteristic(vec![characteristic(other)]),
            Err(Error::CharacteristicNotFound(_))
        ));
    }

    #[test]
    fn test_default_discovery_window() {
        let config = TransportConfig::default();
        assert_eq!(config.discovery_timeout, Duration::from_secs(10));
    }
}
