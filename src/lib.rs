/*!
 # Sunset Lamp Bluetooth Controller Library

 A Rust library for controlling "Sunset Lamp" Bluetooth LE lights through a
 home-automation style light entity.

 ## Features

 * Power on/off control
 * Brightness adjustment
 * Hue/saturation color control
 * Config flow and persisted config entries
 * Entry setup/unload against an explicit host context

 ## Example

 ```no_run
 use sunset_lamp::*;

 #[tokio::main]
 async fn main() -> Result<()> {
     // Initialize tracing for logs
     tracing_subscriber::fmt::init();

     let ctx = HomeContext::new(transport::btleplug_factory(Default::default()));
     let entry = ConfigEntry::new("Sunset Lamp", "AA:BB:CC:DD:EE:FF");
     integration::setup_entry(&ctx, &entry).await?;

     for lamp in ctx.entities_for(&entry.entry_id) {
         lamp.turn_on(TurnOnParams::default().brightness(128)).await;
     }

     integration::unload_entry(&ctx, &entry).await?;
     Ok(())
 }
 ```
*/

use thiserror::Error;

/// Integration domain, used as the registry bucket key and unique id prefix
pub const DOMAIN: &str = "sunset_lamp";

/// Custom error types for the Sunset Lamp library
#[derive(Error, Debug)]
pub enum Error {
    /// No Bluetooth adapters found
    #[error("No Bluetooth adapters found")]
    NoBluetoothAdapters,

    /// No peripheral with the configured address was seen during the scan
    #[error("No device with address {0} found")]
    DeviceNotFound(String),

    /// Failed to find required BLE characteristic
    #[error("Could not find required BLE characteristic: {0}")]
    CharacteristicNotFound(String),

    /// A write was attempted without an open session
    #[error("Not connected to {0}")]
    NotConnected(String),

    /// Command was not valid hex
    #[error("Invalid command encoding: {0}")]
    InvalidCommand(#[from] hex::FromHexError),

    /// No config entry matched the requested name, id or address
    #[error("Config entry not found: {0}")]
    EntryNotFound(String),

    /// Error from btleplug
    #[error(transparent)]
    BtlePlugError(#[from] btleplug::Error),

    /// Config store could not be read or written
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Config store held malformed JSON
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod color;
pub mod config;
pub mod config_flow;
pub mod connection;
pub mod entity;
pub mod integration;
pub mod light;
pub mod payload;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

// Re-export key types
pub use config::{ConfigEntry, ConfigStore, EntryData};
pub use config_flow::{ConfigFlow, FlowResult, UserInput};
pub use connection::{ConnectionState, LampController};
pub use entity::{LightEntity, LightState, SunsetLamp, SupportedFeatures, TurnOnParams};
pub use integration::{HomeContext, Platform, Registry};
pub use payload::{CommandPayload, CommandType, PayloadGenerator};
pub use transport::{BleTransport, BtleplugTransport, TransportConfig, TransportFactory};
