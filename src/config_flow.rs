/*!
 # Config flow

 A single-step form that collects a name and a MAC address and turns them
 into a [`ConfigEntry`].
*/

use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::config::{ConfigEntry, EntryData, DEFAULT_NAME};

pub const CONF_NAME: &str = "name";
pub const CONF_MAC: &str = "mac_address";

/// Error key shown when the MAC address is rejected
pub const ERROR_INVALID_MAC: &str = "invalid_mac";

/// Length of an `XX:XX:XX:XX:XX:XX` address
const MAC_LEN: usize = 17;

/// One field of a form schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub key: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
}

/// Values submitted by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInput {
    pub name: String,
    pub mac_address: String,
}

/// Outcome of a flow step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowResult {
    /// Show (or re-show) a form
    Form {
        step_id: &'static str,
        schema: Vec<SchemaField>,
        errors: BTreeMap<&'static str, &'static str>,
    },
    /// Input accepted, persist a new entry
    CreateEntry { title: String, data: EntryData },
}

impl FlowResult {
    /// Builds the entry to persist, if this result created one
    pub fn into_entry(self) -> Option<ConfigEntry> {
        match self {
            FlowResult::CreateEntry { title, data } => Some(ConfigEntry::from_data(&title, data)),
            FlowResult::Form { .. } => None,
        }
    }
}

/// Handles a config flow for Sunset Lamp
#[derive(Debug, Default)]
pub struct ConfigFlow;

impl ConfigFlow {
    pub const VERSION: u32 = 1;

    pub fn new() -> Self {
        Self
    }

    fn schema() -> Vec<SchemaField> {
        vec![
            SchemaField {
                key: CONF_NAME,
                required: true,
                default: Some(DEFAULT_NAME),
            },
            SchemaField {
                key: CONF_MAC,
                required: true,
                default: None,
            },
        ]
    }

    /// Only the length is checked; colons and hex digits are not.
    pub fn is_valid_mac(mac: &str) -> bool {
        mac.chars().count() == MAC_LEN
    }

    /// Handles the initial step
    #[instrument(skip(self))]
    pub fn step_user(&self, user_input: Option<UserInput>) -> FlowResult {
        let mut errors = BTreeMap::new();

        if let Some(input) = user_input {
            if Self::is_valid_mac(&input.mac_address) {
                debug!("Creating entry for {}", input.mac_address);
                return FlowResult::CreateEntry {
                    title: input.name.clone(),
                    data: EntryData {
                        name: input.name,
                        mac_address: input.mac_address,
                    },
                };
            }
            debug!("Rejected MAC address {:?}", input.mac_address);
            errors.insert("base", ERROR_INVALID_MAC);
        }

        FlowResult::Form {
            step_id: "user",
            schema: Self::schema(),
            errors,
        }
    }
}
