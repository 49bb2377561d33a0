/*!
 # Entry lifecycle

 The host side of the integration. [`HomeContext`] replaces a process-wide
 data bucket: it owns the per-domain [`Registry`] of controllers, the
 entities platforms have added, and the factory that opens BLE sessions.
 [`setup_entry`] and [`unload_entry`] forward to the light platform.
*/

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::ConfigEntry;
use crate::connection::LampController;
use crate::entity::SunsetLamp;
use crate::transport::TransportFactory;
use crate::{light, Result, DOMAIN};

/// Platforms this integration forwards entries to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Light,
}

pub const PLATFORMS: &[Platform] = &[Platform::Light];

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Light => write!(f, "light"),
        }
    }
}

/// Per-domain buckets of controllers keyed by entry id
#[derive(Debug, Default)]
pub struct Registry {
    domains: Mutex<HashMap<String, HashMap<String, Arc<LampController>>>>,
}

impl Registry {
    /// Creates the bucket for `domain` if absent
    pub fn ensure_domain(&self, domain: &str) {
        self.domains.lock().entry(domain.to_string()).or_default();
    }

    pub fn has_domain(&self, domain: &str) -> bool {
        self.domains.lock().contains_key(domain)
    }

    pub fn insert(&self, domain: &str, entry_id: &str, controller: Arc<LampController>) {
        self.domains
            .lock()
            .entry(domain.to_string())
            .or_default()
            .insert(entry_id.to_string(), controller);
    }

    pub fn get(&self, domain: &str, entry_id: &str) -> Option<Arc<LampController>> {
        self.domains
            .lock()
            .get(domain)
            .and_then(|bucket| bucket.get(entry_id).cloned())
    }

    pub fn remove(&self, domain: &str, entry_id: &str) -> Option<Arc<LampController>> {
        self.domains
            .lock()
            .get_mut(domain)
            .and_then(|bucket| bucket.remove(entry_id))
    }

    pub fn len(&self, domain: &str) -> usize {
        self.domains.lock().get(domain).map_or(0, HashMap::len)
    }
}

/// Host state passed to setup and unload
pub struct HomeContext {
    registry: Registry,
    entities: Mutex<Vec<(String, Arc<SunsetLamp>)>>,
    transports: TransportFactory,
}

impl fmt::Debug for HomeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HomeContext")
            .field("registry", &self.registry)
            .field("entities", &self.entities.lock().len())
            .finish_non_exhaustive()
    }
}

impl HomeContext {
    pub fn new(transports: TransportFactory) -> Self {
        Self {
            registry: Registry::default(),
            entities: Mutex::new(Vec::new()),
            transports,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn transports(&self) -> &TransportFactory {
        &self.transports
    }

    /// Adds entities on behalf of a platform
    pub fn add_entities(&self, entry_id: &str, lamps: Vec<Arc<SunsetLamp>>) {
        let mut entities = self.entities.lock();
        for lamp in lamps {
            debug!("Adding entity {:?} for entry {}", lamp, entry_id);
            entities.push((entry_id.to_string(), lamp));
        }
    }

    /// Drops every entity belonging to an entry, returning them
    pub fn remove_entities(&self, entry_id: &str) -> Vec<Arc<SunsetLamp>> {
        let mut entities = self.entities.lock();
        let (removed, kept): (Vec<_>, Vec<_>) =
            entities.drain(..).partition(|(id, _)| id == entry_id);
        *entities = kept;
        removed.into_iter().map(|(_, lamp)| lamp).collect()
    }

    pub fn entities_for(&self, entry_id: &str) -> Vec<Arc<SunsetLamp>> {
        self.entities
            .lock()
            .iter()
            .filter(|(id, _)| id == entry_id)
            .map(|(_, lamp)| lamp.clone())
            .collect()
    }
}

/// Sets up Sunset Lamp from a config entry
#[instrument(skip(ctx, entry), fields(entry_id = %entry.entry_id))]
pub async fn setup_entry(ctx: &HomeContext, entry: &ConfigEntry) -> Result<bool> {
    ctx.registry().ensure_domain(DOMAIN);

    for platform in PLATFORMS {
        debug!("Forwarding setup to {} platform", platform);
        match platform {
            Platform::Light => light::setup_entry(ctx, entry).await?,
        }
    }

    info!("Entry {} set up", entry.title);
    Ok(true)
}

/// Handles removal of an entry
#[instrument(skip(ctx, entry), fields(entry_id = %entry.entry_id))]
pub async fn unload_entry(ctx: &HomeContext, entry: &ConfigEntry) -> Result<bool> {
    let mut unload_ok = true;
    for platform in PLATFORMS {
        debug!("Forwarding unload to {} platform", platform);
        unload_ok &= match platform {
            Platform::Light => light::unload_entry(ctx, entry).await?,
        };
    }

    if unload_ok {
        ctx.registry().remove(DOMAIN, &entry.entry_id);
        info!("Entry {} unloaded", entry.title);
    }
    Ok(unload_ok)
}
