//! Light platform: one [`SunsetLamp`] per config entry.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::ConfigEntry;
use crate::connection::LampController;
use crate::entity::SunsetLamp;
use crate::integration::HomeContext;
use crate::{Result, DOMAIN};

/// Sets up the Sunset Lamp light entity
#[instrument(skip(ctx, entry), fields(entry_id = %entry.entry_id))]
pub async fn setup_entry(ctx: &HomeContext, entry: &ConfigEntry) -> Result<()> {
    let name = &entry.data.name;
    let mac_address = &entry.data.mac_address;

    let transport = (ctx.transports())(mac_address);
    let controller = Arc::new(LampController::new(mac_address, transport));
    ctx.registry()
        .insert(DOMAIN, &entry.entry_id, controller.clone());

    // Connection failures are logged; the first command retries
    controller.connect().await;

    ctx.add_entities(
        &entry.entry_id,
        vec![Arc::new(SunsetLamp::new(controller, name))],
    );
    info!("Light {} ready ({})", name, mac_address);
    Ok(())
}

/// Disconnects the entry's lamp and removes its entity
#[instrument(skip(ctx, entry), fields(entry_id = %entry.entry_id))]
pub async fn unload_entry(ctx: &HomeContext, entry: &ConfigEntry) -> Result<bool> {
    for lamp in ctx.remove_entities(&entry.entry_id) {
        lamp.controller().disconnect().await;
    }
    Ok(true)
}
