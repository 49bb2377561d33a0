use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use std::path::PathBuf;
use std::time::Duration;
use sunset_lamp::config_flow::{FlowResult, UserInput};
use sunset_lamp::transport::{btleplug_factory, TransportConfig};
use sunset_lamp::*;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Lamp to control: entry id, name or MAC address (defaults to the first entry)
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Path of the config entry store
    #[arg(long, global = true, env = "SUNSET_LAMP_STORE")]
    store: Option<PathBuf>,

    /// Seconds to scan for the lamp before giving up
    #[arg(long, global = true, default_value_t = 10)]
    scan_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure a new lamp
    Add {
        /// Display name
        #[arg(short, long, default_value = "Sunset Lamp")]
        name: String,
        /// MAC address (XX:XX:XX:XX:XX:XX)
        #[arg(short, long)]
        mac: String,
    },
    /// List configured lamps
    List,
    /// Remove a configured lamp
    Remove {
        /// Entry id, name or MAC address
        device: String,
    },
    /// Turn the lamp on
    On {
        /// Brightness (0-255)
        #[arg(short, long)]
        brightness: Option<u8>,
        /// Hue (0-360)
        #[arg(long, requires = "saturation", value_parser = clap::value_parser!(u16).range(0..=360))]
        hue: Option<u16>,
        /// Saturation (0-100)
        #[arg(long, requires = "hue", value_parser = clap::value_parser!(u8).range(0..=100))]
        saturation: Option<u8>,
    },
    /// Turn the lamp off
    Off,
    /// Print the encrypted command for a color without sending it
    Encode {
        /// Red value (0-255)
        #[arg(short, long, default_value_t = 255)]
        red: u8,
        /// Green value (0-255)
        #[arg(short, long, default_value_t = 255)]
        green: u8,
        /// Blue value (0-255)
        #[arg(short, long, default_value_t = 255)]
        blue: u8,
        /// Brightness (0-100)
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(0..=100))]
        brightness: u8,
        /// Speed (0-100)
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(0..=100))]
        speed: u8,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with pretty colors
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| EnvFilter::new("sunset_lamp=info,sunsetc=info")),
        )
        .compact()
        .init();

    // Initialize color-eyre for pretty error reporting
    color_eyre::install()?;

    let cli = Cli::parse();
    debug!("Parsed command line arguments");

    let store = ConfigStore::new(cli.store.clone().unwrap_or_else(ConfigStore::default_path));
    let transport_config = TransportConfig {
        discovery_timeout: Duration::from_secs(cli.scan_timeout),
        ..TransportConfig::default()
    };

    match cli.command {
        Commands::Add { name, mac } => add(&store, name, mac)?,
        Commands::List => {
            for entry in store.load()? {
                println!(
                    "{}  {}  {}",
                    entry.entry_id, entry.data.mac_address, entry.title
                );
            }
        }
        Commands::Remove { device } => {
            let entry = store.remove(&device)?;
            println!("Removed {}", entry.title);
        }
        Commands::On {
            brightness,
            hue,
            saturation,
        } => {
            let mut params = TurnOnParams::default();
            if let Some(brightness) = brightness {
                params = params.brightness(brightness);
            }
            if let (Some(hue), Some(saturation)) = (hue, saturation) {
                params = params.hs_color(hue as f64, saturation as f64);
            }
            with_lamp(&store, cli.device.as_deref(), transport_config, |lamp| {
                Box::pin(async move { lamp.turn_on(params).await })
            })
            .await?;
        }
        Commands::Off => {
            with_lamp(&store, cli.device.as_deref(), transport_config, |lamp| {
                Box::pin(async move { lamp.turn_off().await })
            })
            .await?;
        }
        Commands::Encode {
            red,
            green,
            blue,
            brightness,
            speed,
        } => {
            let generator = PayloadGenerator::new();
            println!(
                "{}",
                generator.rgb_payload(red, green, blue, brightness, speed)
            );
        }
    }

    Ok(())
}

/// Runs the config flow and persists the resulting entry
#[instrument(skip(store))]
fn add(store: &ConfigStore, name: String, mac: String) -> Result<()> {
    let result = ConfigFlow::new().step_user(Some(UserInput {
        name,
        mac_address: mac,
    }));

    if let FlowResult::Form { errors, .. } = &result {
        let reason = errors.get("base").copied().unwrap_or("unknown");
        error!("Config flow rejected input: {}", reason);
        return Err(eyre!("invalid input: {}", reason));
    }

    let entry = result
        .into_entry()
        .ok_or_else(|| eyre!("config flow did not create an entry"))?;
    println!("Added {} ({})", entry.title, entry.entry_id);
    store.add(entry)?;
    Ok(())
}

/// Sets up the selected entry, runs `action` on its lamp, then unloads it
async fn with_lamp<F>(
    store: &ConfigStore,
    device: Option<&str>,
    transport_config: TransportConfig,
    action: F,
) -> Result<()>
where
    F: FnOnce(std::sync::Arc<SunsetLamp>) -> futures::future::BoxFuture<'static, ()>,
{
    let entry = store.find(device)?;
    info!("Using {} ({})", entry.title, entry.data.mac_address);

    let ctx = HomeContext::new(btleplug_factory(transport_config));
    integration::setup_entry(&ctx, &entry).await?;

    let lamp = ctx
        .entities_for(&entry.entry_id)
        .into_iter()
        .next()
        .ok_or_else(|| eyre!("no light set up for {}", entry.title))?;
    action(lamp).await;

    integration::unload_entry(&ctx, &entry).await?;
    Ok(())
}
