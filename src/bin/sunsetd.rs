use color_eyre::eyre::Result;
use std::env;
use sunset_lamp::transport::{btleplug_factory, TransportConfig};
use sunset_lamp::*;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
    color_eyre::install()?;

    // Get a target mac address from command line arguments.
    // If not provided, exit.
    let usage = "Usage: sunsetd <mac address> [name]";
    let args: Vec<_> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{usage}");
        std::process::exit(1);
    }
    if args[1] == "-h" || args[1] == "--help" {
        eprintln!("{usage}");
        std::process::exit(0);
    }

    let name = args.get(2).map(String::as_str).unwrap_or(config::DEFAULT_NAME);
    if !ConfigFlow::is_valid_mac(&args[1]) {
        eprintln!("ERR invalid_mac");
        std::process::exit(1);
    }
    let entry = ConfigEntry::new(name, &args[1]);

    let ctx = HomeContext::new(btleplug_factory(TransportConfig::default()));
    integration::setup_entry(&ctx, &entry).await?;
    let lamp = match ctx.entities_for(&entry.entry_id).into_iter().next() {
        Some(lamp) => lamp,
        None => {
            eprintln!("ERR no light set up");
            std::process::exit(1);
        }
    };

    // Inform about successful initialization
    println!("OK");

    // Mainloop: wait for user input, line by line
    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(input) = lines.next_line().await? {
        let mut cmd = input.trim().splitn(2, ':');
        match cmd.next() {
            Some("turn_on") => {
                let mut params = TurnOnParams::default();
                if let Some(arg) = cmd.next() {
                    match arg.trim().parse::<u8>() {
                        Ok(brightness) => params = params.brightness(brightness),
                        Err(_) => {
                            eprintln!("ERR Brightness must be between 0 and 255");
                            continue;
                        }
                    }
                }
                lamp.turn_on(params).await;
                println!("OK");
            }
            Some("set_color") => {
                let hs: Vec<f64> = match cmd
                    .next()
                    .unwrap_or_default()
                    .split(',')
                    .map(|s| s.trim().parse::<f64>())
                    .collect::<std::result::Result<Vec<f64>, _>>()
                {
                    Ok(hs) => hs,
                    Err(_) => {
                        eprintln!("ERR Invalid color format. Use H,S (e.g., 0,100 for red)");
                        continue;
                    }
                };
                if hs.len() != 2 {
                    eprintln!("ERR Invalid color format. Use H,S (e.g., 0,100 for red)");
                    continue;
                }
                lamp.turn_on(TurnOnParams::default().hs_color(hs[0], hs[1]))
                    .await;
                println!("OK");
            }
            Some("turn_off") => {
                lamp.turn_off().await;
                println!("OK");
            }
            Some("state") => {
                let state = lamp.state();
                println!(
                    "OK on={} brightness={} hs={},{} link={}",
                    state.is_on,
                    state.brightness,
                    state.hs_color.0,
                    state.hs_color.1,
                    lamp.controller().state().await
                );
            }
            Some("quit") => break,
            Some("") | None => {
                eprintln!("ERR No command given");
            }
            Some(other) => {
                eprintln!("ERR Unknown command: {other}");
            }
        }
    }

    integration::unload_entry(&ctx, &entry).await?;
    Ok(())
}
