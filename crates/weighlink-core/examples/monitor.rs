//! Weighing indicator monitor
//!
//! Connects to an indicator (or the built-in simulator), prints every decoded
//! frame and keeps the settings file up to date.
//!
//! Usage:
//!   cargo run --example monitor -- [OPTIONS]
//!
//! Options:
//!   --port PORT       Serial port (default: from settings file)
//!   --baud RATE       Baud rate (default: from settings file)
//!   --settings PATH   Settings file (default: per-user config dir)
//!   --demo            Read from the simulated indicator instead of a port
//!   --list            List serial ports and exit
//!   --seconds N       Stop after N seconds (default: run until killed)
//!
//! Log level is controlled with RUST_LOG (e.g. RUST_LOG=weighlink_core=debug).

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use weighlink_core::device::{list_ports, preferred_port, SimulatedIndicator};
use weighlink_core::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut port: Option<String> = None;
    let mut baud: Option<u32> = None;
    let mut settings_path: Option<PathBuf> = None;
    let mut demo = false;
    let mut run_for: Option<Duration> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                port = args.get(i).cloned();
            }
            "--baud" | "-b" => {
                i += 1;
                let raw = args.get(i).context("--baud needs a value")?;
                baud = Some(raw.parse().with_context(|| format!("invalid baud rate '{}'", raw))?);
            }
            "--settings" | "-s" => {
                i += 1;
                settings_path = args.get(i).map(PathBuf::from);
            }
            "--seconds" => {
                i += 1;
                let raw = args.get(i).context("--seconds needs a value")?;
                run_for = Some(Duration::from_secs(
                    raw.parse().with_context(|| format!("invalid duration '{}'", raw))?,
                ));
            }
            "--demo" => demo = true,
            "--list" | "-l" => {
                print_ports();
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => bail!("unknown argument '{}', see --help", other),
        }
        i += 1;
    }

    let store = settings_path.map(ConfigurationStore::new).unwrap_or_default();
    let mut settings = store.load();
    match port {
        Some(port) => settings.connection.port = port,
        None if !demo => {
            let available: Vec<String> = list_ports().into_iter().map(|p| p.name).collect();
            settings.connection.port = preferred_port(&settings.connection.port, &available);
        }
        None => {}
    }
    if let Some(baud) = baud {
        settings.connection.baud_rate = baud;
    }
    store.save(&settings);

    let mut publisher = ReadingPublisher::from_settings(&settings);
    let events = publisher.subscribe();

    if demo {
        let sim = SimulatedIndicator::new()
            .with_delimiters(settings.parsing.start_delimiter, settings.parsing.end_delimiter)
            .with_noise(true)
            .with_frame_interval(Duration::from_millis(200));
        publisher.connect_channel("simulator", Box::new(sim));
    } else {
        publisher.connect(&settings.connection)?;
    }
    publisher.start_reading()?;

    let started = Instant::now();
    let interval = settings.refresh_rate.interval();
    loop {
        publisher.pump();

        for event in events.try_iter() {
            match event {
                ReadingEvent::Frame { text } => {
                    println!("{:>12}  (reading {:.2})", text, publisher.latest_reading())
                }
                ReadingEvent::Status { message, is_error: true } => eprintln!("error: {}", message),
                ReadingEvent::Status { message, .. } => println!("-- {}", message),
                ReadingEvent::Warning { warning } => eprintln!("warning: {}", warning),
            }
        }

        if !publisher.is_reading() {
            bail!("read loop stopped");
        }
        if run_for.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        std::thread::sleep(interval);
    }

    publisher.disconnect();
    Ok(())
}

fn print_ports() {
    let ports = list_ports();
    if ports.is_empty() {
        println!("No serial ports found");
        return;
    }
    for port in ports {
        let usb = match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => format!(" [{:04x}:{:04x}]", vid, pid),
            _ => String::new(),
        };
        let product = port.product.as_deref().unwrap_or("");
        println!("{}{} {}", port.name, usb, product);
    }
}

fn print_help() {
    println!("Weighing indicator monitor");
    println!();
    println!("Usage: monitor [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -p, --port PORT       Serial port (default: from settings file)");
    println!("  -b, --baud RATE       Baud rate (default: from settings file)");
    println!("  -s, --settings PATH   Settings file");
    println!("      --demo            Use the simulated indicator");
    println!("  -l, --list            List serial ports and exit");
    println!("      --seconds N       Stop after N seconds");
    println!("  -h, --help            Show this help");
}
