mod serial;

use anyhow::{Context, bail};
use clap::Parser;
use ds18b20::Ds18b20;
use std::time::Duration;
use uart_onewire::{OneWire, OneWireError, UartOneWireBuilder};

use crate::serial::SerialTransport;

/// Read DS18B20 temperature sensors on a 1-Wire bus driven by a serial port
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the serial port (e.g., /dev/ttyUSB0)
    #[arg(short, long)]
    path: String,
    /// How long to wait for the echo of each byte, in milliseconds
    #[arg(short, long, default_value_t = 50)]
    timeout: u64,
    /// Delay between polls of a running conversion, in milliseconds
    #[arg(long, default_value_t = 10)]
    poll_interval: u64,
    /// Give up on a conversion after this many milliseconds
    #[arg(long, default_value_t = 1000)]
    conversion_timeout: u64,
    /// Only read sensors in alarm state
    #[arg(short, long)]
    alarm_only: bool,
    /// Validate the scratchpad CRC of every reading
    #[arg(short, long)]
    check_crc: bool,
    /// Number of read cycles; 0 reads forever
    #[arg(short = 'n', long, default_value_t = 0)]
    cycles: u32,
    /// Pause between read cycles, in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    delay: u64,
}

fn main() -> anyhow::Result<()> {
    // Initialize the logger
    env_logger::init();
    // Parse command line arguments
    let args = Args::parse();
    // Open the serial port
    let port = SerialTransport::open(&args.path)
        .with_context(|| format!("Failed to open serial port {}", args.path))?;
    let mut bus = UartOneWireBuilder::default()
        .with_timeout(Duration::from_millis(args.timeout))
        .build(port)
        .context("Failed to set up the 1-Wire bus")?;
    let mut delay = linux_embedded_hal::Delay;
    // Enumerate devices on the 1-Wire bus
    let roms = bus
        .search(args.alarm_only)
        .context("Failed to enumerate devices")?;
    log::info!("Found {} devices", roms.len());
    for rom in roms.iter() {
        log::info!("  {rom:016x}");
    }
    let sensors: Vec<Ds18b20> = roms
        .into_iter()
        .filter(|&rom| rom as u8 == Ds18b20::FAMILY)
        .map(|rom| {
            Ds18b20::new(rom)
                .with_conversion_timeout(Duration::from_millis(args.conversion_timeout))
                .with_poll_interval(Duration::from_millis(args.poll_interval))
        })
        .collect();
    if sensors.is_empty() {
        bail!("No DS18B20 sensors on {}", args.path);
    }
    let mut cycle = 0;
    loop {
        for sensor in sensors.iter() {
            match sensor.read_temperature(&mut bus, &mut delay, args.check_crc) {
                Ok(temp) => println!("ROM: {:016x}, Temperature: {}", sensor.rom(), temp),
                Err(e @ (OneWireError::WiringFault | OneWireError::Other(_))) => {
                    return Err(e).context("Lost the 1-Wire bus");
                }
                Err(e) => log::error!("ROM: {:016x}: {}", sensor.rom(), e),
            }
        }
        cycle += 1;
        if args.cycles != 0 && cycle >= args.cycles {
            break;
        }
        std::thread::sleep(Duration::from_millis(args.delay));
    }
    Ok(())
}
