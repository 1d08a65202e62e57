use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::{info, warn};
use rppal::i2c::I2c;
use rppal::uart::Uart;

use rpenvmon::bme280::CHIP_ID;
use rpenvmon::channel::{DEFAULT_BUS_ADDRESS, DEFAULT_BUS_DEVICE, DEFAULT_SERIAL_DEVICE};
use rpenvmon::monitor::{self, Station};
use rpenvmon::{server, Bme280, BusConfig, MhZ19, Mode, SerialConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PowerMode {
    Forced,
    Normal,
}

impl From<PowerMode> for Mode {
    fn from(mode: PowerMode) -> Self {
        match mode {
            PowerMode::Forced => Mode::Forced,
            PowerMode::Normal => Mode::Normal,
        }
    }
}

#[derive(Parser)]
#[command(name = "rpenvmon")]
#[command(about = "Polls an MH-Z19 and a BME280 and serves the latest reading", long_about = None)]
struct Args {
    /// UART device the MH-Z19 is wired to
    #[arg(long, default_value = DEFAULT_SERIAL_DEVICE, env = "RPENVMON_SERIAL")]
    serial: PathBuf,

    /// I2C adapter the BME280 is wired to
    #[arg(long, default_value = DEFAULT_BUS_DEVICE, env = "RPENVMON_I2C")]
    i2c: PathBuf,

    /// BME280 slave address (0x76 or 0x77)
    #[arg(long, default_value_t = DEFAULT_BUS_ADDRESS, value_parser = parse_address, env = "RPENVMON_ADDRESS")]
    address: u16,

    /// BME280 power mode
    #[arg(long, value_enum, default_value_t = PowerMode::Forced)]
    mode: PowerMode,

    /// Seconds between samples
    #[arg(short, long, default_value_t = 5, env = "RPENVMON_INTERVAL")]
    interval: u64,

    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "RPENVMON_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080, env = "RPENVMON_PORT")]
    port: u16,

    /// Take one sample, print it and exit
    #[arg(long, default_value_t = false)]
    once: bool,
}

fn parse_address(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    match parsed {
        Ok(address) if address <= 0x7F => Ok(address),
        Ok(address) => Err(format!("{:#x} is not a 7-bit address", address)),
        Err(e) => Err(e.to_string()),
    }
}

fn open_station(
    serial: &SerialConfig,
    bus: &BusConfig,
    mode: Mode,
) -> anyhow::Result<Station<Uart, I2c>> {
    let co2 = MhZ19::new(serial.open()?);
    let mut bme280 = Bme280::new(bus.open()?, mode)
        .with_context(|| format!("failed to initialize bme280 on {}", bus.path.display()))?;
    let chip_id = bme280.chip_id()?;
    if chip_id == CHIP_ID {
        info!("bme280 chip id {:#04x}", chip_id);
    } else {
        warn!(
            "unexpected chip id {:#04x} on {}, expected {:#04x}",
            chip_id,
            bus.path.display(),
            CHIP_ID
        );
    }
    Ok(Station::new(co2, bme280))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let serial = SerialConfig::new(&args.serial);
    let bus = BusConfig::new(&args.i2c, args.address);
    let mode = Mode::from(args.mode);

    if args.once {
        let mut station = open_station(&serial, &bus, mode)?;
        let snapshot = station.sample()?;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        station.close()?;
        return Ok(());
    }

    let shared = monitor::shared_snapshot();
    let interval = Duration::from_secs(args.interval);
    {
        let shared = shared.clone();
        thread::Builder::new()
            .name("sensor-poller".to_string())
            .spawn(move || {
                monitor::run(move || open_station(&serial, &bus, mode), shared, interval)
            })
            .context("failed to spawn sensor poller")?;
    }

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.host, args.port))?;
    info!("serving readings on http://{} every {}s", addr, args.interval);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, server::create_router(shared)).await?;
    Ok(())
}
