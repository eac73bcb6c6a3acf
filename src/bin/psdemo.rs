//! Command line front-end for PS/KEM sensors.
//!
//! Usage:
//!   psdemo net 10.0.8.86:1024 gver
//!   psdemo uart /dev/ttyUSB0 --baud 115200 gscn --count 10
//!   psdemo file scans.log gscn --count 10
//!   psdemo relay /dev/ttyUSB0 --listen 0.0.0.0:1024 --client 10.0.10.0:1025

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use psdemo::{
    DataStream, FileStream, ParameterInfo, PsDevice, PulseWidthDivisor, Relay, RelayConfig,
    Result, Scan, ScanStatistics, UartConfig, UartStream, UdpConfig, UdpStream,
    PS_DEFAULT_BAUD_RATE, PS_DEFAULT_SENSOR_PORT, PS_SCAN_START, PS_SCAN_STOP,
};
use std::fs::File;
use std::io::{self, BufRead};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Control client and relay for PS/KEM laser scanners.
#[derive(Parser)]
#[command(name = "psdemo", version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Talk to a sensor over UDP.
    Net {
        /// Sensor address, `ip` or `ip:port`.
        #[arg(value_parser = parse_sensor_addr)]
        sensor: SocketAddr,

        /// Local address to bind to.
        #[arg(long, default_value = "0.0.0.0:1025")]
        local: SocketAddr,

        /// Response timeout in seconds, 0 waits forever.
        #[arg(long, default_value_t = 10)]
        timeout: u64,

        /// File receiving the raw scan answers.
        #[arg(long)]
        data_log: Option<PathBuf>,

        #[command(subcommand)]
        command: SensorCommand,
    },

    /// Talk to a sensor over a serial line.
    Uart {
        /// Serial device, e.g. /dev/ttyUSB0.
        device: String,

        #[arg(long, default_value_t = PS_DEFAULT_BAUD_RATE)]
        baud: u32,

        /// Response timeout in seconds, 0 polls.
        #[arg(long, default_value_t = 10)]
        timeout: u64,

        /// File receiving the raw scan answers.
        #[arg(long)]
        data_log: Option<PathBuf>,

        #[command(subcommand)]
        command: SensorCommand,
    },

    /// Parse frames recorded with `--data-log`, offline.
    File {
        /// The recorded data log.
        path: PathBuf,

        #[command(subcommand)]
        command: SensorCommand,
    },

    /// Relay between a serial sensor and a UDP client, averaging GSC2 requests.
    Relay {
        /// Serial device of the sensor.
        device: String,

        #[arg(long, default_value_t = PS_DEFAULT_BAUD_RATE)]
        baud: u32,

        /// Local address the client sends its requests to.
        #[arg(long)]
        listen: SocketAddr,

        /// Address of the client.
        #[arg(long)]
        client: SocketAddr,

        /// Divisor of averaged pulse widths: `repeat` or `valid`.
        #[arg(long, default_value = "repeat")]
        pulse_width_divisor: PulseWidthDivisor,

        /// Poll timeout of both streams in milliseconds.
        #[arg(long, default_value_t = 20)]
        poll_ms: u64,
    },
}

#[derive(Subcommand)]
enum SensorCommand {
    /// Read the firmware version.
    Gver,
    /// Read a parameter.
    Gprm { id: i32 },
    /// Write a parameter.
    Sprm {
        id: i32,
        #[arg(allow_negative_numbers = true)]
        value: i32,
    },
    /// Describe a parameter.
    Gpin { id: i32 },
    /// Describe all parameters.
    Params,
    /// Start or stop the measurement: `start`, `stop` or a raw value.
    Scan {
        #[arg(value_parser = parse_scan_action, allow_negative_numbers = true)]
        action: i32,
    },
    /// Fetch scans.
    Gscn {
        /// Number of scans to fetch.
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Scan number, 0 for the latest.
        #[arg(long, default_value_t = 0)]
        number: i32,
    },
    /// Fetch an averaged scan.
    Gsc2 {
        scan_average: i32,
        point_average: i32,
    },
}

fn parse_sensor_addr(s: &str) -> std::result::Result<SocketAddr, String> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    s.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, PS_DEFAULT_SENSOR_PORT))
        .map_err(|e| format!("invalid sensor address '{}': {}", s, e))
}

fn parse_scan_action(s: &str) -> std::result::Result<i32, String> {
    match s {
        "start" => Ok(PS_SCAN_START),
        "stop" => Ok(PS_SCAN_STOP),
        other => other
            .parse::<i32>()
            .map_err(|_| format!("expected start, stop or a number, got '{}'", other)),
    }
}

fn timeout_of(seconds: u64) -> Option<Duration> {
    if seconds == 0 {
        None
    } else {
        Some(Duration::from_secs(seconds))
    }
}

fn print_info(info: &ParameterInfo) {
    println!(
        "{:4}: {:>10} [{} .. {}] {}",
        info.id, info.value, info.min, info.max, info.info
    );
}

fn print_scan(scan: &Scan, stats: &ScanStatistics) {
    println!(
        "scan {} at {:.3} s: {} points x {} echoes, {} valid, {} no echo, {} noise, {} lost",
        scan.scan_number(),
        scan.timestamp_s(),
        scan.number_of_points,
        scan.number_of_echoes,
        stats.valid,
        stats.no_echo,
        stats.noise,
        stats.lost_scans
    );
    for point in 0..scan.data.len().min(10) {
        if let Some(distance) = scan.distance_m(point, 0) {
            println!("  point {:4}: {:8.4} m", point, distance);
        }
    }
}

fn run_command<S>(stream: &mut S, command: SensorCommand, data_log: Option<PathBuf>) -> Result<()>
where
    S: DataStream + ?Sized,
{
    let mut log_file = match data_log {
        Some(path) => Some(File::create(path)?),
        None => None,
    };
    let mut device = PsDevice::new(stream);
    match command {
        SensorCommand::Gver => println!("{}", device.get_version()?),
        SensorCommand::Gprm { id } => println!("parameter {} = {}", id, device.get_parameter(id)?),
        SensorCommand::Sprm { id, value } => {
            let actual = device.set_parameter(id, value)?;
            println!("parameter {} set to {}", id, actual);
        }
        SensorCommand::Gpin { id } => print_info(&device.get_parameter_info(id)?),
        SensorCommand::Params => device.list_parameters()?.iter().for_each(print_info),
        SensorCommand::Scan { action } => {
            device.scan_with_parameter(action)?;
            println!("SCAN {} acknowledged", action);
        }
        SensorCommand::Gscn { count, number } => {
            let mut scan = Scan::new();
            let mut previous = None;
            for _ in 0..count {
                let log = log_file.as_mut().map(|f| f as &mut dyn io::Write);
                device.get_scan_into(number, &mut scan, log)?;
                let stats = ScanStatistics::from_scan(&scan, previous);
                print_scan(&scan, &stats);
                previous = Some(scan.scan_number());
            }
        }
        SensorCommand::Gsc2 {
            scan_average,
            point_average,
        } => {
            let mut scan = Scan::new();
            let log = log_file.as_mut().map(|f| f as &mut dyn io::Write);
            device.get_averaged_scan_into(scan_average, point_average, &mut scan, log)?;
            print_scan(&scan, &ScanStatistics::from_scan(&scan, None));
        }
    }
    Ok(())
}

fn with_open_stream<S, F>(stream: &mut S, f: F) -> Result<()>
where
    S: DataStream,
    F: FnOnce(&mut S) -> Result<()>,
{
    stream.open()?;
    let result = f(stream);
    if let Err(e) = stream.close() {
        warn!("Failed to close stream: {}", e);
    }
    result
}

/// Raises `stop` once the user types `q` or ESC followed by Enter.
fn spawn_stop_reader(stop: Arc<AtomicBool>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            let key = line.trim();
            if key.eq_ignore_ascii_case("q") || key.starts_with('\u{1b}') {
                stop.store(true, Ordering::Relaxed);
                break;
            }
        }
    });
}

fn run(cli: Cli) -> Result<()> {
    match cli.mode {
        Mode::Net {
            sensor,
            local,
            timeout,
            data_log,
            command,
        } => {
            info!("Sensor {}, local {}", sensor, local);
            let mut stream = UdpStream::new(UdpConfig {
                local,
                remote: sensor,
                timeout: timeout_of(timeout),
            });
            with_open_stream(&mut stream, |s| run_command(s, command, data_log))
        }
        Mode::Uart {
            device,
            baud,
            timeout,
            data_log,
            command,
        } => {
            info!("Sensor on {} at {} baud", device, baud);
            let mut stream = UartStream::new(UartConfig {
                path: device,
                baud_rate: baud,
                timeout: timeout_of(timeout),
            });
            with_open_stream(&mut stream, |s| run_command(s, command, data_log))
        }
        Mode::File { path, command } => {
            info!("Replaying {}", path.display());
            let mut stream = FileStream::new(path);
            with_open_stream(&mut stream, |s| run_command(s, command, None))
        }
        Mode::Relay {
            device,
            baud,
            listen,
            client,
            pulse_width_divisor,
            poll_ms,
        } => {
            let config = RelayConfig {
                poll_timeout: Duration::from_millis(poll_ms.max(1)),
                pulse_width_divisor,
            };
            // the relay sets its poll timeout on both streams
            let mut sensor = UartStream::new(UartConfig {
                path: device,
                baud_rate: baud,
                timeout: None,
            });
            let mut network = UdpStream::new(UdpConfig {
                local: listen,
                remote: client,
                timeout: None,
            });
            sensor.open()?;
            network.open()?;

            let stop = Arc::new(AtomicBool::new(false));
            spawn_stop_reader(stop.clone());
            info!(
                "Relaying {} <-> {} ({}), type q and Enter to stop",
                listen, client, pulse_width_divisor
            );
            let result = Relay::new(&mut sensor, &mut network, config).run(&stop);
            network.close()?;
            sensor.close()?;
            let stats = result?;
            info!(
                "{} frames to sensor, {} to client, {} averaged",
                stats.to_device, stats.to_client, stats.averaged
            );
            Ok(())
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            e.id().code()
        }
    };
    process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sensor_addresses_and_scan_actions() {
        assert_eq!(
            parse_sensor_addr("10.0.8.86").unwrap(),
            "10.0.8.86:1024".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_sensor_addr("10.0.8.86:2000").unwrap().port(),
            2000
        );
        assert!(parse_sensor_addr("sensor").is_err());
        assert_eq!(parse_scan_action("start"), Ok(1));
        assert_eq!(parse_scan_action("stop"), Ok(0));
        assert_eq!(parse_scan_action("-3"), Ok(-3));
        assert!(parse_scan_action("go").is_err());
    }

    #[test]
    fn parses_relay_arguments() {
        let cli = Cli::try_parse_from([
            "psdemo",
            "relay",
            "/dev/ttyUSB0",
            "--listen",
            "0.0.0.0:1024",
            "--client",
            "10.0.10.0:1025",
            "--pulse-width-divisor",
            "valid",
        ])
        .unwrap();
        match cli.mode {
            Mode::Relay {
                pulse_width_divisor,
                baud,
                ..
            } => {
                assert_eq!(pulse_width_divisor, PulseWidthDivisor::ValidSamples);
                assert_eq!(baud, PS_DEFAULT_BAUD_RATE);
            }
            _ => panic!("expected relay mode"),
        }
    }

    #[test]
    fn parses_file_mode() {
        let args = ["psdemo", "file", "scans.log", "gscn", "--count", "3"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.mode {
            Mode::File {
                path,
                command: SensorCommand::Gscn { count, .. },
            } => {
                assert_eq!(path, PathBuf::from("scans.log"));
                assert_eq!(count, 3);
            }
            _ => panic!("expected file mode"),
        }
    }

    #[test]
    fn failures_map_to_exit_codes() {
        assert_eq!(psdemo::Error::Timeout.id().code(), -2003);
    }
}
