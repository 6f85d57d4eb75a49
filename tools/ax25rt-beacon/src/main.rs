use std::sync::Arc;
use std::time::Duration;

use ax25app::adapter::PacketAdapter;
use ax25app::app::RadioApp;
use ax25app::beacon::{AprsBeacon, DEFAULT_COMMENT};
use ax25app::config::{StationConfig, parse_interval};
use ax25app::schedule::{CancelToken, PeriodicTask};
use ax25app::transport;
use ax25core::frame::Frame;
use ax25core::tnc::Framing;
use clap::Parser;

#[derive(Parser)]
#[command(about = "Send a numbered APRS status beacon at a fixed interval")]
struct Args {
    #[arg(short = 'd', help = "Serial device, or tcp:HOST:PORT for a network TNC")]
    device: String,
    #[arg(short = 'b', default_value = "38400", help = "Serial baud rate")]
    baud: u32,
    #[arg(short = 's', default_value = "NOCALL", help = "Source callsign, CALL[-SSID]")]
    source: String,
    #[arg(short = 't', default_value = "TLM100", help = "Destination callsign")]
    destination: String,
    #[arg(short = 'r', help = "Digipeater, may be repeated")]
    repeaters: Vec<String>,
    #[arg(short = 'i', default_value = "3", value_parser = parse_interval, help = "Seconds between beacons")]
    interval: Duration,
    #[arg(short = 'm', default_value = DEFAULT_COMMENT, help = "Text following the counter")]
    comment: String,
    #[arg(long, help = "Use hex text framing instead of HDLC")]
    hex: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = StationConfig {
        source: args.source,
        destination: args.destination,
        repeaters: args.repeaters,
        framing: if args.hex { Framing::HexText } else { Framing::Hdlc },
        beacon_interval: args.interval,
        ..Default::default()
    };
    if let Err(e) = run(&args.device, args.baud, &config, &args.comment) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run(device: &str, baud: u32, config: &StationConfig, comment: &str) -> Result<(), ax25app::error::RadioError> {
    config.validate()?;
    let link = transport::open(device, baud)?;
    let app = RadioApp::new(link, config)?;
    app.add_packet_adapter(FramePrinter);
    app.start()?;

    let cancel = CancelToken::new();
    let c = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || c.cancel()) {
        log::warn!("unable to install Ctrl-C handler: {e}");
    }

    println!("Beaconing every {:?} on {device}. Press Ctrl-C to quit.", config.beacon_interval);
    let tx = app.tx();
    let mut beacon = AprsBeacon::new(comment);
    let task = PeriodicTask::spawn("beacon", config.beacon_interval, cancel.clone(), move || {
        beacon.tick(&tx)
    })?;

    while !cancel.is_cancelled() && !task.is_finished() && app.is_running() {
        cancel.sleep(Duration::from_millis(200));
    }
    cancel.cancel();
    let result = task.join();
    app.close()?;
    result
}

struct FramePrinter;
impl PacketAdapter for FramePrinter {
    fn packet_received(&self, frame: Arc<Frame>) {
        println!("{frame}");
    }
}
