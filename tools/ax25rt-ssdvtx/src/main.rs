use std::path::PathBuf;
use std::time::Duration;

use ax25app::app::RadioApp;
use ax25app::config::{StationConfig, parse_interval};
use ax25app::error::RadioError;
use ax25app::schedule::{CancelToken, PeriodicTask};
use ax25app::ssdv_tx::{SsdvCommandEncoder, SsdvTransmitter};
use ax25app::transport;
use ax25core::tnc::Framing;
use clap::Parser;

#[derive(Parser)]
#[command(about = "Encode JPEG images with ssdv and transmit them one packet per tick")]
struct Args {
    #[arg(short = 'd', help = "Serial device, or tcp:HOST:PORT for a network TNC")]
    device: String,
    #[arg(short = 'b', default_value = "38400", help = "Serial baud rate")]
    baud: u32,
    #[arg(short = 's', default_value = "NOCALL", help = "Source callsign, also embedded in SSDV packets")]
    source: String,
    #[arg(short = 't', default_value = "TLM100", help = "Destination callsign")]
    destination: String,
    #[arg(short = 'r', help = "Digipeater, may be repeated")]
    repeaters: Vec<String>,
    #[arg(short = 'i', default_value = "1", value_parser = parse_interval, help = "Seconds between packets")]
    interval: Duration,
    #[arg(short = 'w', default_value = ".", help = "Directory for encoded txNNN.sdv files")]
    work_dir: PathBuf,
    #[arg(long, default_value = "ssdv", help = "SSDV encoder program")]
    encoder: PathBuf,
    #[arg(long, default_value = "0", help = "Image id of the first image")]
    first_id: u8,
    #[arg(long, help = "Use hex text framing instead of HDLC")]
    hex: bool,
    #[arg(required = true, help = "JPEG images, sent in rotation")]
    images: Vec<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let config = StationConfig {
        source: args.source.clone(),
        destination: args.destination.clone(),
        repeaters: args.repeaters.clone(),
        framing: if args.hex { Framing::HexText } else { Framing::Hdlc },
        ssdv_interval: args.interval,
        ..Default::default()
    };
    if let Err(e) = run(&args, &config) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &Args, config: &StationConfig) -> Result<(), RadioError> {
    config.validate()?;
    // SSDV callsigns carry no SSID
    let callsign = args.source.split('-').next().unwrap_or_default();
    let encoder = SsdvCommandEncoder::new(callsign, args.images.clone(), &args.work_dir)
        .with_program(&args.encoder);
    let mut transmitter = SsdvTransmitter::starting_at(encoder, args.first_id);

    let link = transport::open(&args.device, args.baud)?;
    let app = RadioApp::new(link, config)?;
    app.start()?;

    let cancel = CancelToken::new();
    let c = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || c.cancel()) {
        log::warn!("unable to install Ctrl-C handler: {e}");
    }

    println!("Sending {} image(s) on {}. Press Ctrl-C to quit.", args.images.len(), args.device);
    let tx = app.tx();
    let task = PeriodicTask::spawn("ssdv-tx", config.ssdv_interval, cancel.clone(), move || {
        transmitter.tick(&tx)
    })?;

    while !cancel.is_cancelled() && !task.is_finished() && app.is_running() {
        cancel.sleep(Duration::from_millis(200));
    }
    cancel.cancel();
    let result = task.join();
    app.close()?;
    result
}
