use std::time::Duration;

use ax25app::error::RadioError;
use ax25app::multiplexer::PacketMultiplexer;
use ax25app::schedule::CancelToken;
use ax25app::transport;
use ax25core::frame::DEFAULT_INFO_LEN;
use ax25core::tnc::{Framing, PacketKind};
use clap::Parser;

#[derive(Parser)]
#[command(about = "Print every AX.25 frame received on a link")]
struct Args {
    #[arg(short = 'd', help = "Serial device, or tcp:HOST:PORT for a network TNC")]
    device: String,
    #[arg(short = 'b', default_value = "38400", help = "Serial baud rate")]
    baud: u32,
    #[arg(short = 'c', default_value_t = DEFAULT_INFO_LEN, help = "Largest information field accepted")]
    capacity: usize,
    #[arg(long, help = "Use hex text framing instead of HDLC")]
    hex: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), RadioError> {
    let framing = if args.hex { Framing::HexText } else { Framing::Hdlc };
    let mut mux = PacketMultiplexer::new(args.capacity, framing);
    mux.set_fdin(transport::open(&args.device, args.baud)?);

    let cancel = CancelToken::new();
    let c = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || c.cancel()) {
        log::warn!("unable to install Ctrl-C handler: {e}");
    }

    while !cancel.is_cancelled() {
        match mux.poll()? {
            PacketKind::None => {
                cancel.sleep(Duration::from_millis(10));
            }
            PacketKind::Generic => println!("{}", mux.frame()),
            PacketKind::Ssdv => {
                if let Some(h) = mux.ssdv_header() {
                    println!(
                        "{}>{} SSDV image {} packet {} from {}, {} bytes",
                        mux.frame().dst(),
                        mux.frame().src(),
                        h.image_id,
                        h.packet_id,
                        h.callsign_text(),
                        mux.rx_len()
                    );
                }
            }
        }
    }

    let stats = mux.stats();
    println!(
        "{} frames decoded, {} rejected, {} SSDV, {} framing errors",
        stats.frames_decoded, stats.frames_rejected, stats.ssdv_packets, stats.framing_errors
    );
    mux.close()
}
