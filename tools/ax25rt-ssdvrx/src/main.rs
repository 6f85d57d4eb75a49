use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ax25app::adapter::SsdvAdapter;
use ax25app::app::RadioApp;
use ax25app::config::StationConfig;
use ax25app::error::RadioError;
use ax25app::reassembler::{DirStore, ReassemblerAdapter, SsdvReassembler};
use ax25app::schedule::CancelToken;
use ax25app::transport;
use ax25core::ssdv::SsdvHeader;
use ax25core::tnc::Framing;
use clap::Parser;

#[derive(Parser)]
#[command(about = "Receive SSDV packets and store each image as rxNNN.sdv")]
struct Args {
    #[arg(short = 'd', help = "Serial device, or tcp:HOST:PORT for a network TNC")]
    device: String,
    #[arg(short = 'b', default_value = "38400", help = "Serial baud rate")]
    baud: u32,
    #[arg(short = 'o', default_value = ".", help = "Directory for received images")]
    output: PathBuf,
    #[arg(long, help = "Store complete packets, header included, for the ssdv decoder")]
    full_packets: bool,
    #[arg(long, help = "Use hex text framing instead of HDLC")]
    hex: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let config = StationConfig {
        framing: if args.hex { Framing::HexText } else { Framing::Hdlc },
        output_dir: args.output,
        ..Default::default()
    };
    if let Err(e) = run(&args.device, args.baud, &config, args.full_packets) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run(device: &str, baud: u32, config: &StationConfig, full_packets: bool) -> Result<(), RadioError> {
    let store = DirStore::new(&config.output_dir)?;
    let reassembler = Arc::new(ReassemblerAdapter::new(
        SsdvReassembler::new(store).with_full_packets(full_packets),
    ));

    let link = transport::open(device, baud)?;
    let app = RadioApp::new(link, config)?;
    app.add_ssdv_adapter(PacketPrinter);
    app.add_shared_ssdv_adapter(reassembler.clone());
    app.start()?;

    let cancel = CancelToken::new();
    let c = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || c.cancel()) {
        log::warn!("unable to install Ctrl-C handler: {e}");
    }
    println!(
        "Receiving on {device}, writing to {}. Press Ctrl-C to quit.",
        config.output_dir.display()
    );
    while app.is_running() && !cancel.sleep(Duration::from_millis(200)) {}

    let closed = app.close();
    let stats = reassembler.stats();
    println!(
        "{} packets, {} bytes, {} streams opened",
        stats.packets, stats.bytes, stats.streams_opened
    );
    closed
}

struct PacketPrinter;
impl SsdvAdapter for PacketPrinter {
    fn ssdv_received(&self, header: SsdvHeader, _payload: Arc<[u8]>) {
        println!(
            "Rx Packet {}-{} from {}",
            header.image_id,
            header.packet_id,
            header.callsign_text()
        );
    }
}
