use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ax25core::frame::Frame;
use ax25core::Ax25Error;
use ax25core::tnc::{PacketKind, TncStats};

use crate::adapter::{PacketAdapter, SsdvAdapter};
use crate::config::StationConfig;
use crate::error::RadioError;
use crate::multiplexer::PacketMultiplexer;
use crate::schedule::CancelToken;
use crate::transport::Transport;

/// Runs a link on two threads and fans received packets out to adapters.
///
/// The reader thread owns one transport handle and polls it until the app is closed
/// or the link fails.
/// The writer thread owns the other handle together with the transmit frame and is the
/// only place anything is sent from, so periodic tasks never race each other. They
/// enqueue payloads through a `TxHandle`.
pub struct RadioApp {
    adapters: Arc<RwLock<Adapters>>,
    event_tx: mpsc::SyncSender<TxEvent>,
    capacity: usize,
    cancel: CancelToken,
    stats: Arc<RwLock<TncStats>>,
    reader: Option<JoinHandle<Result<(), RadioError>>>,
    writer: Option<JoinHandle<Result<(), RadioError>>>,
}

impl RadioApp {
    pub fn new<T: Transport>(mut transport: T, config: &StationConfig) -> Result<Self, RadioError> {
        let write_transport = transport.try_clone()?;

        let mut writer_mux = PacketMultiplexer::new(config.capacity, config.framing);
        config.apply_to(writer_mux.tx_frame_mut())?;
        writer_mux.set_fdout(write_transport);

        let mut reader_mux = PacketMultiplexer::new(config.capacity, config.framing);
        reader_mux.set_fdin(transport);

        let (event_tx, event_rx) = mpsc::sync_channel(128);
        let adapters = Arc::new(RwLock::new(Adapters::new()));
        let cancel = CancelToken::new();
        let stats = Arc::new(RwLock::new(TncStats::default()));
        let reader = spawn_reader(
            reader_mux,
            adapters.clone(),
            cancel.clone(),
            stats.clone(),
            event_tx.clone(),
            config.poll_interval,
        )?;
        let writer = match spawn_writer(writer_mux, event_rx, adapters.clone()) {
            Ok(writer) => writer,
            Err(e) => {
                cancel.cancel();
                let _ = join_thread(Some(reader));
                return Err(e);
            }
        };
        Ok(Self {
            adapters,
            event_tx,
            capacity: config.capacity,
            cancel,
            stats,
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    pub fn add_packet_adapter<P: PacketAdapter>(&self, adapter: P) -> usize {
        let adapter = Arc::new(adapter);
        let mut adapters = self.adapters.write().unwrap_or_else(PoisonError::into_inner);
        let id = adapters.next;
        adapters.next += 1;
        adapters.packet.insert(id, adapter.clone());
        drop(adapters);
        adapter.adapter_registered(id, self.tx());
        id
    }

    pub fn add_ssdv_adapter<S: SsdvAdapter>(&self, adapter: S) -> usize {
        self.add_shared_ssdv_adapter(Arc::new(adapter))
    }

    /// Register an adapter the caller keeps a reference to, e.g. to read its counters.
    pub fn add_shared_ssdv_adapter<S: SsdvAdapter>(&self, adapter: Arc<S>) -> usize {
        let mut adapters = self.adapters.write().unwrap_or_else(PoisonError::into_inner);
        let id = adapters.next;
        adapters.next += 1;
        adapters.ssdv.insert(id, adapter.clone());
        drop(adapters);
        adapter.adapter_registered(id, self.tx());
        id
    }

    pub fn remove_packet_adapter(&self, id: usize) {
        let removed = self
            .adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .packet
            .remove(&id);
        if let Some(a) = removed {
            a.adapter_removed();
        }
    }

    pub fn remove_ssdv_adapter(&self, id: usize) {
        let removed = self
            .adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .ssdv
            .remove(&id);
        if let Some(a) = removed {
            a.adapter_removed();
        }
    }

    /// Create a handle that can be used to transmit on this link.
    pub fn tx(&self) -> TxHandle {
        TxHandle {
            event_tx: self.event_tx.clone(),
            capacity: self.capacity,
        }
    }

    /// Token that stops the reader when cancelled. `close` cancels it too, and so does
    /// the reader itself when the link fails.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// False once either thread has stopped, which before `close` means the link
    /// failed. `close` then returns the error.
    pub fn is_running(&self) -> bool {
        [&self.reader, &self.writer]
            .iter()
            .all(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
    }

    /// Receive counters as of the latest poll.
    pub fn stats(&self) -> TncStats {
        *self.stats.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start(&self) -> Result<(), RadioError> {
        self.event_tx
            .send(TxEvent::Start)
            .map_err(|_| RadioError::TransportClosed)
    }

    /// Stop both threads and close the transport.
    ///
    /// Everything queued before the call is still sent. Returns once the link has been
    /// released and adapters have been told, with the error that stopped either
    /// thread, if any.
    pub fn close(mut self) -> Result<(), RadioError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), RadioError> {
        self.cancel.cancel();
        // no dispatch may be in flight once adapters hear about the close
        let reader = join_thread(self.reader.take());
        let _ = self.event_tx.send(TxEvent::Close);
        let writer = join_thread(self.writer.take());
        let (packet, ssdv) = Adapters::snapshot(&self.adapters);
        packet.iter().for_each(|a| a.closed());
        ssdv.iter().for_each(|a| a.closed());
        reader.and(writer)
    }
}

impl Drop for RadioApp {
    fn drop(&mut self) {
        if self.reader.is_some() || self.writer.is_some() {
            if let Err(e) = self.shutdown() {
                log::warn!("radio stopped with error: {e}");
            }
        }
    }
}

fn join_thread(handle: Option<JoinHandle<Result<(), RadioError>>>) -> Result<(), RadioError> {
    match handle.map(JoinHandle::join) {
        None => Ok(()),
        Some(Ok(result)) => result,
        Some(Err(_)) => {
            log::error!("radio thread panicked");
            Err(RadioError::TransportClosed)
        }
    }
}

/// Cheap cloneable sender feeding the writer thread.
#[derive(Clone)]
pub struct TxHandle {
    event_tx: mpsc::SyncSender<TxEvent>,
    capacity: usize,
}

impl TxHandle {
    /// Queue `payload` for transmission in the configured frame.
    ///
    /// Oversize payloads are rejected here rather than on the writer thread. Blocks
    /// only when the queue is full.
    pub fn transmit(&self, payload: &[u8]) -> Result<(), RadioError> {
        if payload.len() > self.capacity {
            return Err(Ax25Error::CapacityExceeded {
                requested: payload.len(),
                capacity: self.capacity,
            }
            .into());
        }
        self.event_tx
            .send(TxEvent::Payload(payload.to_vec()))
            .map_err(|_| RadioError::TransportClosed)
    }

    /// Queue a complete frame with its own addressing.
    pub fn transmit_frame(&self, frame: &Frame) -> Result<(), RadioError> {
        if frame.infolen() > self.capacity {
            return Err(Ax25Error::CapacityExceeded {
                requested: frame.infolen(),
                capacity: self.capacity,
            }
            .into());
        }
        self.event_tx
            .send(TxEvent::Frame(Box::new(frame.clone())))
            .map_err(|_| RadioError::TransportClosed)
    }
}

/// Synchronised structure for adapters subscribing to received traffic.
///
/// Each adapter will be notified in turn of each event.
struct Adapters {
    /// Identifier to be assigned to the next adapter, starting from 0
    next: usize,
    packet: HashMap<usize, Arc<dyn PacketAdapter>>,
    ssdv: HashMap<usize, Arc<dyn SsdvAdapter>>,
}

impl Adapters {
    fn new() -> Self {
        Self {
            next: 0,
            packet: HashMap::new(),
            ssdv: HashMap::new(),
        }
    }

    fn snapshot(lock: &RwLock<Adapters>) -> (Vec<Arc<dyn PacketAdapter>>, Vec<Arc<dyn SsdvAdapter>>) {
        let adapters = lock.read().unwrap_or_else(PoisonError::into_inner);
        (
            adapters.packet.values().cloned().collect(),
            adapters.ssdv.values().cloned().collect(),
        )
    }
}

/// Carries a request from `RadioApp` or a `TxHandle` to the writer thread.
enum TxEvent {
    Payload(Vec<u8>),
    Frame(Box<Frame>),
    Start,
    Close,
}

fn spawn_reader<T: Transport>(
    mut mux: PacketMultiplexer<T>,
    adapters: Arc<RwLock<Adapters>>,
    cancel: CancelToken,
    stats: Arc<RwLock<TncStats>>,
    event_tx: mpsc::SyncSender<TxEvent>,
    poll_interval: Duration,
) -> Result<JoinHandle<Result<(), RadioError>>, RadioError> {
    let handle = thread::Builder::new()
        .name("radio-reader".into())
        .spawn(move || {
            let mut result = Ok(());
            while !cancel.is_cancelled() {
                let kind = match mux.poll() {
                    Ok(kind) => kind,
                    Err(e) => {
                        log::warn!("receive stopped: {e}");
                        // take the writer and any periodic tasks down with us
                        cancel.cancel();
                        let _ = event_tx.send(TxEvent::Close);
                        result = Err(e);
                        break;
                    }
                };
                *stats.write().unwrap_or_else(PoisonError::into_inner) = mux.stats();
                if kind == PacketKind::None {
                    cancel.sleep(poll_interval);
                    continue;
                }
                dispatch(&mux, kind, &adapters);
            }
            if let Err(e) = mux.close() {
                log::debug!("closing receive side: {e}");
            }
            result
        })?;
    Ok(handle)
}

fn dispatch<T: Transport>(mux: &PacketMultiplexer<T>, kind: PacketKind, adapters: &RwLock<Adapters>) {
    let (packet, ssdv) = Adapters::snapshot(adapters);
    if !packet.is_empty() {
        let frame = Arc::new(mux.frame().clone());
        for a in packet {
            a.packet_received(frame.clone());
        }
    }
    if kind == PacketKind::Ssdv {
        let Some(header) = mux.ssdv_header() else {
            return;
        };
        let payload: Arc<[u8]> = Arc::from(mux.payload());
        for a in ssdv {
            a.ssdv_received(header.clone(), payload.clone());
        }
    }
}

fn spawn_writer<T: Transport>(
    mut mux: PacketMultiplexer<T>,
    event_rx: mpsc::Receiver<TxEvent>,
    adapters: Arc<RwLock<Adapters>>,
) -> Result<JoinHandle<Result<(), RadioError>>, RadioError> {
    let handle = thread::Builder::new()
        .name("radio-writer".into())
        .spawn(move || {
            let mut outcome = Ok(());
            while let Ok(ev) = event_rx.recv() {
                let result = match ev {
                    TxEvent::Payload(p) => mux.write(&p).map(|_| ()),
                    TxEvent::Frame(f) => mux.send(&f),
                    TxEvent::Start => {
                        let (packet, ssdv) = Adapters::snapshot(&adapters);
                        packet.iter().for_each(|a| a.started());
                        ssdv.iter().for_each(|a| a.started());
                        Ok(())
                    }
                    TxEvent::Close => break,
                };
                if let Err(e) = result {
                    log::warn!("transmit failed: {e}");
                    if matches!(e, RadioError::Io(_)) {
                        outcome = Err(e);
                        break;
                    }
                }
            }
            if let Err(e) = mux.close() {
                log::debug!("closing transmit side: {e}");
            }
            outcome
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reassembler::{ReassemblerAdapter, SsdvReassembler};
    use crate::test_util::{MemoryStore, PipeTransport, ssdv_packet};
    use ax25core::ssdv::SsdvHeader;
    use ax25core::tnc::Framing;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct Collector {
        frames: Mutex<Vec<String>>,
        lifecycle: Mutex<Vec<&'static str>>,
    }

    impl PacketAdapter for Arc<Collector> {
        fn started(&self) {
            self.lifecycle.lock().unwrap().push("started");
        }
        fn closed(&self) {
            self.lifecycle.lock().unwrap().push("closed");
        }
        fn packet_received(&self, frame: Arc<Frame>) {
            self.frames.lock().unwrap().push(frame.to_string());
        }
    }

    #[derive(Default)]
    struct SlowSsdv {
        events: Mutex<Vec<&'static str>>,
    }

    impl SsdvAdapter for Arc<SlowSsdv> {
        fn ssdv_received(&self, _header: SsdvHeader, _payload: Arc<[u8]>) {
            self.events.lock().unwrap().push("begin");
            thread::sleep(Duration::from_millis(300));
            self.events.lock().unwrap().push("end");
        }
        fn closed(&self) {
            self.events.lock().unwrap().push("closed");
        }
    }

    fn wait_for(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn loopback_dispatch() {
        let link = PipeTransport::new();
        let app = RadioApp::new(link.clone(), &StationConfig::default()).unwrap();
        let collector = Arc::new(Collector::default());
        app.add_packet_adapter(collector.clone());
        let store = MemoryStore::default();
        let reassembler = Arc::new(ReassemblerAdapter::new(SsdvReassembler::new(store.clone())));
        app.add_shared_ssdv_adapter(reassembler.clone());
        app.start().unwrap();

        let tx = app.tx();
        tx.transmit(b">Test 00001: hello").unwrap();
        for (image, packet) in [(1, 0), (2, 0), (1, 1)] {
            tx.transmit(&ssdv_packet(image, packet)).unwrap();
        }
        wait_for(|| reassembler.stats().packets == 3);
        assert_eq!(collector.frames.lock().unwrap()[0], "TLM100>NOCALL:>Test 00001: hello");
        assert_eq!(collector.frames.lock().unwrap().len(), 4);
        let ids: Vec<u8> = store.streams().iter().map(|s| s.image_id).collect();
        assert_eq!(ids, vec![1, 2, 1]);
        assert_eq!(app.stats().ssdv_packets, 3);

        app.close().unwrap();
        assert!(link.is_closed());
        assert_eq!(*collector.lifecycle.lock().unwrap(), vec!["started", "closed"]);
        // open stream flushed and released on close
        assert!(store.streams().iter().all(|s| s.closed));
    }

    #[test]
    fn close_waits_for_dispatch_in_progress() {
        let app = RadioApp::new(PipeTransport::new(), &StationConfig::default()).unwrap();
        let slow = Arc::new(SlowSsdv::default());
        app.add_ssdv_adapter(slow.clone());
        app.tx().transmit(&ssdv_packet(1, 0)).unwrap();
        wait_for(|| !slow.events.lock().unwrap().is_empty());
        app.close().unwrap();
        assert_eq!(*slow.events.lock().unwrap(), vec!["begin", "end", "closed"]);
    }

    #[test]
    fn link_failure_reported() {
        let link = PipeTransport::new();
        let app = RadioApp::new(link.clone(), &StationConfig::default()).unwrap();
        let tx = app.tx();
        assert!(app.is_running());
        link.fail_reads();
        wait_for(|| !app.is_running());
        assert!(app.cancel_token().is_cancelled());
        assert!(matches!(tx.transmit(b"anyone there"), Err(RadioError::TransportClosed)));
        assert!(matches!(app.close(), Err(RadioError::Io(_))));
    }

    #[test]
    fn oversize_rejected_synchronously() {
        let app = RadioApp::new(PipeTransport::new(), &StationConfig::default()).unwrap();
        assert!(matches!(
            app.tx().transmit(&[0u8; 300]),
            Err(RadioError::Frame(Ax25Error::CapacityExceeded { .. }))
        ));
        app.close().unwrap();
    }

    #[test]
    fn handle_outlives_app() {
        let app = RadioApp::new(PipeTransport::new(), &StationConfig::default()).unwrap();
        let tx = app.tx();
        app.close().unwrap();
        assert!(matches!(tx.transmit(b"late"), Err(RadioError::TransportClosed)));
    }

    #[test]
    fn injected_frames_received() {
        let link = PipeTransport::new();
        let config = StationConfig {
            framing: Framing::HexText,
            ..Default::default()
        };
        let app = RadioApp::new(link.clone(), &config).unwrap();
        let collector = Arc::new(Collector::default());
        app.add_packet_adapter(collector.clone());

        let mut remote: PacketMultiplexer<PipeTransport> = PacketMultiplexer::new(256, Framing::HexText);
        let mut sink = PipeTransport::new();
        remote.set_fdout(sink.clone());
        remote.tx_frame_mut().src_mut().set_callsign("F4ABC");
        remote.tx_frame_mut().dst_mut().set_callsign("APRS");
        remote.write(b"!4903.50N/07201.75W-").unwrap();
        let mut wire = vec![0u8; 512];
        let n = std::io::Read::read(&mut sink, &mut wire).unwrap();
        link.inject(b"noise\r\n");
        link.inject(&wire[..n]);

        wait_for(|| !collector.frames.lock().unwrap().is_empty());
        assert_eq!(collector.frames.lock().unwrap()[0], "APRS>F4ABC:!4903.50N/07201.75W-");
        app.close().unwrap();
    }
}
