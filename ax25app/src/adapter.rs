use std::sync::Arc;

use ax25core::frame::Frame;
use ax25core::ssdv::SsdvHeader;

use crate::app::TxHandle;

/// Receives every frame decoded by a `RadioApp`, generic and SSDV alike.
pub trait PacketAdapter: Send + Sync + 'static {
    fn adapter_registered(&self, id: usize, handle: TxHandle) {
        let _ = id;
        let _ = handle;
    }
    fn adapter_removed(&self) {}
    fn started(&self) {}
    fn closed(&self) {}
    fn packet_received(&self, frame: Arc<Frame>) {
        let _ = frame;
    }
}

/// Receives SSDV image fragments only.
///
/// `payload` is the information field after the SSDV header.
pub trait SsdvAdapter: Send + Sync + 'static {
    fn adapter_registered(&self, id: usize, handle: TxHandle) {
        let _ = id;
        let _ = handle;
    }
    fn adapter_removed(&self) {}
    fn started(&self) {}
    fn closed(&self) {}
    fn ssdv_received(&self, header: SsdvHeader, payload: Arc<[u8]>) {
        let _ = header;
        let _ = payload;
    }
}
