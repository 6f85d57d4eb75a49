use std::path::PathBuf;
use std::time::Duration;

use ax25core::address::AddressField;
use ax25core::frame::{DEFAULT_INFO_LEN, Frame, MAX_REPEATERS};
use ax25core::ssdv::PACKET_LEN;
use ax25core::tnc::Framing;

use crate::error::RadioError;

/// Station identity and timing shared by the tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationConfig {
    /// Our callsign, `CALL[-SSID]`.
    pub source: String,
    pub destination: String,
    /// Digipeater path in order, each `CALL[-SSID][*]`.
    pub repeaters: Vec<String>,
    /// Largest information field sent or accepted.
    pub capacity: usize,
    pub framing: Framing,
    pub beacon_interval: Duration,
    pub ssdv_interval: Duration,
    /// Where received images are written.
    pub output_dir: PathBuf,
    /// Sleep between receive polls that found nothing.
    pub poll_interval: Duration,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            source: "NOCALL".to_owned(),
            destination: "TLM100".to_owned(),
            repeaters: vec![],
            capacity: DEFAULT_INFO_LEN,
            framing: Framing::Hdlc,
            beacon_interval: Duration::from_secs(3),
            ssdv_interval: Duration::from_secs(1),
            output_dir: PathBuf::from("."),
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl StationConfig {
    /// Check everything that would otherwise only fail at the first transmission.
    pub fn validate(&self) -> Result<(), RadioError> {
        if self.capacity < PACKET_LEN {
            return Err(RadioError::InvalidConfig(format!(
                "capacity {} cannot carry a {PACKET_LEN} byte SSDV packet",
                self.capacity
            )));
        }
        if self.repeaters.len() > MAX_REPEATERS {
            return Err(RadioError::InvalidConfig(format!(
                "{} repeaters given, at most {MAX_REPEATERS} allowed",
                self.repeaters.len()
            )));
        }
        if self.beacon_interval.is_zero() || self.ssdv_interval.is_zero() {
            return Err(RadioError::InvalidConfig("intervals must be non-zero".into()));
        }
        let mut frame = Frame::with_capacity(self.capacity);
        self.apply_to(&mut frame)
    }

    /// Set the addressing of `frame` from this configuration. Other fields are untouched.
    pub fn apply_to(&self, frame: &mut Frame) -> Result<(), RadioError> {
        parse_address(&self.source, frame.src_mut())?;
        parse_address(&self.destination, frame.dst_mut())?;
        frame.clear_repeaters();
        for r in &self.repeaters {
            let i = frame.add_repeater("")?;
            parse_address(r, frame.repeater_mut(i)?)?;
        }
        Ok(())
    }
}

/// Parse `CALL`, `CALL-SSID` or either with a trailing `*` into `field`.
pub fn parse_address(text: &str, field: &mut AddressField) -> Result<(), RadioError> {
    let text = text.trim();
    let (text, flag) = match text.strip_suffix('*') {
        Some(t) => (t, true),
        None => (text, false),
    };
    let (call, ssid) = match text.split_once('-') {
        Some((call, ssid)) => {
            let ssid = ssid
                .parse::<u8>()
                .map_err(|_| RadioError::InvalidConfig(format!("bad SSID in '{text}'")))?;
            (call, ssid)
        }
        None => (text, 0),
    };
    if call.is_empty() {
        return Err(RadioError::InvalidConfig("empty callsign".into()));
    }
    if let Some(c) = call.chars().find(|c| !c.is_ascii_alphanumeric()) {
        return Err(RadioError::InvalidConfig(format!(
            "character {c:?} not allowed in callsign '{call}'"
        )));
    }
    field.set_callsign(call);
    field.set_ssid(ssid)?;
    field.set_flag(flag);
    Ok(())
}

/// Parse a positive number of seconds such as `3` or `0.5`.
pub fn parse_interval(text: &str) -> Result<Duration, RadioError> {
    let secs: f64 = text
        .trim()
        .parse()
        .map_err(|_| RadioError::InvalidConfig(format!("'{text}' is not a number of seconds")))?;
    if !(secs > 0.0) {
        return Err(RadioError::InvalidConfig(format!("interval must be above zero, got '{text}'")));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| RadioError::InvalidConfig(format!("interval '{text}': {e}")))
}
