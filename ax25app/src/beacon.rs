use crate::app::TxHandle;
use crate::error::RadioError;

pub const DEFAULT_COMMENT: &str = "SolarPi APRS";

/// Periodic numbered status beacon.
///
/// Each message is `>Test NNNNN: <comment>`, the leading `>` making it an APRS status
/// report. The counter starts at 1 and belongs to the beacon, so a single task owning
/// it is enough to keep numbers unique.
#[derive(Debug, Clone)]
pub struct AprsBeacon {
    comment: String,
    count: u32,
}

impl AprsBeacon {
    pub fn new(comment: &str) -> Self {
        Self {
            comment: comment.to_owned(),
            count: 0,
        }
    }

    /// Number of messages produced so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn next_message(&mut self) -> String {
        self.count = self.count.wrapping_add(1);
        format!(">Test {:05}: {}", self.count, self.comment)
    }

    pub fn tick(&mut self, tx: &TxHandle) -> Result<(), RadioError> {
        let message = self.next_message();
        log::info!("beacon {message}");
        tx.transmit(message.as_bytes())
    }
}

impl Default for AprsBeacon {
    fn default() -> Self {
        Self::new(DEFAULT_COMMENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_messages() {
        let mut b = AprsBeacon::default();
        assert_eq!(b.next_message(), ">Test 00001: SolarPi APRS");
        assert_eq!(b.next_message(), ">Test 00002: SolarPi APRS");
        assert_eq!(b.count(), 2);
        let mut b = AprsBeacon::new("hello");
        for _ in 0..99_999 {
            b.next_message();
        }
        assert_eq!(b.next_message(), ">Test 100000: hello");
    }
}
