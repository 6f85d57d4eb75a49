use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::RadioError;

/// Longest single sleep, so cancellation is noticed promptly even with long intervals.
const TICK: Duration = Duration::from_millis(50);

/// Shared flag asking loops and periodic tasks to stop.
///
/// Cloning gives another handle onto the same flag. Typically one clone is moved into
/// a Ctrl-C handler and the rest are handed to the workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` or until cancelled. Returns true if cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep((deadline - now).min(TICK));
        }
    }
}

/// A callback run on its own thread at a fixed interval until cancelled.
///
/// The first run happens immediately. If the callback fails the task stops and the
/// error is returned from `join`; the token is not touched, so other tasks carry on.
pub struct PeriodicTask {
    name: String,
    handle: JoinHandle<Result<(), RadioError>>,
}

impl PeriodicTask {
    pub fn spawn<F>(
        name: &str,
        interval: Duration,
        cancel: CancelToken,
        mut tick: F,
    ) -> Result<Self, RadioError>
    where
        F: FnMut() -> Result<(), RadioError> + Send + 'static,
    {
        let thread_name = name.to_owned();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let mut next = Instant::now();
                while !cancel.is_cancelled() {
                    if let Err(e) = tick() {
                        log::warn!("{thread_name} stopped: {e}");
                        return Err(e);
                    }
                    next += interval;
                    let now = Instant::now();
                    if next < now {
                        // fell behind, don't try to catch up with a burst
                        next = now;
                    }
                    if cancel.sleep(next - now) {
                        break;
                    }
                }
                log::debug!("{thread_name} cancelled");
                Ok(())
            })?;
        Ok(Self {
            name: name.to_owned(),
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to end. Unless the callback fails, this blocks until the token
    /// is cancelled.
    pub fn join(self) -> Result<(), RadioError> {
        match self.handle.join() {
            Ok(r) => r,
            Err(_) => {
                log::error!("task {} panicked", self.name);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_until_cancelled() {
        let cancel = CancelToken::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let task = PeriodicTask::spawn("counter", Duration::from_millis(10), cancel.clone(), move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        while count.load(Ordering::SeqCst) < 3 {
            thread::sleep(Duration::from_millis(5));
        }
        cancel.cancel();
        task.join().unwrap();
        let after = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after);
    }

    #[test]
    fn error_ends_task() {
        let cancel = CancelToken::new();
        let task = PeriodicTask::spawn("failing", Duration::from_millis(10), cancel.clone(), || {
            Err(RadioError::TransportClosed)
        })
        .unwrap();
        assert!(matches!(task.join(), Err(RadioError::TransportClosed)));
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn sleep_wakes_on_cancel() {
        let cancel = CancelToken::new();
        let c = cancel.clone();
        let start = Instant::now();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            c.cancel();
        });
        assert!(cancel.sleep(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
