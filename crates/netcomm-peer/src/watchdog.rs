use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::event::{ConnectionEvent, EventHandler};

/// Stall timer for the frame currently being accumulated.
///
/// The receive loop calls [`arm`](Watchdog::arm) whenever the parser reports
/// a partial frame. Only the first call per frame starts a timer; later calls
/// for the same frame are ignored. Timers are never cancelled. When one
/// expires it reports `Interrupted` only if the frame it was armed for is
/// still the one in flight, so a frame that completes (or a loop that ends)
/// turns every pending timer into a no-op.
///
/// The staleness check and the `Interrupted` callback run under one lock,
/// which [`frame_completed`](Watchdog::frame_completed) and
/// [`disarm`](Watchdog::disarm) also take. Once either returns, no
/// `Interrupted` for the earlier frame can still be delivered.
#[derive(Debug)]
pub struct Watchdog {
    timeout: Duration,
    state: Arc<StallState>,
}

#[derive(Debug, Default)]
struct StallState {
    // Bumped on every frame completion and on loop termination.
    generation: AtomicU64,
    armed: AtomicBool,
    // Held while a timer reports and while the generation moves on.
    emit: Mutex<()>,
}

impl StallState {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.emit.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: Arc::new(StallState::default()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a timer is outstanding for the current frame.
    pub fn is_armed(&self) -> bool {
        self.state.armed.load(Ordering::Acquire)
    }

    /// Start the stall timer for the in-flight frame unless one is running.
    ///
    /// Returns `true` if a timer was started.
    pub fn arm(&self, remote: Option<SocketAddr>, handler: &EventHandler) -> bool {
        if self.state.armed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let generation = self.state.generation.load(Ordering::Acquire);
        let state = Arc::clone(&self.state);
        let handler = Arc::clone(handler);
        let timeout = self.timeout;

        let spawned = thread::Builder::new()
            .name("netcomm-watchdog".to_string())
            .spawn(move || {
                thread::sleep(timeout);
                let _emitting = state.lock();
                if state.is_current(generation) {
                    debug!(?remote, ?timeout, "frame stalled");
                    handler(ConnectionEvent::Interrupted { remote });
                }
            });

        if let Err(err) = spawned {
            warn!(error = %err, "failed to start watchdog thread");
            self.state.armed.store(false, Ordering::Release);
            return false;
        }
        true
    }

    /// The in-flight frame completed; pending timers become no-ops.
    pub fn frame_completed(&self) {
        let _emitting = self.state.lock();
        self.state.generation.fetch_add(1, Ordering::AcqRel);
        self.state.armed.store(false, Ordering::Release);
    }

    /// The receive loop ended; pending timers become no-ops and no new
    /// timer starts.
    pub fn disarm(&self) {
        let _emitting = self.state.lock();
        self.state.generation.fetch_add(1, Ordering::AcqRel);
        self.state.armed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(40);

    fn counting_handler() -> (EventHandler, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let handler: EventHandler = Arc::new(move |event| {
            assert!(matches!(event, ConnectionEvent::Interrupted { .. }));
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (handler, count)
    }

    #[test]
    fn fires_once_for_stalled_frame() {
        let (handler, count) = counting_handler();
        let watchdog = Watchdog::new(TIMEOUT);

        assert!(watchdog.arm(None, &handler));
        assert!(!watchdog.arm(None, &handler));
        assert!(!watchdog.arm(None, &handler));

        thread::sleep(TIMEOUT * 4);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn completed_frame_silences_timer() {
        let (handler, count) = counting_handler();
        let watchdog = Watchdog::new(TIMEOUT);

        watchdog.arm(None, &handler);
        watchdog.frame_completed();
        assert!(!watchdog.is_armed());

        thread::sleep(TIMEOUT * 4);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn next_frame_gets_its_own_timer() {
        let (handler, count) = counting_handler();
        let watchdog = Watchdog::new(TIMEOUT);

        watchdog.arm(None, &handler);
        watchdog.frame_completed();
        assert!(watchdog.arm(None, &handler));

        thread::sleep(TIMEOUT * 4);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn completion_waits_for_interrupted_in_flight() {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let handler: EventHandler = Arc::new(move |_| {
            let _ = entered_tx.send(());
            let _ = release_rx.lock().unwrap().recv();
        });
        let watchdog = Watchdog::new(Duration::from_millis(5));
        let completed = AtomicBool::new(false);

        assert!(watchdog.arm(None, &handler));
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        thread::scope(|scope| {
            scope.spawn(|| {
                watchdog.frame_completed();
                completed.store(true, Ordering::SeqCst);
            });
            thread::sleep(TIMEOUT);
            assert!(!completed.load(Ordering::SeqCst));
            release_tx.send(()).unwrap();
        });
        assert!(completed.load(Ordering::SeqCst));
    }

    #[test]
    fn disarm_blocks_new_timers() {
        let (handler, count) = counting_handler();
        let watchdog = Watchdog::new(TIMEOUT);

        watchdog.arm(None, &handler);
        watchdog.disarm();
        assert!(!watchdog.arm(None, &handler));

        thread::sleep(TIMEOUT * 4);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
