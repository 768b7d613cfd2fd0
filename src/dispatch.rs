//! UART line dispatcher: offers each inbound line to registered handlers,
//! in registration order, isolating one handler's failure from the rest.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::error;

/// A handler offered every inbound UART line. Implementations decide
/// whether a line is theirs via `can_handle`, a small `{can_handle, handle}`
/// capability trait object.
pub trait LineHandler: Send + Sync {
    fn can_handle(&self, line: &str) -> bool;
    fn handle(&self, line: &str);
}

#[derive(Default)]
pub struct LineDispatcher {
    handlers: Mutex<Vec<Arc<dyn LineHandler>>>,
    running: AtomicBool,
}

impl LineDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register_handler(&self, handler: Arc<dyn LineHandler>) {
        self.handlers.lock().unwrap().push(handler);
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Offer one inbound line to every registered handler, provided the
    /// dispatcher is currently started. A handler that panics is caught
    /// and logged; later handlers still see the line.
    pub fn dispatch(&self, line: &str) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let handlers: Vec<_> = self.handlers.lock().unwrap().clone();
        for handler in handlers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                if handler.can_handle(line) {
                    handler.handle(line);
                }
            }));
            if outcome.is_err() {
                error!(%line, "uart line handler panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recorder {
        prefix: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl LineHandler for Recorder {
        fn can_handle(&self, line: &str) -> bool {
            line.starts_with(self.prefix)
        }

        fn handle(&self, line: &str) {
            self.seen.lock().unwrap().push(line.to_string());
        }
    }

    struct Panicker;

    impl LineHandler for Panicker {
        fn can_handle(&self, _line: &str) -> bool {
            true
        }

        fn handle(&self, _line: &str) {
            panic!("boom");
        }
    }

    #[test]
    fn dispatch_before_start_is_a_noop() {
        let dispatcher = LineDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register_handler(Arc::new(Recorder {
            prefix: "",
            seen: seen.clone(),
        }));

        dispatcher.dispatch("Video Mute on");
        assert!(seen.lock().unwrap().is_empty());

        dispatcher.start();
        dispatcher.dispatch("Video Mute on");
        assert_eq!(*seen.lock().unwrap(), vec!["Video Mute on".to_string()]);

        dispatcher.stop();
        dispatcher.dispatch("Video Mute on");
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Video Mute on".to_string()],
            "no dispatch after stop"
        );
    }

    #[test]
    fn only_matching_handlers_receive_the_line() {
        let dispatcher = LineDispatcher::new();
        dispatcher.start();
        let seen_mute = Arc::new(Mutex::new(Vec::new()));
        let seen_power = Arc::new(Mutex::new(Vec::new()));

        dispatcher.register_handler(Arc::new(Recorder {
            prefix: "Video Mute",
            seen: seen_mute.clone(),
        }));
        dispatcher.register_handler(Arc::new(Recorder {
            prefix: "PORT_SW_INVERTER",
            seen: seen_power.clone(),
        }));

        dispatcher.dispatch("Video Mute on");
        dispatcher.dispatch("PORT_SW_INVERTER off");
        dispatcher.dispatch("unrelated line");

        assert_eq!(*seen_mute.lock().unwrap(), vec!["Video Mute on".to_string()]);
        assert_eq!(
            *seen_power.lock().unwrap(),
            vec!["PORT_SW_INVERTER off".to_string()]
        );
    }

    #[test]
    fn a_panicking_handler_does_not_stop_later_handlers() {
        let dispatcher = LineDispatcher::new();
        dispatcher.start();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        dispatcher.register_handler(Arc::new(Panicker));
        dispatcher.register_handler(Arc::new(Recorder {
            prefix: "",
            seen: Arc::new(Mutex::new(Vec::new())),
        }));
        // a closure-backed handler is simplest for counting
        struct Counter(Arc<AtomicUsize>);
        impl LineHandler for Counter {
            fn can_handle(&self, _line: &str) -> bool {
                true
            }
            fn handle(&self, _line: &str) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        dispatcher.register_handler(Arc::new(Counter(count_clone)));

        dispatcher.dispatch("Video Mute on");

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
