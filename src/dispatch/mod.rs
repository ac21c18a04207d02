//! Command-keyed fan-out of decoded responses.
//!
//! The [`CommandDispatcher`] holds an append-only, ordered list of [`RespHandler`]s.
//! Every intercepted [`Envelope`] is decoded once and handed to each handler bound to
//! its command, in registration order. A payload that fails to decode is still routed,
//! with `None` in place of the tree. Handler errors and panics are contained: they are
//! logged with the handler's name, recorded in the [`DispatchReport`], and the
//! remaining handlers run.
//!
//! Registration takes `&self`, so handlers can be added at different init times while
//! other threads dispatch.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use wirescope::dispatch::{CommandDispatcher, Envelope};
//!
//! let dispatcher = CommandDispatcher::default();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! dispatcher.register_fn("X", "count", move |tree, _| {
//!     assert!(tree.is_some());
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! });
//!
//! let report = dispatcher.dispatch(&Envelope::push("X", vec![0x08, 0x01]));
//! assert_eq!(report.invoked, 1);
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

mod envelope;
mod handler;

pub use envelope::{Envelope, InboundRecord, OutboundRecord};
pub use handler::{FnHandler, RespHandler};

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::{config::DecodeConfig, tree::TreeValue, wire, Error, Result};

/// Outcome of one dispatch.
#[derive(Debug)]
pub struct DispatchReport {
    /// The command that was dispatched
    pub command: String,
    /// The decoded tree, `None` if decoding failed
    pub tree: Option<TreeValue>,
    /// Why decoding failed
    pub decode_error: Option<Error>,
    /// Number of handlers that ran to completion
    pub invoked: usize,
    /// Names of handlers that returned an error or panicked, in invocation order
    pub failed: Vec<String>,
}

impl DispatchReport {
    /// Returns `true` if the payload decoded into a tree.
    #[must_use]
    pub fn decoded(&self) -> bool {
        self.tree.is_some()
    }
}

/// Ordered, append-only handler registry.
pub struct CommandDispatcher {
    handlers: boxcar::Vec<Arc<dyn RespHandler>>,
    decode: DecodeConfig,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(DecodeConfig::default())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl CommandDispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new(decode: DecodeConfig) -> Self {
        CommandDispatcher {
            handlers: boxcar::Vec::new(),
            decode,
        }
    }

    /// Append a handler; returns its registration index.
    pub fn register(&self, handler: Arc<dyn RespHandler>) -> usize {
        log::debug!(
            "[dispatch] registered '{}' for {}",
            handler.name(),
            handler.command()
        );
        self.handlers.push(handler)
    }

    /// Append a closure handler; returns its registration index.
    pub fn register_fn<F>(&self, command: &str, name: &str, callback: F) -> usize
    where
        F: Fn(Option<&TreeValue>, &Envelope) -> Result<()> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnHandler::new(command, name, callback)))
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.count()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the handlers bound to `command`, in registration order.
    #[must_use]
    pub fn handlers_for(&self, command: &str) -> Vec<String> {
        self.handlers
            .iter()
            .filter(|(_, handler)| handler.command() == command)
            .map(|(_, handler)| handler.name().to_string())
            .collect()
    }

    /// Decode an envelope's payload and run every handler bound to its command.
    pub fn dispatch(&self, envelope: &Envelope) -> DispatchReport {
        let command = envelope.command();
        let (tree, decode_error) = match wire::decode_with(envelope.inbound.unpacked(), &self.decode)
        {
            Ok(tree) => (Some(tree), None),
            Err(error) => {
                log::debug!("[dispatch] {command}: payload not decodable: {error}");
                (None, Some(error))
            }
        };

        let mut report = DispatchReport {
            command: command.to_string(),
            tree,
            decode_error,
            invoked: 0,
            failed: Vec::new(),
        };

        for (_, handler) in self.handlers.iter() {
            if handler.command() != command {
                continue;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                handler.on_handle(report.tree.as_ref(), envelope)
            }));
            match outcome {
                Ok(Ok(())) => report.invoked += 1,
                Ok(Err(error)) => {
                    log::error!("[dispatch] handler '{}' on {command} failed: {error}", handler.name());
                    report.failed.push(handler.name().to_string());
                }
                Err(payload) => {
                    log::error!(
                        "[dispatch] handler '{}' on {command} panicked: {}",
                        handler.name(),
                        panic_message(payload.as_ref())
                    );
                    report.failed.push(handler.name().to_string());
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> impl Fn(Option<&TreeValue>, &Envelope) -> Result<()> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |tree, _| {
            log.lock().unwrap().push(format!("{label}:{}", tree.is_some()));
            Ok(())
        }
    }

    #[test]
    fn handlers_run_in_order_despite_failures() {
        let dispatcher = CommandDispatcher::default();
        let log = Arc::new(Mutex::new(Vec::new()));

        dispatcher.register_fn("X", "h1", recorder(&log, "h1"));
        dispatcher.register_fn("X", "h2", |_, _| Err(Error::Error("boom".into())));
        dispatcher.register_fn("X", "h2b", |_, _| panic!("boom"));
        dispatcher.register_fn("Y", "other", recorder(&log, "other"));
        dispatcher.register_fn("X", "h3", recorder(&log, "h3"));

        let report = dispatcher.dispatch(&Envelope::push("X", vec![0x08, 0x96, 0x01]));
        assert!(report.decoded());
        assert_eq!(report.invoked, 2);
        assert_eq!(report.failed, ["h2", "h2b"]);
        assert_eq!(*log.lock().unwrap(), ["h1:true", "h3:true"]);
        assert_eq!(dispatcher.handlers_for("X"), ["h1", "h2", "h2b", "h3"]);
        assert_eq!(dispatcher.len(), 5);
    }

    #[test]
    fn undecodable_payload_routes_none() {
        let dispatcher = CommandDispatcher::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register_fn("X", "h1", recorder(&log, "h1"));

        // field 1, length-delimited, declares 5 bytes but carries 1
        let report = dispatcher.dispatch(&Envelope::push("X", vec![0x0A, 0x05, 0x41]));
        assert!(!report.decoded());
        assert!(report.decode_error.as_ref().is_some_and(Error::is_decode_error));
        assert_eq!(*log.lock().unwrap(), ["h1:false"]);
    }

    #[test]
    fn unmatched_command_runs_nothing() {
        let dispatcher = CommandDispatcher::default();
        dispatcher.register_fn("X", "h1", |_, _| Ok(()));
        let report = dispatcher.dispatch(&Envelope::push("Z", Vec::new()));
        assert_eq!(report.invoked, 0);
        assert!(report.failed.is_empty());
    }
}
