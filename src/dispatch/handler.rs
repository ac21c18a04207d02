//! Handler registrations.

use std::fmt;

use crate::{dispatch::envelope::Envelope, tree::TreeValue, Result};

/// A response handler bound to one command name.
///
/// `tree` is `None` when the payload could not be decoded; handlers that only need
/// to observe the command still run.
pub trait RespHandler: Send + Sync {
    /// Command name this handler is bound to.
    fn command(&self) -> &str;

    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Handle one response.
    ///
    /// # Errors
    /// Any error is logged by the dispatcher; later handlers still run.
    fn on_handle(&self, tree: Option<&TreeValue>, envelope: &Envelope) -> Result<()>;
}

/// A handler built from a closure.
pub struct FnHandler<F> {
    command: String,
    name: String,
    callback: F,
}

impl<F> FnHandler<F>
where
    F: Fn(Option<&TreeValue>, &Envelope) -> Result<()> + Send + Sync,
{
    /// Bind `callback` to `command`.
    pub fn new(command: impl Into<String>, name: impl Into<String>, callback: F) -> Self {
        FnHandler {
            command: command.into(),
            name: name.into(),
            callback,
        }
    }
}

impl<F> RespHandler for FnHandler<F>
where
    F: Fn(Option<&TreeValue>, &Envelope) -> Result<()> + Send + Sync,
{
    fn command(&self) -> &str {
        &self.command
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn on_handle(&self, tree: Option<&TreeValue>, envelope: &Envelope) -> Result<()> {
        (self.callback)(tree, envelope)
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler")
            .field("command", &self.command)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
