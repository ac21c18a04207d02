//! Capture of the media download keys.

use std::sync::{Arc, RwLock};

use crate::{
    dispatch::{Envelope, RespHandler},
    handlers::{repeated_at, RKEY_COMMAND},
    tree::TreeValue,
    Result,
};

/// The latest group and private rkeys.
#[derive(Debug, Default)]
pub struct RKeyCache {
    keys: RwLock<Option<(String, String)>>,
}

impl RKeyCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both keys.
    pub fn set(&self, group: String, private: String) {
        *write_lock!(self.keys) = Some((group, private));
    }

    /// The group media key.
    #[must_use]
    pub fn group(&self) -> Option<String> {
        read_lock!(self.keys).as_ref().map(|(group, _)| group.clone())
    }

    /// The private media key.
    #[must_use]
    pub fn private(&self) -> Option<String> {
        read_lock!(self.keys).as_ref().map(|(_, private)| private.clone())
    }
}

/// Stores the keys carried by [`RKEY_COMMAND`] responses.
///
/// The response lists the keys under `4.4.1`; element 0 is the group key and element 1
/// the private key, each as field `1`.
#[derive(Debug)]
pub struct RKeyCapture {
    cache: Arc<RKeyCache>,
}

impl RKeyCapture {
    /// Write captured keys into `cache`.
    #[must_use]
    pub fn new(cache: Arc<RKeyCache>) -> Self {
        RKeyCapture { cache }
    }
}

impl RespHandler for RKeyCapture {
    fn command(&self) -> &str {
        RKEY_COMMAND
    }

    fn name(&self) -> &str {
        "rkey"
    }

    fn on_handle(&self, tree: Option<&TreeValue>, _envelope: &Envelope) -> Result<()> {
        let Some(tree) = tree else {
            return Ok(());
        };

        let key = |index| {
            repeated_at(tree, "4.4.1", index, "1")
                .and_then(TreeValue::as_str)
                .map(str::to_string)
                .ok_or_else(|| malformed_error!("rkey response lacks key #{} at 4.4.1", index))
        };
        let group = key(0)?;
        let private = key(1)?;

        log::debug!("[rkey] refreshed group and private keys");
        self.cache.set(group, private);
        Ok(())
    }
}
