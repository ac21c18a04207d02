use std::{
    sync::{Arc, RwLock},
    time::SystemTime,
};

use crate::{scanner::PatInfo, tree::TreeValue};

/// A detected pat event as kept for later inspection.
#[derive(Debug, Clone)]
pub struct PatEvent {
    /// Command of the message the event was found in
    pub command: String,
    /// The detection result
    pub info: PatInfo,
    /// The decoded message
    pub tree: TreeValue,
    /// When the event was captured
    pub captured_at: SystemTime,
}

impl PatEvent {
    /// Create an event captured now.
    #[must_use]
    pub fn new(command: impl Into<String>, info: PatInfo, tree: TreeValue) -> Self {
        PatEvent {
            command: command.into(),
            info,
            tree,
            captured_at: SystemTime::now(),
        }
    }

    /// Event text, or an empty string if none was recovered.
    #[must_use]
    pub fn text(&self) -> &str {
        self.info.text.as_deref().unwrap_or_default()
    }
}

/// Single-slot holder of the most recent [`PatEvent`].
///
/// Written by the dispatch thread and read from UI callbacks. Each store replaces the
/// whole event, so readers always see a complete one; the last write wins.
#[derive(Debug, Default)]
pub struct LastEventSlot {
    inner: RwLock<Option<Arc<PatEvent>>>,
}

impl LastEventSlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored event, returning the shared handle.
    pub fn store(&self, event: PatEvent) -> Arc<PatEvent> {
        let event = Arc::new(event);
        *write_lock!(self.inner) = Some(Arc::clone(&event));
        event
    }

    /// The most recent event, if any.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<PatEvent>> {
        read_lock!(self.inner).clone()
    }

    /// Drop the stored event.
    pub fn clear(&self) {
        write_lock!(self.inner).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::HitReason;

    fn event(text: &str) -> PatEvent {
        let mut info = PatInfo::new("1", HitReason::Keyword("拍了拍".into()));
        info.text = Some(text.to_string());
        PatEvent::new("X", info, TreeValue::from(text))
    }

    #[test]
    fn last_write_wins() {
        let slot = LastEventSlot::new();
        assert!(slot.latest().is_none());

        let first = slot.store(event("one"));
        slot.store(event("two"));
        assert_eq!(slot.latest().unwrap().text(), "two");
        assert_eq!(first.text(), "one");

        slot.clear();
        assert!(slot.latest().is_none());
    }

    #[test]
    fn readable_from_other_threads() {
        let slot = Arc::new(LastEventSlot::new());
        slot.store(event("shared"));

        let reader = Arc::clone(&slot);
        let text = std::thread::spawn(move || reader.latest().map(|e| e.text().to_string()))
            .join()
            .unwrap();
        assert_eq!(text.as_deref(), Some("shared"));
    }
}
