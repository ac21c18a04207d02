//! The user-interface boundary.
//!
//! Dialogs and toasts belong to the embedding application. The pipeline only needs to
//! hand work to the UI thread once, show short notifications and open a tree viewer;
//! [`UiThread`], [`Notifier`] and [`TreeViewer`] are those seams, bundled in [`Ui`].
//!
//! Also home of the "show last pat event" menu action.

use std::{fmt, sync::Arc};

use strum::Display;

use crate::{scanner::LastEventSlot, tree::TreeValue};

/// Title of the menu entry that shows the last pat event.
pub const LAST_EVENT_MENU_TITLE: &str = "查看拍一拍缓存";

/// Shown when the menu entry is used before any event was captured.
pub const NO_EVENT_MESSAGE: &str = "暂无拍一拍缓存（先触发一次拍一拍）";

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ToastKind {
    /// Operation succeeded
    Success,
    /// Operation failed
    Error,
    /// Informational
    Info,
}

/// Which viewer a tree is shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ViewerKind {
    /// Raw decoded message
    Json,
    /// Result of a message fetch
    FetchResult,
}

/// Runs closures on the UI thread.
pub trait UiThread: Send + Sync {
    /// Schedule `task` on the UI thread.
    fn run_on_ui(&self, task: Box<dyn FnOnce() + Send>);
}

/// Short user notifications.
pub trait Notifier: Send + Sync {
    /// Show `message`. Called on the UI thread.
    fn toast(&self, kind: ToastKind, message: &str);
}

/// Tree viewer dialogs.
pub trait TreeViewer: Send + Sync {
    /// Open a viewer on `tree`. Called on the UI thread.
    fn show(&self, kind: ViewerKind, tree: &TreeValue);
}

/// Runs tasks immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineThread;

impl UiThread for InlineThread {
    fn run_on_ui(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

/// Writes notifications and viewer requests to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogUi;

impl Notifier for LogUi {
    fn toast(&self, kind: ToastKind, message: &str) {
        log::info!("[ui] {kind}: {message}");
    }
}

impl TreeViewer for LogUi {
    fn show(&self, kind: ViewerKind, tree: &TreeValue) {
        log::info!("[ui] {kind} viewer:\n{tree}");
    }
}

/// The UI collaborators, with every call handed off to the UI thread.
#[derive(Clone)]
pub struct Ui {
    thread: Arc<dyn UiThread>,
    notifier: Arc<dyn Notifier>,
    viewer: Arc<dyn TreeViewer>,
}

impl Default for Ui {
    fn default() -> Self {
        Ui::new(Arc::new(InlineThread), Arc::new(LogUi), Arc::new(LogUi))
    }
}

impl fmt::Debug for Ui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ui").finish_non_exhaustive()
    }
}

impl Ui {
    /// Bundle the collaborators.
    #[must_use]
    pub fn new(
        thread: Arc<dyn UiThread>,
        notifier: Arc<dyn Notifier>,
        viewer: Arc<dyn TreeViewer>,
    ) -> Self {
        Ui {
            thread,
            notifier,
            viewer,
        }
    }

    /// Show a notification.
    pub fn toast(&self, kind: ToastKind, message: impl Into<String>) {
        let notifier = Arc::clone(&self.notifier);
        let message = message.into();
        self.thread
            .run_on_ui(Box::new(move || notifier.toast(kind, &message)));
    }

    /// Open a viewer on a copy of `tree`.
    pub fn show(&self, kind: ViewerKind, tree: &TreeValue) {
        let viewer = Arc::clone(&self.viewer);
        let tree = tree.clone();
        self.thread.run_on_ui(Box::new(move || viewer.show(kind, &tree)));
    }

    /// Open a viewer and then show a notification, in one UI hand-off.
    pub fn show_with_toast(
        &self,
        viewer_kind: ViewerKind,
        tree: &TreeValue,
        toast_kind: ToastKind,
        message: impl Into<String>,
    ) {
        let viewer = Arc::clone(&self.viewer);
        let notifier = Arc::clone(&self.notifier);
        let tree = tree.clone();
        let message = message.into();
        self.thread.run_on_ui(Box::new(move || {
            viewer.show(viewer_kind, &tree);
            if !message.trim().is_empty() {
                notifier.toast(toast_kind, &message);
            }
        }));
    }
}

/// Show the most recent pat event: the decoded message plus its text, or a hint that
/// nothing was captured yet.
pub fn show_last_event(slot: &LastEventSlot, ui: &Ui) {
    match slot.latest() {
        Some(event) => {
            ui.show_with_toast(ViewerKind::Json, &event.tree, ToastKind::Success, event.text());
        }
        None => ui.toast(ToastKind::Error, NO_EVENT_MESSAGE),
    }
}

/// Where to insert the last-event entry into a message menu, given the existing
/// titles: before the last item, and not at all if the menu is empty or already has
/// the entry.
#[must_use]
pub fn menu_insert_position<S: AsRef<str>>(titles: &[S]) -> Option<usize> {
    if titles.is_empty()
        || titles
            .iter()
            .any(|title| title.as_ref() == LAST_EVENT_MENU_TITLE)
    {
        return None;
    }
    Some(titles.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scanner::{PatEvent, PatternScanner},
        test::ui::{RecordingUi, UiEvent},
        tree::json,
    };

    #[test]
    fn last_event_action() {
        let recording = Arc::new(RecordingUi::default());
        let ui = recording.ui();
        let slot = LastEventSlot::new();

        show_last_event(&slot, &ui);
        assert_eq!(
            recording.events(),
            [UiEvent::Toast(ToastKind::Error, NO_EVENT_MESSAGE.to_string())]
        );

        let tree = json::parse(r#"{"25":{"1":{"28":{"2":"A 拍了拍 B"}}}}"#).unwrap();
        let info = PatternScanner::default().extract(&tree).unwrap();
        slot.store(PatEvent::new("X", info, tree));
        recording.clear();

        show_last_event(&slot, &ui);
        let events = recording.events();
        assert!(matches!(events[0], UiEvent::Viewer(ViewerKind::Json, _)));
        assert_eq!(events[1], UiEvent::Toast(ToastKind::Success, "A 拍了拍 B".to_string()));
    }

    #[test]
    fn menu_position() {
        assert_eq!(menu_insert_position::<&str>(&[]), None);
        assert_eq!(menu_insert_position(&["copy", "forward", "delete"]), Some(2));
        assert_eq!(menu_insert_position(&["copy", LAST_EVENT_MENU_TITLE]), None);
    }
}
