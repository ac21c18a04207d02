//! A UI collaborator that records what it was asked to show.

use std::sync::{Arc, Mutex};

use crate::{
    tree::TreeValue,
    ui::{InlineThread, Notifier, ToastKind, TreeViewer, Ui, ViewerKind},
};

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Toast(ToastKind, String),
    Viewer(ViewerKind, TreeValue),
}

#[derive(Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingUi {
    pub fn ui(self: &Arc<Self>) -> Ui {
        Ui::new(Arc::new(InlineThread), self.clone(), self.clone())
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn toasts(&self) -> Vec<(ToastKind, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Toast(kind, message) => Some((kind, message)),
                UiEvent::Viewer(..) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl Notifier for RecordingUi {
    fn toast(&self, kind: ToastKind, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(UiEvent::Toast(kind, message.to_string()));
    }
}

impl TreeViewer for RecordingUi {
    fn show(&self, kind: ViewerKind, tree: &TreeValue) {
        self.events
            .lock()
            .unwrap()
            .push(UiEvent::Viewer(kind, tree.clone()));
    }
}
