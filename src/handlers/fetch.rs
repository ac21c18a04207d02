//! Viewer for fetched message history.

use crate::{
    dispatch::{Envelope, RespHandler},
    handlers::ROAM_MSG_COMMAND,
    tree::TreeValue,
    ui::{Ui, ViewerKind},
    Result,
};

/// Opens the fetch result viewer on every decoded response to a command.
#[derive(Debug, Clone)]
pub struct FetchViewer {
    command: String,
    ui: Ui,
}

impl FetchViewer {
    /// Show roaming message fetches.
    #[must_use]
    pub fn roaming(ui: Ui) -> Self {
        Self::new(ROAM_MSG_COMMAND, ui)
    }

    /// Show responses to `command`.
    pub fn new(command: impl Into<String>, ui: Ui) -> Self {
        FetchViewer {
            command: command.into(),
            ui,
        }
    }
}

impl RespHandler for FetchViewer {
    fn command(&self) -> &str {
        &self.command
    }

    fn name(&self) -> &str {
        "fetch-viewer"
    }

    fn on_handle(&self, tree: Option<&TreeValue>, _envelope: &Envelope) -> Result<()> {
        if let Some(tree) = tree {
            self.ui.show(ViewerKind::FetchResult, tree);
        }
        Ok(())
    }
}
