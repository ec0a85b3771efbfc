//! Applies single-item webhook notifications.
//!
//! | action                          | preview only | effect |
//! |---------------------------------|--------------|--------|
//! | create, unarchive, publish      | no           | upsert |
//! | save, auto_save                 | yes          | upsert |
//! | archive, unpublish, delete      | no           | delete |
//!
//! Unknown action names and preview-only actions outside preview mode are
//! ignored without error. The payload body is materialized as received; the
//! item is not re-fetched.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::MaterializeError;
use crate::materializer::{Materialized, Materializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Save,
    AutoSave,
    Archive,
    Unarchive,
    Publish,
    Unpublish,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Upsert,
    Delete,
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "create" => Action::Create,
            "save" => Action::Save,
            "auto_save" => Action::AutoSave,
            "archive" => Action::Archive,
            "unarchive" => Action::Unarchive,
            "publish" => Action::Publish,
            "unpublish" => Action::Unpublish,
            "delete" => Action::Delete,
            _ => return Err(()),
        })
    }
}

impl Action {
    pub fn effect(self) -> Effect {
        match self {
            Action::Create
            | Action::Save
            | Action::AutoSave
            | Action::Unarchive
            | Action::Publish => Effect::Upsert,
            Action::Archive | Action::Unpublish | Action::Delete => Effect::Delete,
        }
    }

    pub fn preview_only(self) -> bool {
        matches!(self, Action::Save | Action::AutoSave)
    }
}

/// What [`EntryHandler::handle`] did with a notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    Upserted(Materialized),
    Deleted(u64),
    Ignored,
}

pub struct EntryHandler {
    materializer: Arc<Materializer>,
}

impl EntryHandler {
    pub fn new(materializer: Arc<Materializer>) -> Self {
        Self { materializer }
    }

    pub async fn handle(
        &self,
        action: &str,
        payload: &Value,
        is_preview: bool,
    ) -> Result<Handled, MaterializeError> {
        let Ok(parsed) = action.parse::<Action>() else {
            debug!(action, "[WEBHOOK] Ignoring unknown action");
            return Ok(Handled::Ignored);
        };
        if parsed.preview_only() && !is_preview {
            debug!(action, "[WEBHOOK] Ignoring preview-only action outside preview mode");
            return Ok(Handled::Ignored);
        }

        info!(action, is_preview, "[WEBHOOK] Applying action");
        match parsed.effect() {
            Effect::Upsert => self
                .materializer
                .upsert(payload)
                .await
                .map(Handled::Upserted),
            Effect::Delete => self.materializer.delete(payload).await.map(Handled::Deleted),
        }
    }
}
