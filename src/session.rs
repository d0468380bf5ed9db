//! Builder session — one screen's editing lifecycle.
//!
//! DESIGN
//! ======
//! The session is the single owner of the draft and the selection. Every
//! tree mutation goes through the editor operations, and every save goes
//! through here, so the "one save in flight per session" contract falls out
//! of `&mut self`: `save` suspends without blocking the runtime, the tree
//! is editable again as soon as it returns (at the HTTP acknowledgment),
//! and a save issued while the previous cycle still awaits its push simply
//! preempts it in the monitor.
//!
//! Insert targeting enforces the two-part rule here rather than in the
//! editor: the target must be a container kind AND currently selected,
//! otherwise the new node lands at the root level.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{ApiError, SaveRequest, ScreenApi};
use crate::draft::{ComponentNode, PaletteEntry, Props, ScreenDraft};
use crate::editor;
use crate::editor::ContainerKinds;
use crate::push::now_ms;
use crate::telemetry::task::MonitorHandle;

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

// =============================================================================
// CONFIG
// =============================================================================

/// Per-session policy knobs.
///
/// Whether a save kind is followed by a push confirmation is configuration,
/// not something inferred from the payload: the backend sends no push for
/// screen creation today, but that is its choice, not a protocol fact.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub container_kinds: ContainerKinds,
    pub expect_push_on_create: bool,
    pub expect_push_on_update: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            container_kinds: ContainerKinds::default(),
            expect_push_on_create: false,
            expect_push_on_update: true,
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One open screen in the builder.
pub struct BuilderSession {
    draft: ScreenDraft,
    /// Snapshot of the selected node for the properties panel; refreshed on
    /// prop updates, cleared when the node is deleted.
    selected: Option<ComponentNode>,
    api: Arc<dyn ScreenApi>,
    monitor: MonitorHandle,
    config: SessionConfig,
}

impl BuilderSession {
    /// Session over a brand-new, empty draft.
    #[must_use]
    pub fn new(api: Arc<dyn ScreenApi>, monitor: MonitorHandle, config: SessionConfig) -> Self {
        Self::with_draft(ScreenDraft::empty(), api, monitor, config)
    }

    /// Session over a prepared draft (e.g. metadata filled in by a form).
    #[must_use]
    pub fn with_draft(
        draft: ScreenDraft,
        api: Arc<dyn ScreenApi>,
        monitor: MonitorHandle,
        config: SessionConfig,
    ) -> Self {
        Self { draft, selected: None, api, monitor, config }
    }

    /// Open an existing screen for editing.
    ///
    /// # Errors
    ///
    /// Returns the API error when the screen cannot be fetched; no session
    /// is created in that case.
    pub async fn open(
        screen_id: i64,
        api: Arc<dyn ScreenApi>,
        monitor: MonitorHandle,
        config: SessionConfig,
    ) -> Result<Self, ApiError> {
        let draft = api.get_screen(screen_id).await?.into_draft();
        Ok(Self::with_draft(draft, api, monitor, config))
    }

    #[must_use]
    pub fn draft(&self) -> &ScreenDraft {
        &self.draft
    }

    #[must_use]
    pub fn monitor(&self) -> &MonitorHandle {
        &self.monitor
    }

    /// Replace the whole draft (switching screens). Discards selection.
    pub fn load_draft(&mut self, draft: ScreenDraft) {
        self.draft = draft;
        self.selected = None;
    }

    /// Fetch the component palette.
    ///
    /// # Errors
    ///
    /// Propagates the API error; the draft is untouched.
    pub async fn palette(&self) -> Result<Vec<PaletteEntry>, ApiError> {
        self.api.list_components().await
    }

    // -------------------------------------------------------------------------
    // SELECTION
    // -------------------------------------------------------------------------

    /// Select a node by id. Returns whether the id exists.
    pub fn select(&mut self, id: Uuid) -> bool {
        self.selected = editor::find(&self.draft.components, id).cloned();
        self.selected.is_some()
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    #[must_use]
    pub fn selected(&self) -> Option<&ComponentNode> {
        self.selected.as_ref()
    }

    // -------------------------------------------------------------------------
    // TREE OPERATIONS
    // -------------------------------------------------------------------------

    /// Drop a palette entry onto the canvas. The target container is only
    /// honored when it names the currently selected node and that node's
    /// kind is a container; otherwise the node lands at the root level.
    /// Returns the new node's id.
    pub fn insert_from_palette(&mut self, entry: &PaletteEntry, target: Option<Uuid>) -> Uuid {
        let node = ComponentNode::from_palette(entry);
        let id = node.id;
        let effective = target.filter(|t| self.is_selected_container(*t));
        editor::insert_into(&mut self.draft.components, node, effective);
        id
    }

    fn is_selected_container(&self, id: Uuid) -> bool {
        self.selected
            .as_ref()
            .is_some_and(|sel| sel.id == id && self.config.container_kinds.contains(&sel.kind))
    }

    /// Merge `patch` into a node's props. Unknown ids are a no-op. Keeps
    /// the selection snapshot in sync when the selected node changes.
    pub fn update_props(&mut self, id: Uuid, patch: &Props) {
        let Some(updated) = editor::update_props(&mut self.draft.components, id, patch) else {
            return;
        };
        if self.selected.as_ref().is_some_and(|sel| sel.id == id) {
            self.selected = Some(updated);
        }
    }

    /// Remove a node anywhere in the tree. Clears the selection if it
    /// pointed at the removed node.
    pub fn delete(&mut self, id: Uuid) {
        if editor::delete(&mut self.draft.components, id)
            && self.selected.as_ref().is_some_and(|sel| sel.id == id)
        {
            self.selected = None;
        }
    }

    pub fn move_up(&mut self, id: Uuid) {
        editor::move_up(&mut self.draft.components, id);
    }

    pub fn move_down(&mut self, id: Uuid) {
        editor::move_down(&mut self.draft.components, id);
    }

    // -------------------------------------------------------------------------
    // SAVE
    // -------------------------------------------------------------------------

    /// Persist the draft. Creates when the draft has no id yet, updates
    /// otherwise; a successful create adopts the server-assigned id.
    ///
    /// # Errors
    ///
    /// Returns the API error on transport failure. The draft is untouched
    /// and the monitor stands down to idle.
    pub async fn save(&mut self) -> Result<(), ApiError> {
        let save_timestamp = now_ms();
        let creating = self.draft.id.is_none();
        let expects_push = if creating {
            self.config.expect_push_on_create
        } else {
            self.config.expect_push_on_update
        };

        self.monitor.begin_save(expects_push).await;
        let payload = SaveRequest::from_draft(&self.draft, save_timestamp);

        let result = match self.draft.id {
            Some(id) => self.api.update_screen(id, &payload).await,
            None => self.api.create_screen(&payload).await,
        };

        match result {
            Ok(record) => {
                if creating {
                    info!(screen_id = record.id, "screen created");
                    self.draft.id = Some(record.id);
                }
                self.monitor.acknowledged().await;
                Ok(())
            }
            Err(error) => {
                warn!(%error, "screen save failed");
                self.monitor.save_failed().await;
                Err(error)
            }
        }
    }
}
