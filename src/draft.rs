//! Draft model — the in-memory, unsaved representation of a screen.
//!
//! DESIGN
//! ======
//! A `ScreenDraft` owns one ordered tree of `ComponentNode`s plus screen
//! metadata. The tree is exclusively owned by the editing session and only
//! mutated through the operations in [`crate::editor`], so any reader sees a
//! complete, consistent snapshot. Node ids are client-generated v4 UUIDs;
//! the screen id itself is server-assigned on create.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Flat JSON prop bag carried by every component instance.
pub type Props = HashMap<String, serde_json::Value>;

// =============================================================================
// COMPONENT NODE
// =============================================================================

/// One node in the component tree. `children` order is render order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentNode {
    pub id: Uuid,
    /// Component kind, matching a palette entry's declared name.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub props: Props,
    #[serde(default)]
    pub children: Vec<ComponentNode>,
}

impl ComponentNode {
    /// Build a fresh leaf node from a palette entry: new id, the entry's
    /// declared kind, a copy of its default props, no children.
    #[must_use]
    pub fn from_palette(entry: &PaletteEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: entry.name.clone(),
            props: entry.config.default_props.clone(),
            children: Vec::new(),
        }
    }
}

// =============================================================================
// PALETTE
// =============================================================================

/// A palette entry as served by the component library endpoint. Only `name`
/// and `config.default_props` are read on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub name: String,
    #[serde(default)]
    pub config: ComponentConfig,
}

/// Declared configuration of a palette entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentConfig {
    #[serde(default)]
    pub default_props: Props,
}

// =============================================================================
// SCREEN DRAFT
// =============================================================================

/// One screen's draft: metadata plus the top-level component list.
///
/// `id` is `None` until the server assigns one on create. The whole draft is
/// replaced when a different screen is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub platform: String,
    pub locale: String,
    pub is_active: bool,
    pub components: Vec<ComponentNode>,
}

impl ScreenDraft {
    /// Default draft for a brand-new screen.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            id: None,
            name: String::new(),
            title: String::new(),
            description: String::new(),
            platform: "web".into(),
            locale: "ru".into(),
            is_active: true,
            components: Vec::new(),
        }
    }
}

impl Default for ScreenDraft {
    fn default() -> Self {
        Self::empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
