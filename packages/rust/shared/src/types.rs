//! Core domain types for heading extraction and outline assembly.

use serde::{Deserialize, Serialize};

use crate::error::{ContentListError, Result};

// ---------------------------------------------------------------------------
// HeadingRecord
// ---------------------------------------------------------------------------

/// One extracted heading, created fresh on every render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingRecord {
    /// Plain-text content of the heading (nested markup stripped).
    pub text: String,
    /// Anchor identifier, unique within the document.
    pub id: String,
    /// `true` for level-1 (root) headings, `false` for level-2 sub-headings.
    pub is_root: bool,
    /// 1-based ordinal among all extracted headings, in document order.
    pub position: usize,
}

// ---------------------------------------------------------------------------
// OutlineNode
// ---------------------------------------------------------------------------

/// A root heading with the sub-headings grouped beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineNode {
    pub root: HeadingRecord,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HeadingRecord>,
}

impl OutlineNode {
    pub fn new(root: HeadingRecord) -> Self {
        Self {
            root,
            children: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// Per-article outline preferences. Missing values read as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlinePrefs {
    /// Render the outline block before the article.
    pub show_outline: bool,
    /// Restrict the outline to root headings.
    pub one_level_only: bool,
}

/// A preference flag stored per article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefKey {
    Need,
    OneLevel,
}

impl PrefKey {
    /// All known keys, in form order.
    pub const ALL: [PrefKey; 2] = [PrefKey::Need, PrefKey::OneLevel];

    /// Field name as submitted by the admin form.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Need => "need",
            Self::OneLevel => "one_level",
        }
    }

    /// Key under which the flag is persisted.
    pub fn meta_key(self) -> &'static str {
        match self {
            Self::Need => "contentlist_need",
            Self::OneLevel => "contentlist_one_level",
        }
    }
}

impl std::fmt::Display for PrefKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}

impl std::str::FromStr for PrefKey {
    type Err = ContentListError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.field_name() == s)
            .ok_or_else(|| ContentListError::validation(format!("unknown preference key '{s}'")))
    }
}

/// The kind of record an admin update targets. Only [`SnapshotKind::Article`]
/// accepts preference writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    #[default]
    Article,
    Autosave,
    Revision,
}
