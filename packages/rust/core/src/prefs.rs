//! Per-article outline preferences: reading, and the admin write policy.
//!
//! Writes go through [`apply_update`], which refuses updates without a valid
//! anti-forgery token and updates aimed at autosave or revision snapshots,
//! sanitizes every submitted value, and deletes (rather than stores) a flag
//! whose submitted value is empty. All fields of one update are written in a
//! single transaction; a refused or failed update writes nothing.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use contentlist_shared::{ContentListError, OutlinePrefs, PrefKey, Result, SnapshotKind};
use contentlist_storage::Storage;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// An admin form submission for one article.
#[derive(Debug, Clone, Default)]
pub struct PrefsUpdate {
    pub article_id: i64,
    /// Submitted fields by form name (`need`, `one_level`). `None` when the
    /// form section was not submitted at all.
    pub fields: Option<BTreeMap<String, String>>,
    /// Anti-forgery token from the form.
    pub token: Option<String>,
    /// The record the update targets.
    pub snapshot: SnapshotKind,
}

/// What [`apply_update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing was submitted; nothing was touched.
    Skipped,
    Applied { written: usize, deleted: usize },
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Load an article's preferences. Missing or empty values read as `false`.
pub async fn load_prefs(storage: &Storage, article_id: i64) -> Result<OutlinePrefs> {
    let need = storage.get_meta(article_id, PrefKey::Need.meta_key()).await?;
    let one_level = storage
        .get_meta(article_id, PrefKey::OneLevel.meta_key())
        .await?;

    Ok(OutlinePrefs {
        show_outline: is_truthy(need.as_deref()),
        one_level_only: is_truthy(one_level.as_deref()),
    })
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(value, Some(v) if !v.is_empty() && v != "0")
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Apply an admin submission under the write policy.
#[instrument(skip_all, fields(article_id = update.article_id, snapshot = ?update.snapshot))]
pub async fn apply_update(
    storage: &Storage,
    secret: &str,
    update: &PrefsUpdate,
) -> Result<UpdateOutcome> {
    let Some(fields) = &update.fields else {
        debug!("no preference fields submitted, skipping");
        return Ok(UpdateOutcome::Skipped);
    };

    if fields.is_empty() {
        return Err(ContentListError::rejected("empty preference submission"));
    }

    let token = update.token.as_deref().unwrap_or_default();
    if !verify_token(secret, update.article_id, token) {
        warn!("anti-forgery token mismatch");
        return Err(ContentListError::rejected("invalid anti-forgery token"));
    }

    if update.snapshot != SnapshotKind::Article {
        return Err(ContentListError::rejected(format!(
            "{:?} snapshots do not store preferences",
            update.snapshot
        )));
    }

    let mut changes = Vec::with_capacity(fields.len());

    for (field, raw) in fields {
        let key: PrefKey = match field.parse() {
            Ok(key) => key,
            Err(_) => {
                warn!(field = %field, "ignoring unknown preference field");
                continue;
            }
        };

        let value = sanitize_text_field(raw);
        changes.push((key.meta_key(), (!value.is_empty()).then_some(value)));
    }

    let deleted = changes.iter().filter(|(_, value)| value.is_none()).count();
    let written = changes.len() - deleted;

    let batch: Vec<(&str, Option<&str>)> = changes
        .iter()
        .map(|(key, value)| (*key, value.as_deref()))
        .collect();
    storage.write_meta_batch(update.article_id, &batch).await?;

    info!(written, deleted, "preferences updated");

    Ok(UpdateOutcome::Applied { written, deleted })
}

// ---------------------------------------------------------------------------
// Anti-forgery tokens
// ---------------------------------------------------------------------------

/// Token the admin form embeds for `article_id`.
pub fn issue_token(secret: &str, article_id: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{secret}:{article_id}").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check a submitted token in constant time.
pub fn verify_token(secret: &str, article_id: i64, token: &str) -> bool {
    let expected = issue_token(secret, article_id);
    let (a, b) = (expected.as_bytes(), token.trim().as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ---------------------------------------------------------------------------
// Sanitization
// ---------------------------------------------------------------------------

/// Reduce a submitted value to a single line of plain text.
///
/// Removes `<script>`/`<style>` blocks and all other tags, drops
/// percent-encoded octets, and collapses whitespace (line breaks included).
pub fn sanitize_text_field(value: &str) -> String {
    static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<script[^>]*>.*?</script\s*>|<style[^>]*>.*?</style\s*>")
            .expect("valid regex")
    });
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^>]*>?").expect("valid regex"));
    static OCTET_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"%[a-fA-F0-9]{2}").expect("valid regex"));
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    let result = BLOCK_RE.replace_all(value, "");
    let result = TAG_RE.replace_all(&result, "");
    let result = OCTET_RE.replace_all(&result, "");
    let result = WS_RE.replace_all(&result, " ");

    result.trim().to_string()
}
