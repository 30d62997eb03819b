//! Path and Identity Layer
//!
//! Derives safe file names from free-text entity names, formats sequential
//! ids, and maps entity roles to their storage folders. Every on-disk path is
//! derivable from `(campaign id, role, entity id)` alone, so the manifest
//! index is a cache over a reconstructible layout.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::error::StoreError;

/// Fallback token when an entity name is empty or unusable.
pub const FALLBACK_NAME: &str = "Personaje";

/// Manifest file name, relative to the campaign directory.
pub const MANIFEST_FILE: &str = "manifest.json";
/// World-state snapshot file name, relative to the campaign directory.
pub const WORLD_FILE: &str = "world.json";
/// Character template file, written on campaign creation for UI convenience.
pub const CHARACTER_TEMPLATE_FILE: &str = "templates/character.template.json";
/// Append-only change log, one JSON object per line.
pub const CHANGE_LOG_FILE: &str = "logs/changes.log.jsonl";
/// Encounter records folder.
pub const ENCOUNTERS_DIR: &str = "encounters";

/// Every subdirectory created under a fresh campaign folder.
pub const CAMPAIGN_TREE: &[&str] = &[
    "characters/character",
    "characters/companions",
    "characters/enemies",
    "characters/npcs",
    "encounters",
    "inventory",
    "logs",
    "templates",
];

// ============================================================================
// Roles
// ============================================================================

/// Entity role, discriminating storage folder and id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Main,
    Companion,
    Enemy,
    Npc,
}

impl Role {
    /// All roles, in index/display order.
    pub const ALL: [Role; 4] = [Role::Main, Role::Companion, Role::Enemy, Role::Npc];

    /// Subdirectory under `characters/` for this role.
    ///
    /// The main-character folder is the singular `character`, a layout quirk
    /// preserved for save compatibility.
    pub fn folder_name(&self) -> &'static str {
        match self {
            Role::Main => "character",
            Role::Companion => "companions",
            Role::Enemy => "enemies",
            Role::Npc => "npcs",
        }
    }

    /// Prefix used when minting sequential ids for this role.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Role::Main => "main",
            Role::Companion => "companion",
            Role::Enemy => "enemy",
            Role::Npc => "npc",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id_prefix())
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Role::Main),
            "companion" => Ok(Role::Companion),
            "enemy" => Ok(Role::Enemy),
            "npc" => Ok(Role::Npc),
            other => Err(StoreError::invalid_argument(format!(
                "unknown role: {other}"
            ))),
        }
    }
}

// ============================================================================
// Slugification
// ============================================================================

/// Derive a filename-safe token from a free-text name.
///
/// Strips diacritics via NFD decomposition, drops characters unsafe for
/// filenames, collapses whitespace runs to `_`, and trims. Falls back to
/// [`FALLBACK_NAME`] for empty input. Deterministic and idempotent:
/// `slugify(slugify(s)) == slugify(s)`.
pub fn slugify(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for ch in raw.nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_whitespace() {
            cleaned.push(' ');
        } else if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            cleaned.push(ch);
        }
        // Everything else (path separators, punctuation, control chars,
        // non-ASCII leftovers) is dropped.
    }

    let slug = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .trim_matches('_')
        .to_string();

    if slug.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        slug
    }
}

fn is_combining_mark(ch: char) -> bool {
    // Unicode combining diacritical mark blocks produced by NFD.
    matches!(ch,
        '\u{0300}'..='\u{036F}'
        | '\u{1AB0}'..='\u{1AFF}'
        | '\u{1DC0}'..='\u{1DFF}'
        | '\u{20D0}'..='\u{20FF}'
        | '\u{FE20}'..='\u{FE2F}')
}

// ============================================================================
// Id formatting and validation
// ============================================================================

/// Format a sequential id: `"{prefix}-{counter:04}"`.
///
/// Pure function of prefix and counter; the caller increments the counter
/// before calling.
pub fn next_id(prefix: &str, counter: u64) -> String {
    format!("{prefix}-{counter:04}")
}

/// Check that a caller-supplied campaign id is a folder-safe token.
pub fn is_valid_campaign_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ============================================================================
// Path derivation
// ============================================================================

/// Entity file path relative to the campaign directory.
///
/// Always forward-slash separated — these strings are stored verbatim in the
/// manifest index, and `Path::join` accepts them on every platform.
pub fn entity_relative_path(role: Role, id: &str) -> String {
    format!("characters/{}/{id}.json", role.folder_name())
}

/// Encounter file path relative to the campaign directory.
pub fn encounter_relative_path(id: &str) -> String {
    format!("{ENCOUNTERS_DIR}/{id}.json")
}
