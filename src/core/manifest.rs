//! Manifest Store
//!
//! One manifest per campaign: the authoritative index of every entity and
//! encounter plus the monotonic counters used to mint ids. The manifest is
//! small (index only, never payload), so each save is a full-document pretty
//! rewrite rather than a patch.
//!
//! Allocation and the counter increment are a single step from the caller's
//! point of view. The store assumes a single writer per campaign (see the
//! concurrency notes on [`CampaignStore`](super::store::CampaignStore)).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::entity::SCHEMA_VERSION;
use super::error::{StoreError, StoreResult};
use super::paths::{self, next_id, Role};

/// Default ruleset tag for new campaigns.
pub const DEFAULT_RULESET: &str = "DND5E-es";

// ============================================================================
// Manifest document
// ============================================================================

/// Per-campaign manifest: campaign metadata, indices, and id counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    pub campaign: CampaignMeta,
    #[serde(default)]
    pub indices: Indices,
    #[serde(default)]
    pub counters: Counters,
}

/// Embedded campaign record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignMeta {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_saved_at: DateTime<Utc>,
    pub ruleset: String,
}

/// Index sequences, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Indices {
    pub characters: Vec<CharacterIndexEntry>,
    pub encounters: Vec<EncounterIndexEntry>,
}

/// Lightweight character index entry. Name and level are denormalized from
/// the entity record for fast listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterIndexEntry {
    pub id: String,
    pub role: Role,
    /// Path relative to the campaign directory, forward-slash separated.
    pub path: String,
    pub name: String,
    pub level: u32,
}

/// Lightweight encounter index entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterIndexEntry {
    pub id: String,
    pub path: String,
    pub title: String,
}

/// Monotonic id counters. One character counter is shared across all four
/// roles; sequence numbers within a role are sparse but strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Counters {
    pub last_character_num: u64,
    pub last_encounter_num: u64,
}

impl Manifest {
    /// A fresh manifest with empty indices and zeroed counters.
    pub fn new(id: impl Into<String>, name: impl Into<String>, ruleset: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            schema_version: SCHEMA_VERSION,
            campaign: CampaignMeta {
                id: id.into(),
                name: name.into(),
                created_at: now,
                last_saved_at: now,
                ruleset: ruleset.into(),
            },
            indices: Indices::default(),
            counters: Counters::default(),
        }
    }

    /// Replace-by-id if present, else append. Entries not replaced keep
    /// their insertion order.
    pub fn upsert_character_entry(&mut self, entry: CharacterIndexEntry) {
        match self
            .indices
            .characters
            .iter_mut()
            .find(|e| e.id == entry.id)
        {
            Some(existing) => *existing = entry,
            None => self.indices.characters.push(entry),
        }
    }

    /// Replace-by-id if present, else append.
    pub fn upsert_encounter_entry(&mut self, entry: EncounterIndexEntry) {
        match self
            .indices
            .encounters
            .iter_mut()
            .find(|e| e.id == entry.id)
        {
            Some(existing) => *existing = entry,
            None => self.indices.encounters.push(entry),
        }
    }

    /// Look up a character index entry by id.
    pub fn character_entry(&self, id: &str) -> Option<&CharacterIndexEntry> {
        self.indices.characters.iter().find(|e| e.id == id)
    }

    /// Look up an encounter index entry by id.
    pub fn encounter_entry(&self, id: &str) -> Option<&EncounterIndexEntry> {
        self.indices.encounters.iter().find(|e| e.id == id)
    }

    /// Remove a character index entry by id. Returns the removed entry.
    pub fn remove_character_entry(&mut self, id: &str) -> Option<CharacterIndexEntry> {
        let pos = self.indices.characters.iter().position(|e| e.id == id)?;
        Some(self.indices.characters.remove(pos))
    }

    /// Mint the next character id for a role, incrementing the shared
    /// character counter.
    pub fn allocate_character_id(&mut self, role: Role) -> String {
        self.counters.last_character_num += 1;
        next_id(role.id_prefix(), self.counters.last_character_num)
    }

    /// Mint the next encounter id, incrementing the encounter counter.
    pub fn allocate_encounter_id(&mut self) -> String {
        self.counters.last_encounter_num += 1;
        next_id("encounter", self.counters.last_encounter_num)
    }
}

// ============================================================================
// Manifest store (disk)
// ============================================================================

/// Reads and writes the manifest file of a single campaign directory.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    campaign_id: String,
    campaign_dir: PathBuf,
}

impl ManifestStore {
    pub fn new(campaign_id: impl Into<String>, campaign_dir: impl Into<PathBuf>) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            campaign_dir: campaign_dir.into(),
        }
    }

    /// Path of the manifest file.
    pub fn manifest_path(&self) -> PathBuf {
        self.campaign_dir.join(paths::MANIFEST_FILE)
    }

    /// Load and parse the manifest.
    ///
    /// `NotFound` when the campaign directory or manifest file is absent,
    /// `Corrupt` when the JSON fails to parse.
    pub async fn load(&self) -> StoreResult<Manifest> {
        let path = self.manifest_path();
        let contents = tokio::fs::read_to_string(&path).await.map_err(|source| {
            StoreError::io_or_not_found(&path, source, &format!("campaign {}", self.campaign_id))
        })?;

        serde_json::from_str(&contents).map_err(|source| StoreError::corrupt(&path, source))
    }

    /// Touch `lastSavedAt` and overwrite the manifest file with the full
    /// pretty-printed document.
    pub async fn save(&self, manifest: &mut Manifest) -> StoreResult<()> {
        manifest.campaign.last_saved_at = Utc::now();
        write_json_pretty(&self.manifest_path(), manifest).await
    }
}

/// Serialize a document as pretty JSON (trailing newline) and overwrite
/// `path` via temp-file-then-rename, so a crash mid-write never leaves a
/// truncated document behind.
pub(crate) async fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let json =
        serde_json::to_string_pretty(value).map_err(|source| StoreError::corrupt(path, source))?;

    let tmp_path = match path.extension() {
        Some(ext) => {
            let mut ext = ext.to_os_string();
            ext.push(".tmp");
            path.with_extension(ext)
        }
        None => path.with_extension("tmp"),
    };

    tokio::fs::write(&tmp_path, format!("{json}\n"))
        .await
        .map_err(|source| StoreError::io(&tmp_path, source))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|source| StoreError::io(path, source))
}

/// Read and parse a JSON document, mapping a missing file to `NotFound` with
/// the given description.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> StoreResult<T> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| StoreError::io_or_not_found(path, source, what))?;
    serde_json::from_str(&contents).map_err(|source| StoreError::corrupt(path, source))
}
