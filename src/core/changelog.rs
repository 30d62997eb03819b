//! Change Log
//!
//! Append-only audit trail for campaign mutations: one JSON object per line
//! in `logs/changes.log.jsonl`. The core only ever appends — read access
//! (tailing, debugging) is an external concern, as is rotation/retention.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use super::error::{StoreError, StoreResult};
use super::paths::CHANGE_LOG_FILE;

/// Operation kind recorded on every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    CampaignCreated,
    EntityUpserted,
    EntityDeleted,
    EncounterCreated,
    WorldSaved,
}

/// Who performed the mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeActor {
    System,
    User,
}

/// A single change-log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub ts: DateTime<Utc>,
    pub actor: ChangeActor,
    pub kind: ChangeKind,
    /// Affected campaign/entity/encounter id.
    pub id: String,
    /// Small patch-summary object, never the full payload.
    pub patch: Value,
}

impl ChangeRecord {
    /// A system-actor record stamped now.
    pub fn system(kind: ChangeKind, id: impl Into<String>, patch: Value) -> Self {
        Self {
            ts: Utc::now(),
            actor: ChangeActor::System,
            kind,
            id: id.into(),
            patch,
        }
    }
}

/// Sequential appender for a campaign's change log.
///
/// Opens, appends one line, and closes on every call — cheap at this scale
/// and leaves no open handle between mutations for external tail tools to
/// contend with.
#[derive(Debug, Clone)]
pub struct ChangeLog {
    path: PathBuf,
}

impl ChangeLog {
    /// Appender for the given campaign directory.
    pub fn for_campaign_dir(campaign_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: campaign_dir.into().join(CHANGE_LOG_FILE),
        }
    }

    /// Append one record as a JSON line.
    pub async fn append(&self, record: &ChangeRecord) -> StoreResult<()> {
        let line =
            serde_json::to_string(record).map_err(|source| StoreError::corrupt(&self.path, source))?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| StoreError::io(&self.path, source))?;

        file.write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|source| StoreError::io(&self.path, source))?;
        file.flush()
            .await
            .map_err(|source| StoreError::io(&self.path, source))
    }
}
