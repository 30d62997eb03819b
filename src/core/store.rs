//! Campaign Store
//!
//! The core orchestrator: campaign lifecycle, entity and encounter
//! persistence, world-state snapshotting, and change-log auditing, all
//! expressed through the manifest store and entity serializer. The manifest
//! and the files on disk are kept in lockstep here — no other component
//! mutates either.
//!
//! # Concurrency
//!
//! Single process, single user. All I/O is async but the store holds no
//! internal lock: at most one in-flight write per campaign is assumed, and
//! callers must await one mutation before starting the next against the same
//! campaign. Operations on different campaigns are independent.

use std::path::PathBuf;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::changelog::{ChangeKind, ChangeLog, ChangeRecord};
use super::entity::{stamp_for_write, EncounterRecord, EntityRecord, WorldState};
use super::error::{StoreError, StoreResult};
use super::manifest::{
    read_json, write_json_pretty, CharacterIndexEntry, EncounterIndexEntry, Manifest,
    ManifestStore, DEFAULT_RULESET,
};
use super::paths::{
    self, encounter_relative_path, entity_relative_path, is_valid_campaign_id, Role,
};

use chrono::{DateTime, Utc};

/// One row of `list_campaigns` output.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_saved_at: DateTime<Utc>,
    pub character_count: usize,
}

/// File-backed store for all campaigns under a single save root.
///
/// The save root is explicit construction state — there is no process-wide
/// current-campaign or current-root variable.
#[derive(Debug, Clone)]
pub struct CampaignStore {
    save_root: PathBuf,
}

impl CampaignStore {
    pub fn new(save_root: impl Into<PathBuf>) -> Self {
        Self {
            save_root: save_root.into(),
        }
    }

    pub fn save_root(&self) -> &std::path::Path {
        &self.save_root
    }

    fn campaign_dir(&self, campaign_id: &str) -> PathBuf {
        self.save_root.join(campaign_id)
    }

    fn manifest_store(&self, campaign_id: &str) -> ManifestStore {
        ManifestStore::new(campaign_id, self.campaign_dir(campaign_id))
    }

    fn change_log(&self, campaign_id: &str) -> ChangeLog {
        ChangeLog::for_campaign_dir(self.campaign_dir(campaign_id))
    }

    // ========================================================================
    // Campaign lifecycle
    // ========================================================================

    /// Create a campaign: folder tree, initial manifest, character template.
    ///
    /// Non-destructive — fails with `AlreadyExists` if the campaign directory
    /// is already present, and `InvalidArgument` if `id` is not a folder-safe
    /// token.
    pub async fn create_campaign(
        &self,
        id: &str,
        name: &str,
        ruleset: Option<&str>,
    ) -> StoreResult<Manifest> {
        if !is_valid_campaign_id(id) {
            return Err(StoreError::invalid_argument(format!(
                "campaign id is not a folder-safe token: {id:?}"
            )));
        }

        let campaign_dir = self.campaign_dir(id);
        if tokio::fs::try_exists(&campaign_dir)
            .await
            .map_err(|source| StoreError::io(&campaign_dir, source))?
        {
            return Err(StoreError::already_exists(format!("campaign {id}")));
        }

        for subdir in paths::CAMPAIGN_TREE {
            let dir = campaign_dir.join(subdir);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| StoreError::io(&dir, source))?;
        }

        let mut manifest = Manifest::new(id, name, ruleset.unwrap_or(DEFAULT_RULESET));
        self.manifest_store(id).save(&mut manifest).await?;

        let template = EntityRecord::template(Role::Main);
        write_json_pretty(&campaign_dir.join(paths::CHARACTER_TEMPLATE_FILE), &template).await?;

        self.change_log(id)
            .append(&ChangeRecord::system(
                ChangeKind::CampaignCreated,
                id,
                json!({ "name": name }),
            ))
            .await?;

        info!(campaign = %id, name = %name, "Campaign created");
        Ok(manifest)
    }

    /// Enumerate campaigns under the save root.
    ///
    /// A directory whose manifest is missing or unparseable is skipped with a
    /// warning rather than failing the whole listing — this runs on every app
    /// start, and one bad campaign must not block browsing the others. This
    /// is the only place the store swallows an error.
    pub async fn list_campaigns(&self) -> StoreResult<Vec<CampaignSummary>> {
        let mut entries = match tokio::fs::read_dir(&self.save_root).await {
            Ok(entries) => entries,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(source) => return Err(StoreError::io(&self.save_root, source)),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| StoreError::io(&self.save_root, source))?
        {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            let Some(dir_name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };

            match self.manifest_store(&dir_name).load().await {
                Ok(manifest) => summaries.push(CampaignSummary {
                    id: manifest.campaign.id,
                    name: manifest.campaign.name,
                    created_at: manifest.campaign.created_at,
                    last_saved_at: manifest.campaign.last_saved_at,
                    character_count: manifest.indices.characters.len(),
                }),
                Err(err) => {
                    warn!(campaign = %dir_name, error = %err, "Skipping unreadable campaign");
                }
            }
        }

        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    /// Recursively remove a campaign's folder tree. Idempotent — deleting a
    /// campaign that does not exist is not an error.
    pub async fn delete_campaign(&self, campaign_id: &str) -> StoreResult<()> {
        let campaign_dir = self.campaign_dir(campaign_id);
        match tokio::fs::remove_dir_all(&campaign_dir).await {
            Ok(()) => {
                info!(campaign = %campaign_id, "Campaign deleted");
                Ok(())
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::io(&campaign_dir, source)),
        }
    }

    // ========================================================================
    // Entities
    // ========================================================================

    /// Insert or update an entity record.
    ///
    /// Allocates an id when the record has none, applies revision/timestamp
    /// stamping against the previous on-disk record, writes the entity file,
    /// updates the manifest index, and appends a change-log line. Returns the
    /// fully stamped record.
    ///
    /// A supplied id must already be indexed, and its role must match the
    /// indexed role; either violation fails with `InvalidArgument` before
    /// anything is written.
    pub async fn upsert_entity(
        &self,
        campaign_id: &str,
        record: EntityRecord,
    ) -> StoreResult<EntityRecord> {
        let manifest_store = self.manifest_store(campaign_id);
        let mut manifest = manifest_store.load().await?;
        let campaign_dir = self.campaign_dir(campaign_id);
        let role = record.role;

        // A caller-supplied id must already be indexed — ids are only ever
        // minted from the manifest counters, and accepting an arbitrary one
        // would let a later allocation collide with it.
        let id = match record.id.as_deref() {
            Some(id) if !id.is_empty() => {
                if manifest.character_entry(id).is_none() {
                    return Err(StoreError::invalid_argument(format!(
                        "unknown entity id {id}; omit the id to mint a new one"
                    )));
                }
                id.to_string()
            }
            _ => manifest.allocate_character_id(role),
        };

        // Previous on-disk record is the stamping baseline. An index entry
        // whose file has gone missing falls back to a first write. The role
        // is fixed at mint time — the id prefix and storage folder both
        // encode it, so a role change on an indexed id is rejected rather
        // than leaving an orphaned file under the old role folder.
        let existing = match manifest.character_entry(&id) {
            Some(entry) => {
                if entry.role != role {
                    return Err(StoreError::invalid_argument(format!(
                        "entity {id} is indexed as role {}, not {role}",
                        entry.role
                    )));
                }
                let path = campaign_dir.join(&entry.path);
                match read_json::<EntityRecord>(&path, &format!("entity {id}")).await {
                    Ok(prev) => Some(prev),
                    Err(StoreError::NotFound(_)) => None,
                    Err(err) => return Err(err),
                }
            }
            None => None,
        };

        let mut record = record;
        record.id = Some(id.clone());
        let stamped = stamp_for_write(existing.as_ref(), record);

        let rel_path = entity_relative_path(role, &id);
        let file_path = campaign_dir.join(&rel_path);
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::io(parent, source))?;
        }
        write_json_pretty(&file_path, &stamped).await?;

        manifest.upsert_character_entry(CharacterIndexEntry {
            id: id.clone(),
            role,
            path: rel_path,
            name: stamped.identity.name.clone(),
            level: stamped.identity.level,
        });
        manifest_store.save(&mut manifest).await?;

        self.change_log(campaign_id)
            .append(&ChangeRecord::system(
                ChangeKind::EntityUpserted,
                &id,
                json!({
                    "name": stamped.identity.name,
                    "level": stamped.identity.level,
                    "revision": stamped.provenance.revision,
                }),
            ))
            .await?;

        debug!(
            campaign = %campaign_id,
            entity = %id,
            revision = stamped.provenance.revision,
            "Entity upserted"
        );
        Ok(stamped)
    }

    /// Fetch an entity by id. The manifest index is authoritative — an id
    /// absent from the index is `NotFound` without any directory scan.
    pub async fn get_entity(&self, campaign_id: &str, id: &str) -> StoreResult<EntityRecord> {
        let manifest = self.manifest_store(campaign_id).load().await?;
        let entry = manifest
            .character_entry(id)
            .ok_or_else(|| StoreError::not_found(format!("entity {id}")))?;

        let path = self.campaign_dir(campaign_id).join(&entry.path);
        read_json(&path, &format!("entity {id}")).await
    }

    /// All entities of one role, loaded in index order.
    pub async fn get_entities_by_role(
        &self,
        campaign_id: &str,
        role: Role,
    ) -> StoreResult<Vec<EntityRecord>> {
        let manifest = self.manifest_store(campaign_id).load().await?;
        let campaign_dir = self.campaign_dir(campaign_id);

        let mut records = Vec::new();
        for entry in manifest.indices.characters.iter().filter(|e| e.role == role) {
            let path = campaign_dir.join(&entry.path);
            records.push(read_json(&path, &format!("entity {}", entry.id)).await?);
        }
        Ok(records)
    }

    /// Case-insensitive substring search against indexed display names.
    pub async fn search_entities_by_name(
        &self,
        campaign_id: &str,
        term: &str,
    ) -> StoreResult<Vec<EntityRecord>> {
        let manifest = self.manifest_store(campaign_id).load().await?;
        let campaign_dir = self.campaign_dir(campaign_id);
        let needle = term.to_lowercase();

        let mut records = Vec::new();
        for entry in &manifest.indices.characters {
            if !entry.name.to_lowercase().contains(&needle) {
                continue;
            }
            let path = campaign_dir.join(&entry.path);
            records.push(read_json(&path, &format!("entity {}", entry.id)).await?);
        }
        Ok(records)
    }

    /// Delete an entity: remove the file and prune the manifest index entry.
    pub async fn delete_entity(&self, campaign_id: &str, id: &str) -> StoreResult<()> {
        let manifest_store = self.manifest_store(campaign_id);
        let mut manifest = manifest_store.load().await?;

        let entry = manifest
            .remove_character_entry(id)
            .ok_or_else(|| StoreError::not_found(format!("entity {id}")))?;

        let path = self.campaign_dir(campaign_id).join(&entry.path);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(StoreError::io(&path, source)),
        }
        manifest_store.save(&mut manifest).await?;

        self.change_log(campaign_id)
            .append(&ChangeRecord::system(
                ChangeKind::EntityDeleted,
                id,
                json!({ "role": entry.role }),
            ))
            .await?;

        debug!(campaign = %campaign_id, entity = %id, "Entity deleted");
        Ok(())
    }

    /// Rebuild the character index from the entity files on disk.
    ///
    /// The index is a cache over a layout fully derivable from (role, id);
    /// this regenerates it after external edits or a manifest rolled back by
    /// hand. Counters are left untouched.
    pub async fn rebuild_character_index(&self, campaign_id: &str) -> StoreResult<Manifest> {
        let manifest_store = self.manifest_store(campaign_id);
        let mut manifest = manifest_store.load().await?;
        let campaign_dir = self.campaign_dir(campaign_id);

        let mut rebuilt = Vec::new();
        for role in Role::ALL {
            let role_dir = campaign_dir.join("characters").join(role.folder_name());
            let mut entries = match tokio::fs::read_dir(&role_dir).await {
                Ok(entries) => entries,
                Err(source) if source.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(StoreError::io(&role_dir, source)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|source| StoreError::io(&role_dir, source))?
            {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let record: EntityRecord = read_json(&path, "entity file").await?;
                let Some(id) = record.id.clone() else {
                    warn!(path = %path.display(), "Entity file without id skipped during rebuild");
                    continue;
                };
                rebuilt.push(CharacterIndexEntry {
                    path: entity_relative_path(record.role, &id),
                    id,
                    role: record.role,
                    name: record.identity.name.clone(),
                    level: record.identity.level,
                });
            }
        }

        rebuilt.sort_by(|a, b| a.id.cmp(&b.id));
        manifest.indices.characters = rebuilt;
        manifest_store.save(&mut manifest).await?;

        info!(
            campaign = %campaign_id,
            characters = manifest.indices.characters.len(),
            "Character index rebuilt"
        );
        Ok(manifest)
    }

    // ========================================================================
    // Encounters
    // ========================================================================

    /// Create an encounter: allocate an id, write the record, index it, and
    /// log the change. Encounters carry no revision counter.
    pub async fn create_encounter(
        &self,
        campaign_id: &str,
        record: EncounterRecord,
    ) -> StoreResult<EncounterRecord> {
        let manifest_store = self.manifest_store(campaign_id);
        let mut manifest = manifest_store.load().await?;
        let campaign_dir = self.campaign_dir(campaign_id);

        let id = match record.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => manifest.allocate_encounter_id(),
        };
        let mut record = record;
        record.id = Some(id.clone());

        let rel_path = encounter_relative_path(&id);
        let file_path = campaign_dir.join(&rel_path);
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::io(parent, source))?;
        }
        write_json_pretty(&file_path, &record).await?;

        manifest.upsert_encounter_entry(EncounterIndexEntry {
            id: id.clone(),
            path: rel_path,
            title: record.title.clone(),
        });
        manifest_store.save(&mut manifest).await?;

        self.change_log(campaign_id)
            .append(&ChangeRecord::system(
                ChangeKind::EncounterCreated,
                &id,
                json!({ "title": record.title }),
            ))
            .await?;

        debug!(campaign = %campaign_id, encounter = %id, "Encounter created");
        Ok(record)
    }

    /// Fetch an encounter by id via the manifest index.
    pub async fn get_encounter(&self, campaign_id: &str, id: &str) -> StoreResult<EncounterRecord> {
        let manifest = self.manifest_store(campaign_id).load().await?;
        let entry = manifest
            .encounter_entry(id)
            .ok_or_else(|| StoreError::not_found(format!("encounter {id}")))?;

        let path = self.campaign_dir(campaign_id).join(&entry.path);
        read_json(&path, &format!("encounter {id}")).await
    }

    // ========================================================================
    // World state
    // ========================================================================

    /// Overwrite the singleton world-state snapshot. Not indexed and not
    /// id-allocated; no history is retained.
    pub async fn save_world_state(
        &self,
        campaign_id: &str,
        payload: Map<String, Value>,
    ) -> StoreResult<WorldState> {
        // Load the manifest purely to enforce the campaign state machine:
        // world saves against an uninitialized or deleted campaign fail
        // NotFound.
        self.manifest_store(campaign_id).load().await?;
        let campaign_dir = self.campaign_dir(campaign_id);

        let world = WorldState::now(payload);
        write_json_pretty(&campaign_dir.join(paths::WORLD_FILE), &world).await?;

        let location = world.location_tag().unwrap_or("");
        self.change_log(campaign_id)
            .append(&ChangeRecord::system(
                ChangeKind::WorldSaved,
                campaign_id,
                json!({ "location": location }),
            ))
            .await?;

        debug!(campaign = %campaign_id, location = %location, "World state saved");
        Ok(world)
    }

    /// Read the current world-state snapshot.
    pub async fn get_world_state(&self, campaign_id: &str) -> StoreResult<WorldState> {
        self.manifest_store(campaign_id).load().await?;
        let path = self.campaign_dir(campaign_id).join(paths::WORLD_FILE);
        read_json(&path, &format!("world state for campaign {campaign_id}")).await
    }
}
