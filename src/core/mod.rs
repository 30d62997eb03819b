//! Campaign Save-Data Core
//!
//! Provides the embedded save-data store for solo campaigns: path/identity
//! derivation, entity serialization, the per-campaign manifest index, the
//! campaign store orchestrator, and the append-only change log.

pub mod changelog;
pub mod entity;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod paths;
pub mod store;

pub use changelog::{ChangeActor, ChangeKind, ChangeLog, ChangeRecord};
pub use entity::{
    stamp_for_write, Abilities, Derived, EncounterRecord, EntityRecord, Identity, Provenance,
    Relationships, WorldState, SCHEMA_VERSION,
};
pub use error::{StoreError, StoreResult};
pub use manifest::{
    CampaignMeta, CharacterIndexEntry, Counters, EncounterIndexEntry, Indices, Manifest,
    ManifestStore,
};
pub use paths::{next_id, slugify, Role};
pub use store::{CampaignStore, CampaignSummary};
