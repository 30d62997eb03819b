//! Entity Serializer
//!
//! Defines the on-disk JSON shapes for character-shaped entities, encounters,
//! and the world-state snapshot, plus the revision/timestamp stamping applied
//! on every write. Pure transforms only — all I/O lives in the campaign
//! store.
//!
//! Per-class resource data genuinely varies between classes, so `skills`,
//! `savingThrows`, `equipment`, `spells`, and `mechanics` stay schema-less at
//! the storage layer; only the envelope fields are validated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::paths::Role;

/// Current on-disk schema version for all record envelopes.
pub const SCHEMA_VERSION: u32 = 1;

/// Envelope tag for character-shaped records.
pub const ENTITY_TAG_CHARACTER: &str = "character";
/// Envelope tag for encounter records.
pub const ENTITY_TAG_ENCOUNTER: &str = "encounter";

// ============================================================================
// Entity record
// ============================================================================

/// A character-shaped record (player character, companion, enemy, or NPC),
/// discriminated by `role`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub schema_version: u32,
    /// Constant envelope tag, always [`ENTITY_TAG_CHARACTER`].
    pub entity: String,
    /// Sequential id (`main-0001`, ...). Absent on first upsert; the store
    /// allocates one from the manifest counters.
    #[serde(default)]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub identity: Identity,
    #[serde(default)]
    pub stats: Abilities,
    #[serde(default)]
    pub derived: Derived,
    #[serde(default)]
    pub skills: Map<String, Value>,
    #[serde(default)]
    pub saving_throws: Map<String, Value>,
    #[serde(default)]
    pub equipment: Vec<Value>,
    #[serde(default)]
    pub spells: Map<String, Value>,
    /// Free-form per-class resource bag (ki points, rage uses, ...).
    #[serde(default)]
    pub mechanics: Map<String, Value>,
    #[serde(default)]
    pub state: EntityState,
    #[serde(default)]
    pub relationships: Relationships,
    #[serde(default)]
    pub provenance: Provenance,
}

/// Who the entity is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Identity {
    pub name: String,
    pub race: String,
    pub class: String,
    pub subclass: String,
    pub level: u32,
    pub alignment: String,
    pub background: String,
    pub tags: Vec<String>,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: String::new(),
            race: String::new(),
            class: String::new(),
            subclass: String::new(),
            level: 1,
            alignment: String::new(),
            background: String::new(),
            tags: Vec::new(),
        }
    }
}

/// The six ability scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Abilities {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl Default for Abilities {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

/// Values derived from class/level, denormalized for play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Derived {
    pub hit_die: String,
    pub max_hp: i32,
    pub armor_class: i32,
    pub speed: i32,
    pub proficiency_bonus: i32,
}

impl Default for Derived {
    fn default() -> Self {
        Self {
            hit_die: "d8".to_string(),
            max_hp: 10,
            armor_class: 10,
            speed: 30,
            proficiency_bonus: 2,
        }
    }
}

/// In-play condition of the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityState {
    pub status: String,
    pub conditions: Vec<String>,
    pub exhaustion: u8,
    pub location: String,
}

impl Default for EntityState {
    fn default() -> Self {
        Self {
            status: "alive".to_string(),
            conditions: Vec::new(),
            exhaustion: 0,
            location: String::new(),
        }
    }
}

/// Back-references to other entities. Never ownership — the campaign owns
/// everything beneath it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Relationships {
    pub party_id: Option<String>,
    pub allies: Vec<String>,
    pub enemies: Vec<String>,
}

/// Write bookkeeping: creation/update timestamps and the monotonically
/// increasing revision counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

impl Default for Provenance {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }
}

impl EntityRecord {
    /// A fully defaulted envelope for the given role: zeroed stats at 10,
    /// proficiency bonus 2, empty collections. Written as the on-disk
    /// character template and used as the base callers merge real data into.
    pub fn template(role: Role) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            entity: ENTITY_TAG_CHARACTER.to_string(),
            id: None,
            role,
            identity: Identity::default(),
            stats: Abilities::default(),
            derived: Derived::default(),
            skills: Map::new(),
            saving_throws: Map::new(),
            equipment: Vec::new(),
            spells: Map::new(),
            mechanics: Map::new(),
            state: EntityState::default(),
            relationships: Relationships::default(),
            provenance: Provenance::default(),
        }
    }
}

/// Apply revision/timestamp bookkeeping for a write.
///
/// This is the single place revision logic lives — callers never hand-roll
/// it. With no prior record the result carries `revision = 1` and
/// `createdAt = updatedAt = now`; with a prior record, `createdAt` is copied
/// forward, `updatedAt` is re-stamped, and `revision` increments by exactly
/// one.
pub fn stamp_for_write(existing: Option<&EntityRecord>, incoming: EntityRecord) -> EntityRecord {
    let now = Utc::now();
    let mut record = incoming;
    record.schema_version = SCHEMA_VERSION;
    record.entity = ENTITY_TAG_CHARACTER.to_string();

    record.provenance = match existing {
        Some(prev) => Provenance {
            created_at: prev.provenance.created_at,
            updated_at: now,
            revision: prev.provenance.revision + 1,
        },
        None => Provenance {
            created_at: now,
            updated_at: now,
            revision: 1,
        },
    };

    record
}

// ============================================================================
// Encounter record
// ============================================================================

/// An encounter, sharing the entity id-allocation and indexing discipline but
/// with no revision counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterRecord {
    pub schema_version: u32,
    /// Constant envelope tag, always [`ENTITY_TAG_ENCOUNTER`].
    pub entity: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub participants: Vec<Value>,
    #[serde(default)]
    pub state: Map<String, Value>,
}

impl EncounterRecord {
    /// A fresh encounter with the given title, started now.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            entity: ENTITY_TAG_ENCOUNTER.to_string(),
            id: None,
            title: title.into(),
            started_at: Utc::now(),
            participants: Vec::new(),
            state: Map::new(),
        }
    }
}

// ============================================================================
// World-state snapshot
// ============================================================================

/// The singleton per-campaign world snapshot: free-form world/location/
/// faction data plus the save timestamp. Fully overwritten on each save, no
/// history retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldState {
    pub saved_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl WorldState {
    /// Wrap a free-form payload with a fresh save timestamp.
    pub fn now(payload: Map<String, Value>) -> Self {
        Self {
            saved_at: Utc::now(),
            payload,
        }
    }

    /// The `location` tag from the payload, if present. Used for change-log
    /// summaries.
    pub fn location_tag(&self) -> Option<&str> {
        self.payload.get("location").and_then(Value::as_str)
    }
}
