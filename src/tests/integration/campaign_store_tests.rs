//! End-to-end tests for the campaign store against temp save roots.

use serde_json::{json, Map, Value};
use tempfile::TempDir;

use crate::core::changelog::{ChangeKind, ChangeRecord};
use crate::core::entity::{EncounterRecord, EntityRecord};
use crate::core::error::StoreError;
use crate::core::paths::{Role, CHANGE_LOG_FILE, CHARACTER_TEMPLATE_FILE, MANIFEST_FILE};
use crate::core::store::CampaignStore;

fn temp_store() -> (TempDir, CampaignStore) {
    let dir = tempfile::tempdir().expect("create temp save root");
    let store = CampaignStore::new(dir.path());
    (dir, store)
}

fn named_entity(role: Role, name: &str) -> EntityRecord {
    let mut record = EntityRecord::template(role);
    record.identity.name = name.to_string();
    record
}

async fn read_change_lines(dir: &TempDir, campaign_id: &str) -> Vec<ChangeRecord> {
    let contents =
        tokio::fs::read_to_string(dir.path().join(campaign_id).join(CHANGE_LOG_FILE))
            .await
            .expect("read change log");
    contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("parse change line"))
        .collect()
}

// ============================================================================
// Campaign lifecycle
// ============================================================================

#[tokio::test]
async fn test_create_campaign_builds_tree_and_template() {
    let (dir, store) = temp_store();
    let manifest = store.create_campaign("camp1", "Test", None).await.unwrap();

    assert_eq!(manifest.campaign.id, "camp1");
    assert_eq!(manifest.campaign.name, "Test");
    assert_eq!(manifest.campaign.ruleset, "DND5E-es");
    assert!(manifest.indices.characters.is_empty());
    assert_eq!(manifest.counters.last_character_num, 0);

    let root = dir.path().join("camp1");
    for subdir in [
        "characters/character",
        "characters/companions",
        "characters/enemies",
        "characters/npcs",
        "encounters",
        "inventory",
        "logs",
        "templates",
    ] {
        assert!(root.join(subdir).is_dir(), "missing {subdir}");
    }
    assert!(root.join(MANIFEST_FILE).is_file());

    let template: EntityRecord =
        serde_json::from_str(&std::fs::read_to_string(root.join(CHARACTER_TEMPLATE_FILE)).unwrap())
            .unwrap();
    assert_eq!(template.role, Role::Main);
    assert_eq!(template.stats.strength, 10);
}

#[tokio::test]
async fn test_create_campaign_collision_is_non_destructive() {
    let (_dir, store) = temp_store();
    store.create_campaign("camp1", "First", None).await.unwrap();
    store
        .upsert_entity("camp1", named_entity(Role::Main, "Aria"))
        .await
        .unwrap();

    let err = store
        .create_campaign("camp1", "Second", None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(_)));

    // Existing data untouched.
    let manifest = store.list_campaigns().await.unwrap();
    assert_eq!(manifest[0].name, "First");
    assert_eq!(manifest[0].character_count, 1);
}

#[tokio::test]
async fn test_create_campaign_rejects_unsafe_id() {
    let (_dir, store) = temp_store();
    for bad in ["", "..", "a/b", "spaced id"] {
        let err = store.create_campaign(bad, "X", None).await.unwrap_err();
        assert!(
            matches!(err, StoreError::InvalidArgument(_)),
            "id {bad:?} should be rejected"
        );
    }
}

#[tokio::test]
async fn test_list_campaigns_empty_root() {
    let (_dir, store) = temp_store();
    assert!(store.list_campaigns().await.unwrap().is_empty());

    let store = CampaignStore::new("/nonexistent/save/root");
    assert!(store.list_campaigns().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_campaign_is_skipped_not_fatal() {
    let (dir, store) = temp_store();
    store.create_campaign("healthy", "Good", None).await.unwrap();

    // Truncated manifest in a second campaign directory.
    let broken = dir.path().join("broken");
    tokio::fs::create_dir_all(&broken).await.unwrap();
    tokio::fs::write(broken.join(MANIFEST_FILE), "{\"schemaVersion\": 1,")
        .await
        .unwrap();
    // And one directory with no manifest at all.
    tokio::fs::create_dir_all(dir.path().join("empty"))
        .await
        .unwrap();

    let campaigns = store.list_campaigns().await.unwrap();
    assert_eq!(campaigns.len(), 1);
    assert_eq!(campaigns[0].id, "healthy");
}

#[tokio::test]
async fn test_delete_campaign_is_final_and_idempotent() {
    let (dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();
    store
        .upsert_entity("camp1", named_entity(Role::Main, "Aria"))
        .await
        .unwrap();

    store.delete_campaign("camp1").await.unwrap();
    assert!(!dir.path().join("camp1").exists());
    assert!(store.list_campaigns().await.unwrap().is_empty());

    // Subsequent operations fail NotFound.
    let err = store.get_entity("camp1", "main-0001").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    let err = store
        .upsert_entity("camp1", named_entity(Role::Main, "Aria"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    // Deleting again is not an error.
    store.delete_campaign("camp1").await.unwrap();
}

#[tokio::test]
async fn test_operations_on_uninitialized_campaign_fail_not_found() {
    let (_dir, store) = temp_store();
    let err = store
        .upsert_entity("ghost", named_entity(Role::Main, "Aria"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    let err = store
        .save_world_state("ghost", Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    let err = store
        .create_encounter("ghost", EncounterRecord::new("Ambush"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

// ============================================================================
// Entities
// ============================================================================

#[tokio::test]
async fn test_example_scenario() {
    // The spec-level walkthrough: create, first upsert, level-up upsert,
    // query by role.
    let (_dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();

    let first = store
        .upsert_entity("camp1", named_entity(Role::Main, "Aria"))
        .await
        .unwrap();
    assert_eq!(first.id.as_deref(), Some("main-0001"));
    assert_eq!(first.provenance.revision, 1);

    let mut update = first.clone();
    update.identity.level = 2;
    let second = store.upsert_entity("camp1", update).await.unwrap();
    assert_eq!(second.id.as_deref(), Some("main-0001"));
    assert_eq!(second.provenance.revision, 2);
    assert_eq!(second.identity.name, "Aria");
    assert_eq!(second.identity.level, 2);

    let mains = store.get_entities_by_role("camp1", Role::Main).await.unwrap();
    assert_eq!(mains.len(), 1);
    assert_eq!(mains[0].identity.level, 2);
}

#[tokio::test]
async fn test_monotonic_revisions() {
    let (_dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();

    let mut record = named_entity(Role::Companion, "Bram");
    let mut created_at = None;
    let mut last_updated = None;
    for n in 1..=5u64 {
        record = store.upsert_entity("camp1", record).await.unwrap();
        assert_eq!(record.provenance.revision, n);

        match created_at {
            None => created_at = Some(record.provenance.created_at),
            Some(first) => assert_eq!(record.provenance.created_at, first),
        }
        if let Some(prev) = last_updated {
            assert!(record.provenance.updated_at >= prev);
        }
        last_updated = Some(record.provenance.updated_at);
    }
}

#[tokio::test]
async fn test_manifest_and_file_stay_in_lockstep() {
    let (dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();

    let mut record = named_entity(Role::Enemy, "Goblin Boss");
    record
        .mechanics
        .insert("rageUses".to_string(), Value::from(3));
    let stamped = store.upsert_entity("camp1", record).await.unwrap();
    let id = stamped.id.clone().unwrap();

    // Indexed with denormalized name/level, and the path resolves.
    let manifest: crate::core::manifest::Manifest = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("camp1").join(MANIFEST_FILE)).unwrap(),
    )
    .unwrap();
    let entry = manifest.character_entry(&id).expect("indexed");
    assert_eq!(entry.role, Role::Enemy);
    assert_eq!(entry.name, "Goblin Boss");
    assert_eq!(entry.path, format!("characters/enemies/{id}.json"));
    assert!(dir.path().join("camp1").join(&entry.path).is_file());

    // Round-trip: reading back by id reproduces the stamped record.
    let loaded = store.get_entity("camp1", &id).await.unwrap();
    assert_eq!(loaded, stamped);
}

#[tokio::test]
async fn test_id_allocation_across_role_interleaving() {
    let (_dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();

    let a = store
        .upsert_entity("camp1", named_entity(Role::Main, "Aria"))
        .await
        .unwrap();
    let b = store
        .upsert_entity("camp1", named_entity(Role::Companion, "Bram"))
        .await
        .unwrap();
    let c = store
        .upsert_entity("camp1", named_entity(Role::Main, "Cora"))
        .await
        .unwrap();
    let d = store
        .upsert_entity("camp1", named_entity(Role::Enemy, "Drow"))
        .await
        .unwrap();

    let ids: Vec<_> = [&a, &b, &c, &d]
        .iter()
        .map(|r| r.id.clone().unwrap())
        .collect();
    assert_eq!(ids, ["main-0001", "companion-0002", "main-0003", "enemy-0004"]);

    // Strictly increasing sequence numbers for the shared counter, distinct
    // ids regardless of role interleaving.
    let nums: Vec<u64> = ids
        .iter()
        .map(|id| id.rsplit_once('-').unwrap().1.parse().unwrap())
        .collect();
    assert!(nums.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_upsert_rejects_role_change_on_indexed_id() {
    let (dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();
    let first = store
        .upsert_entity("camp1", named_entity(Role::Main, "Aria"))
        .await
        .unwrap();
    let id = first.id.clone().unwrap();

    let mut turned = first.clone();
    turned.role = Role::Npc;
    let err = store.upsert_entity("camp1", turned).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));

    // Nothing moved: the original file is still the only one, and the index
    // still points at it under the main-role folder.
    assert!(dir
        .path()
        .join("camp1/characters/character")
        .join(format!("{id}.json"))
        .is_file());
    assert!(!dir
        .path()
        .join("camp1/characters/npcs")
        .join(format!("{id}.json"))
        .exists());
    let loaded = store.get_entity("camp1", &id).await.unwrap();
    assert_eq!(loaded.role, Role::Main);
    assert_eq!(loaded.provenance.revision, 1);
}

#[tokio::test]
async fn test_upsert_rejects_unminted_supplied_id() {
    let (_dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();

    let mut forged = named_entity(Role::Main, "Impostor");
    forged.id = Some("main-0005".to_string());
    let err = store.upsert_entity("camp1", forged).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));

    // The counter was not consumed: the next mint starts at 1, and the
    // forged id can never be revision-bumped by a later allocation.
    let minted = store
        .upsert_entity("camp1", named_entity(Role::Main, "Aria"))
        .await
        .unwrap();
    assert_eq!(minted.id.as_deref(), Some("main-0001"));
    let err = store.get_entity("camp1", "main-0005").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_get_entity_unknown_id_not_found() {
    let (_dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();
    let err = store.get_entity("camp1", "main-0099").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_get_entities_by_role_preserves_index_order() {
    let (_dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();
    for name in ["Uno", "Dos", "Tres"] {
        store
            .upsert_entity("camp1", named_entity(Role::Npc, name))
            .await
            .unwrap();
    }
    store
        .upsert_entity("camp1", named_entity(Role::Main, "Aria"))
        .await
        .unwrap();

    let npcs = store.get_entities_by_role("camp1", Role::Npc).await.unwrap();
    let names: Vec<_> = npcs.iter().map(|r| r.identity.name.as_str()).collect();
    assert_eq!(names, ["Uno", "Dos", "Tres"]);
}

#[tokio::test]
async fn test_search_is_case_insensitive_substring() {
    let (_dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();
    store
        .upsert_entity("camp1", named_entity(Role::Main, "Aria Stormwind"))
        .await
        .unwrap();
    store
        .upsert_entity("camp1", named_entity(Role::Npc, "Mariana"))
        .await
        .unwrap();
    store
        .upsert_entity("camp1", named_entity(Role::Enemy, "Goblin"))
        .await
        .unwrap();

    let hits = store.search_entities_by_name("camp1", "ARIA").await.unwrap();
    let names: Vec<_> = hits.iter().map(|r| r.identity.name.as_str()).collect();
    assert_eq!(names, ["Aria Stormwind", "Mariana"]);

    assert!(store
        .search_entities_by_name("camp1", "dragon")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_delete_entity_prunes_index_and_file() {
    let (dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();
    let record = store
        .upsert_entity("camp1", named_entity(Role::Companion, "Bram"))
        .await
        .unwrap();
    let id = record.id.clone().unwrap();

    store.delete_entity("camp1", &id).await.unwrap();

    let err = store.get_entity("camp1", &id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    assert!(!dir
        .path()
        .join("camp1/characters/companions")
        .join(format!("{id}.json"))
        .exists());

    let err = store.delete_entity("camp1", &id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_rebuild_character_index_from_disk() {
    let (dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();
    store
        .upsert_entity("camp1", named_entity(Role::Main, "Aria"))
        .await
        .unwrap();
    store
        .upsert_entity("camp1", named_entity(Role::Npc, "Tavernkeep"))
        .await
        .unwrap();

    // Wipe the index by hand, simulating a manifest rolled back externally.
    let manifest_path = dir.path().join("camp1").join(MANIFEST_FILE);
    let mut manifest: crate::core::manifest::Manifest =
        serde_json::from_str(&std::fs::read_to_string(&manifest_path).unwrap()).unwrap();
    manifest.indices.characters.clear();
    std::fs::write(
        &manifest_path,
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();

    let rebuilt = store.rebuild_character_index("camp1").await.unwrap();
    let ids: Vec<_> = rebuilt
        .indices
        .characters
        .iter()
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(ids, ["main-0001", "npc-0002"]);

    let aria = store.get_entity("camp1", "main-0001").await.unwrap();
    assert_eq!(aria.identity.name, "Aria");
}

// ============================================================================
// Encounters and world state
// ============================================================================

#[tokio::test]
async fn test_create_and_get_encounter() {
    let (_dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();

    let mut encounter = EncounterRecord::new("Ambush at the bridge");
    encounter.participants.push(json!({"id": "main-0001"}));
    let created = store.create_encounter("camp1", encounter).await.unwrap();
    assert_eq!(created.id.as_deref(), Some("encounter-0001"));

    let loaded = store
        .get_encounter("camp1", "encounter-0001")
        .await
        .unwrap();
    assert_eq!(loaded, created);

    let second = store
        .create_encounter("camp1", EncounterRecord::new("Boss fight"))
        .await
        .unwrap();
    assert_eq!(second.id.as_deref(), Some("encounter-0002"));

    let err = store
        .get_encounter("camp1", "encounter-0009")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_world_state_is_overwritten_whole() {
    let (_dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();

    let mut payload = Map::new();
    payload.insert("location".to_string(), Value::from("Phandalin"));
    payload.insert("weather".to_string(), Value::from("rain"));
    store.save_world_state("camp1", payload).await.unwrap();

    let mut payload = Map::new();
    payload.insert("location".to_string(), Value::from("Neverwinter"));
    store.save_world_state("camp1", payload).await.unwrap();

    let world = store.get_world_state("camp1").await.unwrap();
    assert_eq!(world.location_tag(), Some("Neverwinter"));
    // No history: the earlier weather key is gone.
    assert!(world.payload.get("weather").is_none());
}

// ============================================================================
// Change log
// ============================================================================

#[tokio::test]
async fn test_change_log_records_every_mutation() {
    let (dir, store) = temp_store();
    store.create_campaign("camp1", "Test", None).await.unwrap();
    let record = store
        .upsert_entity("camp1", named_entity(Role::Main, "Aria"))
        .await
        .unwrap();
    store
        .create_encounter("camp1", EncounterRecord::new("Ambush"))
        .await
        .unwrap();
    let mut payload = Map::new();
    payload.insert("location".to_string(), Value::from("Phandalin"));
    store.save_world_state("camp1", payload).await.unwrap();
    store
        .delete_entity("camp1", record.id.as_deref().unwrap())
        .await
        .unwrap();

    let lines = read_change_lines(&dir, "camp1").await;
    let kinds: Vec<_> = lines.iter().map(|l| l.kind).collect();
    assert_eq!(
        kinds,
        [
            ChangeKind::CampaignCreated,
            ChangeKind::EntityUpserted,
            ChangeKind::EncounterCreated,
            ChangeKind::WorldSaved,
            ChangeKind::EntityDeleted,
        ]
    );

    assert_eq!(lines[1].id, "main-0001");
    assert_eq!(lines[1].patch["revision"], 1);
    assert_eq!(lines[3].patch["location"], "Phandalin");

    // Timestamps never decrease down the log.
    assert!(lines.windows(2).all(|w| w[0].ts <= w[1].ts));
}
