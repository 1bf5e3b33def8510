//! SQLite entity store implementation

use super::{EntityStore, FieldMerge};
use crate::codec;
use crate::config::StoreConfig;
use crate::graph::{CachedFields, EntityId, GraphEntity};
use crate::observe::{SyncObserver, TracingObserver};
use crate::{GraphCacheError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

const BIRTHDAY_FORMAT: &str = "%Y-%m-%d";

const SELECT_ENTITY: &str = r#"
    SELECT id, first_name, last_name, name, link, birthday, email,
           location, gender, locale, raw_document, created, updated
    FROM entities
"#;

/// SQLite-backed [`EntityStore`]
///
/// One connection behind a mutex; every multi-statement operation runs in a
/// transaction, so other readers never see a half-applied merge. WAL mode and
/// `busy_timeout` cover other processes sharing the file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    observer: Arc<dyn SyncObserver>,
}

impl SqliteStore {
    /// Open or create a store database
    pub fn open(config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %config.path.display(), "Opening entity store");

        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(config.busy_timeout())?;

        if config.wal_mode {
            conn.pragma_update(None, "journal_mode", &"WAL")?;
        }

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(config.path.clone()),
            observer: Arc::new(TracingObserver),
        };
        store.init_schema()?;

        Ok(store)
    }

    /// Create an in-memory store (for tests and throwaway caches)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            path: None,
            observer: Arc::new(TracingObserver),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Report corrupt stored documents to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.lock().execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS entities (
                id TEXT PRIMARY KEY,
                first_name TEXT,
                last_name TEXT,
                name TEXT,
                link TEXT,
                birthday TEXT,
                email TEXT,
                location TEXT,
                gender TEXT,
                locale TEXT,
                raw_document TEXT NOT NULL DEFAULT '',
                created TEXT NOT NULL,
                updated TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS relationships (
                entity_id TEXT NOT NULL,
                peer_id TEXT NOT NULL,
                created TEXT NOT NULL,
                PRIMARY KEY (entity_id, peer_id),
                FOREIGN KEY (entity_id) REFERENCES entities(id) ON DELETE CASCADE,
                FOREIGN KEY (peer_id) REFERENCES entities(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_entities_name ON entities(name);
            CREATE INDEX IF NOT EXISTS idx_entities_email ON entities(email);
            CREATE INDEX IF NOT EXISTS idx_relationships_peer ON relationships(peer_id);
            "#,
        )?;

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Entity store mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Entities whose cached name matches exactly
    pub fn find_by_name(&self, name: &str) -> Result<Vec<GraphEntity>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("{} WHERE name = ?1 ORDER BY id", SELECT_ENTITY))?;
        let observer = self.observer.as_ref();
        let rows = stmt.query_map(params![name], |row| row_to_entity(row, observer))?;

        let mut entities = Vec::new();
        for entity in rows {
            entities.push(entity?);
        }
        Ok(entities)
    }

    /// Get store statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock();
        let entity_count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        let stub_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE raw_document = ''",
            [],
            |row| row.get(0),
        )?;
        let directed: i64 = conn.query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))?;

        Ok(StoreStats {
            entity_count: entity_count as usize,
            stub_count: stub_count as usize,
            relationship_count: (directed / 2) as usize,
        })
    }

    /// Get the database path (None for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Store statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub entity_count: usize,
    /// Entities never fetched directly
    pub stub_count: usize,
    /// Undirected relationships
    pub relationship_count: usize,
}

impl EntityStore for SqliteStore {
    fn get(&self, id: &EntityId) -> Result<Option<GraphEntity>> {
        let conn = self.lock();
        Ok(load_entity(&conn, id, self.observer.as_ref())?)
    }

    fn get_or_create(&self, id: &EntityId) -> Result<(GraphEntity, bool)> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;

        let created = insert_stub(&tx, id, &now_text())?;
        let entity = load_entity(&tx, id, self.observer.as_ref())?
            .ok_or_else(|| GraphCacheError::StoreConflict(format!("entity {} vanished after insert", id)))?;

        tx.commit()?;

        if created {
            tracing::debug!(id = %id, "Created entity stub");
        }
        Ok((entity, created))
    }

    fn save(&self, entity: &GraphEntity) -> Result<GraphEntity> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;

        write_entity(&tx, entity, &now_text())?;
        let saved = load_entity(&tx, &entity.id, self.observer.as_ref())?
            .ok_or_else(|| GraphCacheError::StoreConflict(format!("entity {} vanished after save", entity.id)))?;

        tx.commit()?;
        Ok(saved)
    }

    fn merge(&self, id: &EntityId, update: &FieldMerge) -> Result<(GraphEntity, bool)> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;
        let now = now_text();

        let created = insert_stub(&tx, id, &now)?;
        let mut entity = load_entity(&tx, id, self.observer.as_ref())?
            .ok_or_else(|| GraphCacheError::StoreConflict(format!("entity {} vanished after insert", id)))?;

        let written = entity.fields.merge(&update.fields, update.policy);
        if let Some(ref raw) = update.raw_document {
            entity.raw_document = raw.clone();
        }

        if written > 0 || update.raw_document.is_some() {
            write_entity(&tx, &entity, &now)?;
            entity = load_entity(&tx, id, self.observer.as_ref())?
                .ok_or_else(|| GraphCacheError::StoreConflict(format!("entity {} vanished after merge", id)))?;
        }

        tx.commit()?;

        tracing::debug!(id = %id, created, fields_written = written, policy = ?update.policy, "Merged entity");
        Ok((entity, created))
    }

    fn add_relationship(&self, a: &EntityId, b: &EntityId) -> Result<bool> {
        if a == b {
            tracing::debug!(id = %a, "Ignoring self relationship");
            return Ok(false);
        }

        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;
        let now = now_text();

        insert_stub(&tx, a, &now)?;
        insert_stub(&tx, b, &now)?;

        let mut added = 0;
        for (from, to) in [(a, b), (b, a)] {
            added += tx.execute(
                "INSERT OR IGNORE INTO relationships (entity_id, peer_id, created) VALUES (?1, ?2, ?3)",
                params![from.as_str(), to.as_str(), now],
            )?;
        }

        tx.commit()?;
        Ok(added > 0)
    }

    fn list_relationships(&self, id: &EntityId) -> Result<BTreeSet<EntityId>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT peer_id FROM relationships WHERE entity_id = ?1")?;
        let rows = stmt.query_map(params![id.as_str()], |row| row.get::<_, String>(0))?;

        let mut peers = BTreeSet::new();
        for peer in rows {
            peers.insert(EntityId::new(peer?));
        }
        Ok(peers)
    }

    fn remove_relationship(&self, a: &EntityId, b: &EntityId) -> Result<bool> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;
        let removed = delete_pair(&tx, a, b)?;
        tx.commit()?;
        Ok(removed)
    }

    fn remove_relationships(&self, id: &EntityId, peers: &BTreeSet<EntityId>) -> Result<usize> {
        let conn = self.lock();
        let tx = conn.unchecked_transaction()?;

        let mut removed = 0;
        for peer in peers {
            if delete_pair(&tx, id, peer)? {
                removed += 1;
            }
        }

        tx.commit()?;
        Ok(removed)
    }

    fn count_entities(&self) -> Result<usize> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

// Helper functions shared by the trait methods; `conn` may be a transaction.

fn now_text() -> String {
    Utc::now().to_rfc3339()
}

fn insert_stub(conn: &Connection, id: &EntityId, now: &str) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO entities (id, raw_document, created, updated) VALUES (?1, '', ?2, ?2)
         ON CONFLICT(id) DO NOTHING",
        params![id.as_str(), now],
    )?;
    Ok(inserted == 1)
}

fn write_entity(conn: &Connection, entity: &GraphEntity, now: &str) -> rusqlite::Result<()> {
    let fields = &entity.fields;
    let birthday = fields.birthday.map(|d| d.format(BIRTHDAY_FORMAT).to_string());

    conn.execute(
        r#"
        INSERT INTO entities (
            id, first_name, last_name, name, link, birthday, email,
            location, gender, locale, raw_document, created, updated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
        ON CONFLICT(id) DO UPDATE SET
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            name = excluded.name,
            link = excluded.link,
            birthday = excluded.birthday,
            email = excluded.email,
            location = excluded.location,
            gender = excluded.gender,
            locale = excluded.locale,
            raw_document = excluded.raw_document,
            updated = excluded.updated
        "#,
        params![
            entity.id.as_str(),
            fields.first_name.as_deref(),
            fields.last_name.as_deref(),
            fields.name.as_deref(),
            fields.link.as_deref(),
            birthday,
            fields.email.as_deref(),
            fields.location.as_deref(),
            fields.gender.as_deref(),
            fields.locale.as_deref(),
            codec::encode(&entity.raw_document),
            now,
        ],
    )?;

    Ok(())
}

fn delete_pair(conn: &Connection, a: &EntityId, b: &EntityId) -> rusqlite::Result<bool> {
    let removed = conn.execute(
        "DELETE FROM relationships
         WHERE (entity_id = ?1 AND peer_id = ?2) OR (entity_id = ?2 AND peer_id = ?1)",
        params![a.as_str(), b.as_str()],
    )?;
    Ok(removed > 0)
}

fn load_entity(
    conn: &Connection,
    id: &EntityId,
    observer: &dyn SyncObserver,
) -> rusqlite::Result<Option<GraphEntity>> {
    conn.query_row(
        &format!("{} WHERE id = ?1", SELECT_ENTITY),
        params![id.as_str()],
        |row| row_to_entity(row, observer),
    )
    .optional()
}

fn parse_timestamp(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_entity(row: &Row<'_>, observer: &dyn SyncObserver) -> rusqlite::Result<GraphEntity> {
    let id: String = row.get(0)?;
    let birthday: Option<String> = row.get(5)?;
    let raw_text: String = row.get(10)?;
    let created: String = row.get(11)?;
    let updated: String = row.get(12)?;

    let birthday = birthday.and_then(|text| match NaiveDate::parse_from_str(&text, BIRTHDAY_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            tracing::warn!(id = %id, birthday = %text, error = %e, "Ignoring unreadable stored birthday");
            None
        }
    });

    let raw_document = codec::decode_observed(&raw_text, &format!("stored entity {}", id), observer);

    Ok(GraphEntity {
        fields: CachedFields {
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            name: row.get(3)?,
            link: row.get(4)?,
            birthday,
            email: row.get(6)?,
            location: row.get(7)?,
            gender: row.get(8)?,
            locale: row.get(9)?,
        },
        raw_document,
        created: parse_timestamp(11, &created)?,
        updated: parse_timestamp(12, &updated)?,
        id: EntityId::new(id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::RecordingObserver;
    use serde_json::json;
    use tempfile::TempDir;

    fn named(name: &str) -> CachedFields {
        CachedFields {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_store_creation() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::at(temp_dir.path().join("nested").join("graph.db"));

        let store = SqliteStore::open(&config).unwrap();
        assert!(store.path().unwrap().exists());
        assert_eq!(store.count_entities().unwrap(), 0);
    }

    #[test]
    fn test_data_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::at(temp_dir.path().join("graph.db"));
        let id = EntityId::new("4");

        {
            let store = SqliteStore::open(&config).unwrap();
            store
                .merge(&id, &FieldMerge::direct(json!({"id": "4", "name": "Mark"}), named("Mark")))
                .unwrap();
        }

        let store = SqliteStore::open(&config).unwrap();
        let entity = store.get(&id).unwrap().unwrap();
        assert_eq!(entity.fields.name.as_deref(), Some("Mark"));
        assert_eq!(entity.raw_document, json!({"id": "4", "name": "Mark"}));
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();
        let id = EntityId::new("4");

        let (first, created) = store.get_or_create(&id).unwrap();
        assert!(created);
        assert!(first.is_stub());

        let (second, created) = store.get_or_create(&id).unwrap();
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(store.count_entities().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_get_or_create_single_winner() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let id = EntityId::new("42");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                std::thread::spawn(move || store.get_or_create(&id).unwrap())
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
        assert!(results.iter().all(|(entity, _)| entity.created == results[0].0.created));
        assert_eq!(store.count_entities().unwrap(), 1);
    }

    #[test]
    fn test_save_keeps_created() {
        let store = SqliteStore::in_memory().unwrap();
        let (mut entity, _) = store.get_or_create(&EntityId::new("4")).unwrap();
        let created = entity.created;

        std::thread::sleep(std::time::Duration::from_millis(5));
        entity.fields.email = Some("zuck@example.com".to_string());
        let saved = store.save(&entity).unwrap();

        assert_eq!(saved.created, created);
        assert!(saved.updated > created);
        assert_eq!(saved.fields.email.as_deref(), Some("zuck@example.com"));
    }

    #[test]
    fn test_save_new_entity_sets_both_timestamps() {
        let store = SqliteStore::in_memory().unwrap();
        let saved = store.save(&GraphEntity::new("9")).unwrap();
        assert_eq!(saved.created, saved.updated);
    }

    #[test]
    fn test_merge_overwrite_keeps_absent_fields() {
        let store = SqliteStore::in_memory().unwrap();
        let id = EntityId::new("1");

        store
            .merge(&id, &FieldMerge::direct(json!({"name": "Alice"}), named("Alice")))
            .unwrap();

        let email_only = CachedFields {
            email: Some("a@x.com".to_string()),
            ..Default::default()
        };
        let (entity, created) = store
            .merge(&id, &FieldMerge::direct(json!({"email": "a@x.com"}), email_only))
            .unwrap();

        assert!(!created);
        assert_eq!(entity.fields.name.as_deref(), Some("Alice"));
        assert_eq!(entity.fields.email.as_deref(), Some("a@x.com"));
        // The raw document is the latest snapshot only
        assert_eq!(entity.raw_document, json!({"email": "a@x.com"}));
    }

    #[test]
    fn test_merge_fill_missing_does_not_overwrite() {
        let store = SqliteStore::in_memory().unwrap();
        let id = EntityId::new("2");

        store
            .merge(&id, &FieldMerge::direct(json!({"name": "Bob"}), named("Bob")))
            .unwrap();
        let (entity, _) = store.merge(&id, &FieldMerge::edge(named("Bob-stub"))).unwrap();

        assert_eq!(entity.fields.name.as_deref(), Some("Bob"));
        assert_eq!(entity.raw_document, json!({"name": "Bob"}));
    }

    #[test]
    fn test_merge_fill_missing_on_new_stub() {
        let store = SqliteStore::in_memory().unwrap();
        let (entity, created) = store
            .merge(&EntityId::new("3"), &FieldMerge::edge(named("Carol")))
            .unwrap();

        assert!(created);
        assert!(entity.is_stub());
        assert_eq!(entity.fields.name.as_deref(), Some("Carol"));
    }

    #[test]
    fn test_birthday_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let mut entity = GraphEntity::new("4");
        entity.fields.birthday = NaiveDate::from_ymd_opt(1984, 5, 14);

        let saved = store.save(&entity).unwrap();
        assert_eq!(saved.fields.birthday, NaiveDate::from_ymd_opt(1984, 5, 14));
    }

    #[test]
    fn test_corrupt_raw_document_reads_as_empty() {
        let observer = Arc::new(RecordingObserver::new());
        let store = SqliteStore::in_memory()
            .unwrap()
            .with_observer(observer.clone());
        let id = EntityId::new("7");
        store.get_or_create(&id).unwrap();

        store
            .lock()
            .execute(
                "UPDATE entities SET raw_document = '{not json' WHERE id = ?1",
                params![id.as_str()],
            )
            .unwrap();

        let entity = store.get(&id).unwrap().unwrap();
        assert_eq!(entity.raw_document, json!({}));
        assert_eq!(observer.malformed_count(), 1);
        assert_eq!(observer.malformed_contexts(), vec!["stored entity 7".to_string()]);
    }

    #[test]
    fn test_add_relationship_is_idempotent_and_symmetric() {
        let store = SqliteStore::in_memory().unwrap();
        let a = EntityId::new("1");
        let b = EntityId::new("2");

        assert!(store.add_relationship(&a, &b).unwrap());
        assert!(!store.add_relationship(&a, &b).unwrap());
        assert!(!store.add_relationship(&b, &a).unwrap());

        assert_eq!(store.list_relationships(&a).unwrap(), BTreeSet::from([b.clone()]));
        assert_eq!(store.list_relationships(&b).unwrap(), BTreeSet::from([a.clone()]));
        assert_eq!(store.stats().unwrap().relationship_count, 1);
    }

    #[test]
    fn test_add_relationship_creates_stubs() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .add_relationship(&EntityId::new("1"), &EntityId::new("2"))
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.entity_count, 2);
        assert_eq!(stats.stub_count, 2);
    }

    #[test]
    fn test_self_relationship_ignored() {
        let store = SqliteStore::in_memory().unwrap();
        let a = EntityId::new("1");

        assert!(!store.add_relationship(&a, &a).unwrap());
        assert!(store.list_relationships(&a).unwrap().is_empty());
    }

    #[test]
    fn test_remove_relationships() {
        let store = SqliteStore::in_memory().unwrap();
        let a = EntityId::new("1");
        for peer in ["2", "3", "4"] {
            store.add_relationship(&a, &EntityId::new(peer)).unwrap();
        }

        assert!(store.remove_relationship(&a, &EntityId::new("4")).unwrap());
        assert!(!store.remove_relationship(&a, &EntityId::new("4")).unwrap());

        let stale = BTreeSet::from([EntityId::new("3"), EntityId::new("99")]);
        assert_eq!(store.remove_relationships(&a, &stale).unwrap(), 1);

        assert_eq!(
            store.list_relationships(&a).unwrap(),
            BTreeSet::from([EntityId::new("2")])
        );
        assert!(store.list_relationships(&EntityId::new("3")).unwrap().is_empty());
    }

    #[test]
    fn test_deleting_entity_cascades_to_relationships() {
        let store = SqliteStore::in_memory().unwrap();
        let a = EntityId::new("1");
        store.add_relationship(&a, &EntityId::new("2")).unwrap();
        store.add_relationship(&a, &EntityId::new("3")).unwrap();

        store
            .lock()
            .execute("DELETE FROM entities WHERE id = ?1", params!["2"])
            .unwrap();

        assert_eq!(store.list_relationships(&a).unwrap(), BTreeSet::from([EntityId::new("3")]));
        assert_eq!(store.stats().unwrap().relationship_count, 1);
    }

    #[test]
    fn test_relationship_requires_both_entities() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&StoreConfig::at(temp_dir.path().join("graph.db"))).unwrap();

        let result = store.lock().execute(
            "INSERT INTO relationships (entity_id, peer_id, created) VALUES ('x', 'y', '2024-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_find_by_name() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .merge(&EntityId::new("1"), &FieldMerge::direct(json!({"name": "Alice"}), named("Alice")))
            .unwrap();
        store
            .merge(&EntityId::new("2"), &FieldMerge::edge(named("Bob")))
            .unwrap();

        let found = store.find_by_name("Alice").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "1");
        assert!(store.find_by_name("Nobody").unwrap().is_empty());
    }
}
