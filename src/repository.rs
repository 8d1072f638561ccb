use crate::models::{Classroom, Homework, Identity, Lecture, Module, Profile, Video};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Collection
///
/// The named document sets held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Classrooms,
    Modules,
    Homework,
    Lectures,
    Videos,
    Profiles,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Classrooms => "classrooms",
            Collection::Modules => "modules",
            Collection::Homework => "homework",
            Collection::Lectures => "lectures",
            Collection::Videos => "videos",
            Collection::Profiles => "profiles",
        }
    }
}

/// Document
///
/// A record persisted as one JSON document. `parent_id` is the id of the direct
/// parent and is indexed so children can be listed without scanning the parent.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> Uuid;

    fn parent_id(&self) -> Option<Uuid>;
}

impl Document for Classroom {
    const COLLECTION: Collection = Collection::Classrooms;

    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        None
    }
}

impl Document for Module {
    const COLLECTION: Collection = Collection::Modules;

    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        Some(self.classroom_id)
    }
}

impl Document for Homework {
    const COLLECTION: Collection = Collection::Homework;

    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        Some(self.module_id)
    }
}

impl Document for Lecture {
    const COLLECTION: Collection = Collection::Lectures;

    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        Some(self.module_id)
    }
}

impl Document for Video {
    const COLLECTION: Collection = Collection::Videos;

    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        Some(self.lecture_id)
    }
}

impl Document for Profile {
    const COLLECTION: Collection = Collection::Profiles;

    fn id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn parent_id(&self) -> Option<Uuid> {
        None
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("document encoding error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Write
///
/// One step of an atomic `Repository::commit`.
#[derive(Debug, Clone)]
pub enum Write {
    Put {
        collection: Collection,
        id: Uuid,
        parent_id: Option<Uuid>,
        body: Value,
    },
    Delete {
        collection: Collection,
        id: Uuid,
    },
}

impl Write {
    /// Insert-or-replace of `doc`.
    pub fn put<D: Document>(doc: &D) -> Result<Self, StoreError> {
        Ok(Write::Put {
            collection: D::COLLECTION,
            id: doc.id(),
            parent_id: doc.parent_id(),
            body: serde_json::to_value(doc)?,
        })
    }

    pub fn delete<D: Document>(id: Uuid) -> Self {
        Write::Delete {
            collection: D::COLLECTION,
            id,
        }
    }
}

/// Repository Trait
///
/// The document store contract. Reads return raw JSON documents; the typed helpers
/// on `dyn Repository` below decode them. Every mutation goes through `commit`,
/// which applies all of its writes or none of them, so a child document and its
/// parent's id list never diverge after a failed request.
///
/// **Send + Sync + async_trait** are required to make `Arc<dyn Repository>` usable
/// across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find(&self, collection: Collection, id: Uuid) -> Result<Option<Value>, StoreError>;

    // Children of `parent_id` in creation order.
    async fn find_children(
        &self,
        collection: Collection,
        parent_id: Uuid,
    ) -> Result<Vec<Value>, StoreError>;

    // Classrooms where `actor` is an owner or a member.
    async fn find_classrooms_for(&self, actor: Identity) -> Result<Vec<Classroom>, StoreError>;

    // Case-insensitive substring match on the classroom name.
    async fn search_classrooms(&self, query: &str) -> Result<Vec<Classroom>, StoreError>;

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError>;
}

impl dyn Repository {
    pub async fn load<D: Document>(&self, id: Uuid) -> Result<Option<D>, StoreError> {
        match self.find(D::COLLECTION, id).await? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    pub async fn load_children<D: Document>(&self, parent_id: Uuid) -> Result<Vec<D>, StoreError> {
        self.find_children(D::COLLECTION, parent_id)
            .await?
            .into_iter()
            .map(|body| serde_json::from_value(body).map_err(StoreError::from))
            .collect()
    }

    pub async fn save<D: Document>(&self, doc: &D) -> Result<(), StoreError> {
        let write = Write::put(doc)?;
        self.commit(vec![write]).await
    }

    pub async fn delete_by_id<D: Document>(&self, id: Uuid) -> Result<(), StoreError> {
        self.commit(vec![Write::delete::<D>(id)]).await
    }
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Escapes LIKE wildcards so the query is matched literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// PostgresRepository
///
/// `Repository` backed by a single JSONB `documents` table.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// ensure_schema
    ///
    /// Creates the `documents` table and its parent index if they do not exist.
    /// Safe to call on every startup.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id UUID NOT NULL,
                parent_id UUID,
                body JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS documents_parent_idx ON documents (collection, parent_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn decode_classrooms(rows: Vec<Value>) -> Result<Vec<Classroom>, StoreError> {
        rows.into_iter()
            .map(|body| serde_json::from_value(body).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find(&self, collection: Collection, id: Uuid) -> Result<Option<Value>, StoreError> {
        let body = sqlx::query_scalar::<_, Value>(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(body)
    }

    async fn find_children(
        &self,
        collection: Collection,
        parent_id: Uuid,
    ) -> Result<Vec<Value>, StoreError> {
        let rows = sqlx::query_scalar::<_, Value>(
            r#"
            SELECT body FROM documents
            WHERE collection = $1 AND parent_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(collection.as_str())
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// find_classrooms_for
    ///
    /// Uses the JSONB `?` operator: ids are stored as strings inside the
    /// `owner_ids` / `member_ids` arrays.
    async fn find_classrooms_for(&self, actor: Identity) -> Result<Vec<Classroom>, StoreError> {
        let rows = sqlx::query_scalar::<_, Value>(
            r#"
            SELECT body FROM documents
            WHERE collection = 'classrooms'
              AND (body->'owner_ids' ? $1 OR body->'member_ids' ? $1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(actor.to_string())
        .fetch_all(&self.pool)
        .await?;
        Self::decode_classrooms(rows)
    }

    async fn search_classrooms(&self, query: &str) -> Result<Vec<Classroom>, StoreError> {
        let rows = sqlx::query_scalar::<_, Value>(
            r#"
            SELECT body FROM documents
            WHERE collection = 'classrooms' AND body->>'name' ILIKE $1
            ORDER BY body->>'name' ASC
            "#,
        )
        .bind(like_pattern(query))
        .fetch_all(&self.pool)
        .await?;
        Self::decode_classrooms(rows)
    }

    /// commit
    ///
    /// Applies all writes inside one transaction. Dropping `tx` on an early `?`
    /// rolls everything back.
    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for write in writes {
            match write {
                Write::Put {
                    collection,
                    id,
                    parent_id,
                    body,
                } => {
                    sqlx::query(
                        r#"
                        INSERT INTO documents (collection, id, parent_id, body)
                        VALUES ($1, $2, $3, $4)
                        ON CONFLICT (collection, id)
                        DO UPDATE SET body = EXCLUDED.body,
                                      parent_id = EXCLUDED.parent_id,
                                      updated_at = NOW()
                        "#,
                    )
                    .bind(collection.as_str())
                    .bind(id)
                    .bind(parent_id)
                    .bind(body)
                    .execute(&mut *tx)
                    .await?;
                }
                Write::Delete { collection, id } => {
                    sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                        .bind(collection.as_str())
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

// --- In-Memory Implementation ---

struct StoredDocument {
    parent_id: Option<Uuid>,
    body: Value,
    // Insertion sequence; preserved across replacements to keep creation order.
    seq: u64,
}

#[derive(Default)]
struct Tables {
    documents: HashMap<(Collection, Uuid), StoredDocument>,
    next_seq: u64,
}

/// InMemoryRepository
///
/// `Repository` held in process memory. Used by the test suites and by local runs
/// with `STORE_BACKEND=memory`. A commit takes the write lock once, so its writes are
/// observed together or not at all. `set_unavailable` makes every call fail, for
/// exercising the storage-failure paths.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of documents currently held in `collection`.
    pub async fn count(&self, collection: Collection) -> usize {
        self.tables
            .read()
            .await
            .documents
            .keys()
            .filter(|(c, _)| *c == collection)
            .count()
    }

    async fn classrooms_matching<F>(&self, predicate: F) -> Result<Vec<Classroom>, StoreError>
    where
        F: Fn(&Classroom) -> bool + Send,
    {
        let tables = self.tables.read().await;
        let mut matches = Vec::new();
        for ((collection, _), stored) in tables.documents.iter() {
            if *collection != Collection::Classrooms {
                continue;
            }
            let classroom: Classroom = serde_json::from_value(stored.body.clone())?;
            if predicate(&classroom) {
                matches.push((stored.seq, classroom));
            }
        }
        matches.sort_by_key(|(seq, _)| *seq);
        Ok(matches.into_iter().map(|(_, classroom)| classroom).collect())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find(&self, collection: Collection, id: Uuid) -> Result<Option<Value>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .documents
            .get(&(collection, id))
            .map(|stored| stored.body.clone()))
    }

    async fn find_children(
        &self,
        collection: Collection,
        parent_id: Uuid,
    ) -> Result<Vec<Value>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut children: Vec<&StoredDocument> = tables
            .documents
            .iter()
            .filter(|((c, _), stored)| *c == collection && stored.parent_id == Some(parent_id))
            .map(|(_, stored)| stored)
            .collect();
        children.sort_by_key(|stored| stored.seq);
        Ok(children.into_iter().map(|stored| stored.body.clone()).collect())
    }

    async fn find_classrooms_for(&self, actor: Identity) -> Result<Vec<Classroom>, StoreError> {
        self.check_available()?;
        self.classrooms_matching(|classroom| classroom.is_participant(&actor))
            .await
    }

    async fn search_classrooms(&self, query: &str) -> Result<Vec<Classroom>, StoreError> {
        self.check_available()?;
        let needle = query.to_lowercase();
        let mut found = self
            .classrooms_matching(|classroom| classroom.name.to_lowercase().contains(&needle))
            .await?;
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        for write in writes {
            match write {
                Write::Put {
                    collection,
                    id,
                    parent_id,
                    body,
                } => {
                    let seq = match tables.documents.get(&(collection, id)) {
                        Some(existing) => existing.seq,
                        None => {
                            tables.next_seq += 1;
                            tables.next_seq
                        }
                    };
                    tables.documents.insert(
                        (collection, id),
                        StoredDocument {
                            parent_id,
                            body,
                            seq,
                        },
                    );
                }
                Write::Delete { collection, id } => {
                    tables.documents.remove(&(collection, id));
                }
            }
        }

        Ok(())
    }
}
