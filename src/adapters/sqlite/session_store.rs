//! SQLite implementation of the SessionStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime};
use crate::domain::models::{format_timestamp, next_timestamp, Session, SessionStatus, UnknownStatus};
use crate::domain::ports::{SessionStore, StoreError, StoreResult};

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stamp `updated_at` strictly after `previous` (and no earlier than `floor`).
    async fn advance_updated_at(
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
        previous: &str,
        floor: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let next = next_timestamp(parse_datetime(previous)?);
        let updated_at = floor.map_or(next, |floor| next.max(floor));

        sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(format_timestamp(updated_at))
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run a single-column update that also advances `updated_at`.
    ///
    /// The first statement of every write transaction here is itself a write,
    /// so SQLite takes the write lock up front and waits out `busy_timeout`.
    /// Reading first would pin a snapshot that cannot be upgraded once
    /// another connection commits.
    async fn update_column(&self, id: &str, column: &'static str, value: Option<String>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("UPDATE sessions SET {column} = ? WHERE id = ? RETURNING updated_at");
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(value)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let (previous,) = row.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        Self::advance_updated_at(&mut tx, id, &previous, None).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, session: &Session) -> StoreResult<()> {
        let result = sqlx::query(
            r#"INSERT INTO sessions (id, name, status, external_id, is_active, last_seen, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(&session.id)
        .bind(&session.name)
        .bind(session.status.as_str())
        .bind(&session.external_id)
        .bind(session.is_active)
        .bind(session.last_seen.map(format_timestamp))
        .bind(format_timestamp(session.created_at))
        .bind(format_timestamp(session.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::AlreadyExists(session.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<Session> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| StoreError::NotFound(id.to_string()))?.try_into()
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<Session> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| StoreError::NotFound(name.to_string()))?.try_into()
    }

    async fn list(&self) -> StoreResult<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as("SELECT * FROM sessions ORDER BY created_at, name")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_active(&self) -> StoreResult<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM sessions WHERE is_active = 1 ORDER BY created_at, name"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, session: &Session) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String,)> = sqlx::query_as(
            r#"UPDATE sessions SET name = ?, status = ?, external_id = ?, is_active = ?, last_seen = ?
               WHERE id = ?
               RETURNING updated_at"#
        )
        .bind(&session.name)
        .bind(session.status.as_str())
        .bind(&session.external_id)
        .bind(session.is_active)
        .bind(session.last_seen.map(format_timestamp))
        .bind(&session.id)
        .fetch_optional(&mut *tx)
        .await?;
        let (previous,) = row.ok_or_else(|| StoreError::NotFound(session.id.clone()))?;

        Self::advance_updated_at(&mut tx, &session.id, &previous, Some(session.updated_at)).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn update_status(&self, id: &str, status: SessionStatus) -> StoreResult<()> {
        self.update_column(id, "status", Some(status.as_str().to_string())).await
    }

    async fn update_last_seen(&self, id: &str, last_seen: DateTime<Utc>) -> StoreResult<()> {
        self.update_column(id, "last_seen", Some(format_timestamp(last_seen))).await
    }

    async fn update_external_id(&self, id: &str, external_id: &str) -> StoreResult<()> {
        self.update_column(id, "external_id", Some(external_id.to_string())).await
    }

    async fn exists_by_name(&self, name: &str) -> StoreResult<bool> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM sessions WHERE name = ?)")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn get_sessions_with_external_id(&self) -> StoreResult<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM sessions WHERE external_id != '' ORDER BY created_at, name"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    name: String,
    status: String,
    external_id: String,
    is_active: bool,
    last_seen: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status: SessionStatus = row
            .status
            .parse()
            .map_err(|e: UnknownStatus| StoreError::Serialization(e.to_string()))?;

        Ok(Session {
            id: row.id,
            name: row.name,
            status,
            external_id: row.external_id,
            is_active: row.is_active,
            last_seen: parse_optional_datetime(row.last_seen)?,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, initialize_database, PoolConfig};
    use futures::future::join_all;

    async fn setup_test_store() -> SqliteSessionStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteSessionStore::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let store = setup_test_store().await;
        let session = Session::new("alpha");
        store.create(&session).await.unwrap();

        let by_id = store.get_by_id(&session.id).await.unwrap();
        assert_eq!(by_id, session);

        let by_name = store.get_by_name("alpha").await.unwrap();
        assert_eq!(by_name.id, session.id);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_already_exists() {
        let store = setup_test_store().await;
        store.create(&Session::new("alpha")).await.unwrap();

        let err = store.create(&Session::new("alpha")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(name) if name == "alpha"));
        assert!(store.exists_by_name("alpha").await.unwrap());
        assert!(!store.exists_by_name("beta").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_session_is_not_found() {
        let store = setup_test_store().await;

        assert!(matches!(store.get_by_id("nope").await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.get_by_name("nope").await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("nope").await, Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.update_status("nope", SessionStatus::Connecting).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_status_advances_updated_at() {
        let store = setup_test_store().await;
        let session = Session::new("alpha");
        store.create(&session).await.unwrap();

        store.update_status(&session.id, SessionStatus::Connecting).await.unwrap();
        let first = store.get_by_id(&session.id).await.unwrap();
        assert_eq!(first.status, SessionStatus::Connecting);
        assert!(first.updated_at > session.updated_at);

        store.update_status(&session.id, SessionStatus::Disconnected).await.unwrap();
        let second = store.get_by_id(&session.id).await.unwrap();
        assert!(second.updated_at > first.updated_at);
    }

    #[tokio::test]
    async fn test_update_fields() {
        let store = setup_test_store().await;
        let session = Session::new("alpha");
        store.create(&session).await.unwrap();

        let seen = Utc::now();
        store.update_external_id(&session.id, "1555@s.net").await.unwrap();
        store.update_last_seen(&session.id, seen).await.unwrap();

        let stored = store.get_by_id(&session.id).await.unwrap();
        assert_eq!(stored.external_id, "1555@s.net");
        assert_eq!(
            stored.last_seen.map(format_timestamp),
            Some(format_timestamp(seen))
        );

        let authenticated = store.get_sessions_with_external_id().await.unwrap();
        assert_eq!(authenticated.len(), 1);
    }

    #[tokio::test]
    async fn test_update_whole_record_and_list_active() {
        let store = setup_test_store().await;
        let mut alpha = Session::new("alpha");
        let beta = Session::new("beta");
        store.create(&alpha).await.unwrap();
        store.create(&beta).await.unwrap();

        alpha.deactivate();
        store.update(&alpha).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);

        let active = store.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "beta");
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let store = setup_test_store().await;
        let session = Session::new("alpha");
        store.create(&session).await.unwrap();

        store.delete(&session.id).await.unwrap();
        assert!(matches!(store.get_by_id(&session.id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_of_missing_record_is_not_found() {
        let store = setup_test_store().await;
        let ghost = Session::new("ghost");

        assert!(matches!(store.update(&ghost).await, Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.update_last_seen(&ghost.id, Utc::now()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_distinct_rows_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("sessions.db").display());
        let store = SqliteSessionStore::new(initialize_database(&url, PoolConfig::default()).await.unwrap());

        let mut sessions = Vec::new();
        for i in 0..20 {
            let session = Session::new(format!("s{i}"));
            store.create(&session).await.unwrap();
            sessions.push(session);
        }

        for round in 0..10 {
            let status = if round % 2 == 0 {
                SessionStatus::Connecting
            } else {
                SessionStatus::Disconnected
            };
            let writes = sessions.iter().map(|s| {
                let store = store.clone();
                let id = s.id.clone();
                tokio::spawn(async move { store.update_status(&id, status).await })
            });

            for result in join_all(writes).await {
                result.unwrap().unwrap();
            }
        }

        let mut whole = store.get_by_id(&sessions[0].id).await.unwrap();
        whole.external_id = "1555@s.net".to_string();
        let updates = sessions.iter().skip(1).map(|s| {
            let store = store.clone();
            let id = s.id.clone();
            tokio::spawn(async move { store.update_external_id(&id, "1555@s.net").await })
        });
        let (whole_result, others) = tokio::join!(store.update(&whole), join_all(updates));
        whole_result.unwrap();
        for result in others {
            result.unwrap().unwrap();
        }

        for session in store.list().await.unwrap() {
            assert_eq!(session.status, SessionStatus::Disconnected);
            assert_eq!(session.external_id, "1555@s.net");
        }
    }
}
