use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::{InsertOutcome, NewUser, User};

/// Credential store. Uniqueness of `username` is enforced by the store itself
/// and reported as [`InsertOutcome::DuplicateKey`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_normalized_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn insert(&self, user: NewUser) -> anyhow::Result<InsertOutcome>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_normalized_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, username, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> anyhow::Result<InsertOutcome> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(created) => Ok(InsertOutcome::Created(created)),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Ok(InsertOutcome::DuplicateKey)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store keyed by normalized username.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_normalized_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> anyhow::Result<InsertOutcome> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Ok(InsertOutcome::DuplicateKey);
        }
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(created.username.clone(), created.clone());
        Ok(InsertOutcome::Created(created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.into(),
            password_hash: "$argon2id$placeholder".into(),
        }
    }

    #[tokio::test]
    async fn insert_then_find() {
        let store = MemoryUserStore::new();
        let created = match store.insert(new_user("alice")).await.unwrap() {
            InsertOutcome::Created(u) => u,
            InsertOutcome::DuplicateKey => panic!("unexpected duplicate"),
        };
        let by_name = store.find_by_normalized_username("alice").await.unwrap();
        assert_eq!(by_name.map(|u| u.id), Some(created.id));
        let by_id = store.find_by_id(created.id).await.unwrap();
        assert_eq!(by_id.map(|u| u.username), Some("alice".to_string()));
        assert!(store.find_by_normalized_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_insert_is_duplicate_key() {
        let store = MemoryUserStore::new();
        store.insert(new_user("alice")).await.unwrap();
        assert!(matches!(
            store.insert(new_user("alice")).await.unwrap(),
            InsertOutcome::DuplicateKey
        ));
    }

    #[tokio::test]
    async fn concurrent_inserts_create_exactly_one() {
        let store = Arc::new(MemoryUserStore::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.insert(new_user("carol")).await.unwrap() })
            })
            .collect();

        let mut created = 0;
        for h in handles {
            if let InsertOutcome::Created(_) = h.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            password_hash: "secret-hash".into(),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("alice"));
        assert!(!json.contains("secret-hash"));
    }
}
