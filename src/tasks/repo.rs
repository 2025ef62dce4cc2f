use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo_types::{NewTask, Task, TaskUpdate};

/// Task persistence. Every operation is scoped to `owner`; tasks of other
/// users behave as if they did not exist.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn list(&self, owner: Uuid) -> anyhow::Result<Vec<Task>>;
    async fn create(&self, owner: Uuid, task: NewTask) -> anyhow::Result<Task>;
    async fn update(&self, owner: Uuid, id: Uuid, update: TaskUpdate)
        -> anyhow::Result<Option<Task>>;
    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgTaskStore {
    db: PgPool,
}

impl PgTaskStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn list(&self, owner: Uuid) -> anyhow::Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, user_id, title, description, completed, created_at
            FROM tasks
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn create(&self, owner: Uuid, task: NewTask) -> anyhow::Result<Task> {
        let row = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (user_id, title, description)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, title, description, completed, created_at
            "#,
        )
        .bind(owner)
        .bind(&task.title)
        .bind(&task.description)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        update: TaskUpdate,
    ) -> anyhow::Result<Option<Task>> {
        let row = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET title       = COALESCE($3, title),
                description = CASE WHEN $4 THEN $5 ELSE description END,
                completed   = COALESCE($6, completed)
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, title, description, completed, created_at
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(&update.title)
        .bind(update.description.is_some())
        .bind(update.description.flatten())
        .bind(update.completed)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(r#"DELETE FROM tasks WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-process store; tasks are kept in insertion order.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: RwLock<Vec<Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn list(&self, owner: Uuid) -> anyhow::Result<Vec<Task>> {
        Ok(self
            .tasks
            .read()
            .await
            .iter()
            .rev()
            .filter(|t| t.user_id == owner)
            .cloned()
            .collect())
    }

    async fn create(&self, owner: Uuid, task: NewTask) -> anyhow::Result<Task> {
        let task = Task {
            id: Uuid::new_v4(),
            user_id: owner,
            title: task.title,
            description: task.description,
            completed: false,
            created_at: OffsetDateTime::now_utc(),
        };
        self.tasks.write().await.push(task.clone());
        Ok(task)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        update: TaskUpdate,
    ) -> anyhow::Result<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.iter_mut().find(|t| t.id == id && t.user_id == owner) else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            task.title = title;
        }
        if let Some(description) = update.description {
            task.description = description;
        }
        if let Some(completed) = update.completed {
            task.completed = completed;
        }
        Ok(Some(task.clone()))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|t| !(t.id == id && t.user_id == owner));
        Ok(tasks.len() != before)
    }
}
