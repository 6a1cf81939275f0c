use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Row, Sqlite, Transaction, sqlite::SqlitePool};
use taskflow_core::{
    ObjectiveStatus, QualityLevel, StepStatus, TaskStatus, TaskType, Objective, Step, Task,
    Workflow, WorkflowCheckpoint, WorkflowStatus, WorkflowType,
};

use crate::error::{Result, StoreError};
use crate::traits::{Store, WorkflowMutation};

/// Sqlite-backed implementation of the Persistence Contract (spec.md §4.4),
/// grounded in `adk-session/src/database.rs`'s `CREATE TABLE IF NOT EXISTS`
/// migration style, transaction-wrapped multi-table writes, and JSON-column
/// (de)serialization.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS objectives (
                objective_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                query TEXT NOT NULL,
                status TEXT NOT NULL,
                priority INTEGER NOT NULL,
                user_id TEXT,
                tags TEXT NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                result_summary TEXT,
                error_message TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                task_id TEXT PRIMARY KEY,
                objective_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                task_type TEXT NOT NULL,
                status TEXT NOT NULL,
                priority INTEGER NOT NULL,
                depends_on TEXT NOT NULL,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                result_summary TEXT,
                error_message TEXT,
                quality_assessment TEXT,
                metadata TEXT NOT NULL,
                heartbeat_at TEXT,
                FOREIGN KEY (objective_id) REFERENCES objectives(objective_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS steps (
                step_id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                step_type TEXT NOT NULL,
                status TEXT NOT NULL,
                agent_name TEXT NOT NULL,
                priority INTEGER NOT NULL,
                input_data TEXT NOT NULL,
                output_data TEXT,
                error_message TEXT,
                retry_count INTEGER NOT NULL,
                max_retries INTEGER NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                quality_assessment TEXT,
                metadata TEXT NOT NULL,
                FOREIGN KEY (task_id) REFERENCES tasks(task_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                workflow_id TEXT PRIMARY KEY,
                objective_id TEXT NOT NULL,
                workflow_type TEXT NOT NULL,
                status TEXT NOT NULL,
                current_node TEXT,
                is_paused INTEGER NOT NULL,
                serialized_state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                FOREIGN KEY (objective_id) REFERENCES objectives(objective_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_checkpoints (
                checkpoint_id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                node_name TEXT NOT NULL,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (workflow_id) REFERENCES workflows(workflow_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_objective_tx(tx: &mut Transaction<'_, Sqlite>, objective: &Objective) -> Result<()> {
        let tags = serde_json::to_string(&objective.tags)?;
        let metadata = serde_json::to_string(&objective.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO objectives (objective_id, title, description, query, status, priority,
                user_id, tags, metadata, created_at, started_at, completed_at, result_summary, error_message)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(objective_id) DO UPDATE SET
                title = excluded.title, description = excluded.description, query = excluded.query,
                status = excluded.status, priority = excluded.priority, user_id = excluded.user_id,
                tags = excluded.tags, metadata = excluded.metadata, started_at = excluded.started_at,
                completed_at = excluded.completed_at, result_summary = excluded.result_summary,
                error_message = excluded.error_message
            "#,
        )
        .bind(&objective.objective_id)
        .bind(&objective.title)
        .bind(&objective.description)
        .bind(&objective.query)
        .bind(serde_json::to_string(&objective.status)?)
        .bind(objective.priority as i64)
        .bind(&objective.user_id)
        .bind(tags)
        .bind(metadata)
        .bind(objective.created_at.to_rfc3339())
        .bind(objective.started_at.map(|t| t.to_rfc3339()))
        .bind(objective.completed_at.map(|t| t.to_rfc3339()))
        .bind(&objective.result_summary)
        .bind(&objective.error_message)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn upsert_task_tx(tx: &mut Transaction<'_, Sqlite>, task: &Task) -> Result<()> {
        let depends_on: Vec<&str> = task.depends_on.iter().map(String::as_str).collect();
        let depends_on = serde_json::to_string(&depends_on)?;
        let metadata = serde_json::to_string(&task.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO tasks (task_id, objective_id, title, description, task_type, status, priority,
                depends_on, created_at, started_at, completed_at, result_summary, error_message,
                quality_assessment, metadata, heartbeat_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(task_id) DO UPDATE SET
                title = excluded.title, description = excluded.description, task_type = excluded.task_type,
                status = excluded.status, priority = excluded.priority, depends_on = excluded.depends_on,
                started_at = excluded.started_at, completed_at = excluded.completed_at,
                result_summary = excluded.result_summary, error_message = excluded.error_message,
                quality_assessment = excluded.quality_assessment, metadata = excluded.metadata,
                heartbeat_at = excluded.heartbeat_at
            "#,
        )
        .bind(&task.task_id)
        .bind(&task.objective_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(serde_json::to_string(&task.task_type)?)
        .bind(serde_json::to_string(&task.status)?)
        .bind(task.priority as i64)
        .bind(depends_on)
        .bind(task.created_at.to_rfc3339())
        .bind(task.started_at.map(|t| t.to_rfc3339()))
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .bind(&task.result_summary)
        .bind(&task.error_message)
        .bind(task.quality_assessment.map(|q| serde_json::to_string(&q)).transpose()?)
        .bind(metadata)
        .bind(task.heartbeat_at.map(|t| t.to_rfc3339()))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn upsert_step_tx(tx: &mut Transaction<'_, Sqlite>, step: &Step) -> Result<()> {
        let metadata = serde_json::to_string(&step.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO steps (step_id, task_id, title, description, step_type, status, agent_name,
                priority, input_data, output_data, error_message, retry_count, max_retries,
                started_at, completed_at, quality_assessment, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(step_id) DO UPDATE SET
                title = excluded.title, description = excluded.description, step_type = excluded.step_type,
                status = excluded.status, agent_name = excluded.agent_name, priority = excluded.priority,
                input_data = excluded.input_data, output_data = excluded.output_data,
                error_message = excluded.error_message, retry_count = excluded.retry_count,
                max_retries = excluded.max_retries, started_at = excluded.started_at,
                completed_at = excluded.completed_at, quality_assessment = excluded.quality_assessment,
                metadata = excluded.metadata
            "#,
        )
        .bind(&step.step_id)
        .bind(&step.task_id)
        .bind(&step.title)
        .bind(&step.description)
        .bind(&step.step_type)
        .bind(serde_json::to_string(&step.status)?)
        .bind(&step.agent_name)
        .bind(step.priority as i64)
        .bind(serde_json::to_string(&step.input_data)?)
        .bind(step.output_data.as_ref().map(serde_json::to_string).transpose()?)
        .bind(&step.error_message)
        .bind(step.retry_count as i64)
        .bind(step.max_retries as i64)
        .bind(step.started_at.map(|t| t.to_rfc3339()))
        .bind(step.completed_at.map(|t| t.to_rfc3339()))
        .bind(step.quality_assessment.map(|q| serde_json::to_string(&q)).transpose()?)
        .bind(metadata)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn upsert_workflow_tx(tx: &mut Transaction<'_, Sqlite>, workflow: &Workflow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflows (workflow_id, objective_id, workflow_type, status, current_node,
                is_paused, serialized_state, created_at, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(workflow_id) DO UPDATE SET
                status = excluded.status, current_node = excluded.current_node,
                is_paused = excluded.is_paused, serialized_state = excluded.serialized_state,
                started_at = excluded.started_at, completed_at = excluded.completed_at
            "#,
        )
        .bind(&workflow.workflow_id)
        .bind(&workflow.objective_id)
        .bind(serde_json::to_string(&workflow.workflow_type)?)
        .bind(serde_json::to_string(&workflow.status)?)
        .bind(&workflow.current_node)
        .bind(workflow.is_paused)
        .bind(serde_json::to_string(&workflow.serialized_state)?)
        .bind(workflow.created_at.to_rfc3339())
        .bind(workflow.started_at.map(|t| t.to_rfc3339()))
        .bind(workflow.completed_at.map(|t| t.to_rfc3339()))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_checkpoint_tx(tx: &mut Transaction<'_, Sqlite>, checkpoint: &WorkflowCheckpoint) -> Result<()> {
        sqlx::query(
            "INSERT INTO workflow_checkpoints (checkpoint_id, workflow_id, node_name, state, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&checkpoint.checkpoint_id)
        .bind(&checkpoint.workflow_id)
        .bind(&checkpoint.node_name)
        .bind(serde_json::to_string(&checkpoint.state)?)
        .bind(checkpoint.created_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Database(format!("bad timestamp: {e}")))
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_objective(&self, objective: &Objective) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_objective_tx(&mut tx, objective).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_task(&self, task: &Task) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_task_tx(&mut tx, task).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_step(&self, step: &Step) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_step_tx(&mut tx, step).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_workflow(&self, workflow: &Workflow) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_workflow_tx(&mut tx, workflow).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.create_workflow(workflow).await
    }

    async fn create_checkpoint(&self, checkpoint: &WorkflowCheckpoint) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_checkpoint_tx(&mut tx, checkpoint).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_objective_status(
        &self,
        id: &str,
        status: ObjectiveStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE objectives SET status = ?, completed_at = ? WHERE objective_id = ?")
            .bind(serde_json::to_string(&status)?)
            .bind(completed_at.map(|t| t.to_rfc3339()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("objective {id}")));
        }
        Ok(())
    }

    async fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<()> {
        let result = sqlx::query("UPDATE tasks SET status = ? WHERE task_id = ?")
            .bind(serde_json::to_string(&status)?)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("task {id}")));
        }
        Ok(())
    }

    async fn update_step_status(&self, id: &str, status: StepStatus) -> Result<()> {
        let result = sqlx::query("UPDATE steps SET status = ? WHERE step_id = ?")
            .bind(serde_json::to_string(&status)?)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("step {id}")));
        }
        Ok(())
    }

    async fn commit_mutation(&self, mutation: WorkflowMutation) -> Result<()> {
        if mutation.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        if let Some(objective) = &mutation.objective {
            Self::upsert_objective_tx(&mut tx, objective).await?;
        }
        for task in &mutation.tasks {
            Self::upsert_task_tx(&mut tx, task).await?;
        }
        for step in &mutation.steps {
            Self::upsert_step_tx(&mut tx, step).await?;
        }
        if let Some(workflow) = &mutation.workflow {
            Self::upsert_workflow_tx(&mut tx, workflow).await?;
        }
        if let Some(checkpoint) = &mutation.checkpoint {
            Self::insert_checkpoint_tx(&mut tx, checkpoint).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_objective(&self, id: &str) -> Result<Objective> {
        let row = sqlx::query("SELECT * FROM objectives WHERE objective_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("objective {id}")))?;

        let tasks = sqlx::query("SELECT task_id FROM tasks WHERE objective_id = ?")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        let mut full_tasks = Vec::with_capacity(tasks.len());
        for task_row in tasks {
            let task_id: String = task_row.get("task_id");
            full_tasks.push(self.get_task(&task_id).await?);
        }

        Ok(Objective {
            objective_id: row.get("objective_id"),
            title: row.get("title"),
            description: row.get("description"),
            query: row.get("query"),
            status: serde_json::from_str(row.get("status"))?,
            priority: row.get::<i64, _>("priority") as u8,
            user_id: row.get("user_id"),
            tags: serde_json::from_str::<HashSet<String>>(row.get("tags"))?,
            metadata: serde_json::from_str::<HashMap<String, Value>>(row.get("metadata"))?,
            created_at: Self::parse_timestamp(row.get("created_at"))?,
            started_at: row.get::<Option<String>, _>("started_at").map(|s| Self::parse_timestamp(&s)).transpose()?,
            completed_at: row.get::<Option<String>, _>("completed_at").map(|s| Self::parse_timestamp(&s)).transpose()?,
            result_summary: row.get("result_summary"),
            error_message: row.get("error_message"),
            tasks: full_tasks,
        })
    }

    async fn get_task(&self, id: &str) -> Result<Task> {
        let row = sqlx::query("SELECT * FROM tasks WHERE task_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("task {id}")))?;

        let steps = sqlx::query("SELECT * FROM steps WHERE task_id = ? ORDER BY started_at")
            .bind(id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(row_to_step)
            .collect::<Result<Vec<_>>>()?;

        let mut task = row_to_task(row)?;
        task.steps = steps;
        Ok(task)
    }

    /// Used by the scheduler's heartbeat sweep (spec.md §4.5) to enumerate
    /// every RUNNING task across the whole store. Steps are left empty:
    /// the sweep only ever reads `status`/`heartbeat_at` and writes back via
    /// `upsert_task`, which never touches the `steps` table.
    async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE status = ?")
            .bind(serde_json::to_string(&status)?)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_task).collect()
    }

    async fn get_step(&self, id: &str) -> Result<Step> {
        let row = sqlx::query("SELECT * FROM steps WHERE step_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("step {id}")))?;
        row_to_step(row)
    }

    async fn get_workflow(&self, id: &str) -> Result<Workflow> {
        let row = sqlx::query("SELECT * FROM workflows WHERE workflow_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("workflow {id}")))?;
        row_to_workflow(row)
    }

    async fn list_workflows_for_objective(&self, objective_id: &str) -> Result<Vec<Workflow>> {
        let rows = sqlx::query("SELECT * FROM workflows WHERE objective_id = ? ORDER BY created_at")
            .bind(objective_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_workflow).collect()
    }

    async fn latest_checkpoint(&self, workflow_id: &str) -> Result<Option<WorkflowCheckpoint>> {
        let row = sqlx::query(
            "SELECT * FROM workflow_checkpoints WHERE workflow_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_checkpoint).transpose()
    }

    async fn list_checkpoints(&self, workflow_id: &str) -> Result<Vec<WorkflowCheckpoint>> {
        let rows = sqlx::query("SELECT * FROM workflow_checkpoints WHERE workflow_id = ? ORDER BY created_at")
            .bind(workflow_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_checkpoint).collect()
    }
}

fn row_to_step(row: sqlx::sqlite::SqliteRow) -> Result<Step> {
    Ok(Step {
        step_id: row.get("step_id"),
        task_id: row.get("task_id"),
        title: row.get("title"),
        description: row.get("description"),
        step_type: row.get("step_type"),
        status: serde_json::from_str(row.get("status"))?,
        agent_name: row.get("agent_name"),
        priority: row.get::<i64, _>("priority") as u8,
        input_data: serde_json::from_str(row.get("input_data"))?,
        output_data: row.get::<Option<String>, _>("output_data").map(|s| serde_json::from_str(&s)).transpose()?,
        error_message: row.get("error_message"),
        retry_count: row.get::<i64, _>("retry_count") as u32,
        max_retries: row.get::<i64, _>("max_retries") as u32,
        started_at: row.get::<Option<String>, _>("started_at").map(|s| SqliteStore::parse_timestamp(&s)).transpose()?,
        completed_at: row.get::<Option<String>, _>("completed_at").map(|s| SqliteStore::parse_timestamp(&s)).transpose()?,
        quality_assessment: row
            .get::<Option<String>, _>("quality_assessment")
            .map(|s| serde_json::from_str::<QualityLevel>(&s))
            .transpose()?,
        metadata: serde_json::from_str(row.get("metadata"))?,
    })
}

/// Decodes a `tasks` row with `steps` left empty; callers that need steps
/// populate them separately (see `SqliteStore::get_task`).
fn row_to_task(row: sqlx::sqlite::SqliteRow) -> Result<Task> {
    let depends_on: Vec<String> = serde_json::from_str(row.get("depends_on"))?;
    let task_type: TaskType = serde_json::from_str(row.get("task_type"))?;

    Ok(Task {
        task_id: row.get("task_id"),
        objective_id: row.get("objective_id"),
        title: row.get("title"),
        description: row.get("description"),
        task_type,
        status: serde_json::from_str(row.get("status"))?,
        priority: row.get::<i64, _>("priority") as u8,
        depends_on: depends_on.into_iter().collect(),
        created_at: SqliteStore::parse_timestamp(row.get("created_at"))?,
        started_at: row.get::<Option<String>, _>("started_at").map(|s| SqliteStore::parse_timestamp(&s)).transpose()?,
        completed_at: row.get::<Option<String>, _>("completed_at").map(|s| SqliteStore::parse_timestamp(&s)).transpose()?,
        result_summary: row.get("result_summary"),
        error_message: row.get("error_message"),
        quality_assessment: row
            .get::<Option<String>, _>("quality_assessment")
            .map(|s| serde_json::from_str::<QualityLevel>(&s))
            .transpose()?,
        metadata: serde_json::from_str(row.get("metadata"))?,
        steps: Vec::new(),
        heartbeat_at: row.get::<Option<String>, _>("heartbeat_at").map(|s| SqliteStore::parse_timestamp(&s)).transpose()?,
    })
}

fn row_to_workflow(row: sqlx::sqlite::SqliteRow) -> Result<Workflow> {
    let workflow_type: WorkflowType = serde_json::from_str(row.get("workflow_type"))?;
    let status: WorkflowStatus = serde_json::from_str(row.get("status"))?;
    Ok(Workflow {
        workflow_id: row.get("workflow_id"),
        objective_id: row.get("objective_id"),
        workflow_type,
        status,
        current_node: row.get("current_node"),
        is_paused: row.get("is_paused"),
        serialized_state: serde_json::from_str(row.get("serialized_state"))?,
        created_at: SqliteStore::parse_timestamp(row.get("created_at"))?,
        started_at: row.get::<Option<String>, _>("started_at").map(|s| SqliteStore::parse_timestamp(&s)).transpose()?,
        completed_at: row.get::<Option<String>, _>("completed_at").map(|s| SqliteStore::parse_timestamp(&s)).transpose()?,
    })
}

fn row_to_checkpoint(row: sqlx::sqlite::SqliteRow) -> Result<WorkflowCheckpoint> {
    Ok(WorkflowCheckpoint {
        checkpoint_id: row.get("checkpoint_id"),
        workflow_id: row.get("workflow_id"),
        node_name: row.get("node_name"),
        state: serde_json::from_str(row.get("state"))?,
        created_at: SqliteStore::parse_timestamp(row.get("created_at"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_core::TaskType;

    async fn setup() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn objective_roundtrips_through_sqlite() {
        let store = setup().await;
        let objective = Objective::new("survey the delta");
        store.upsert_objective(&objective).await.unwrap();
        let loaded = store.get_objective(&objective.objective_id).await.unwrap();
        assert_eq!(loaded.query, "survey the delta");
        assert!(loaded.tasks.is_empty());
    }

    #[tokio::test]
    async fn task_and_step_roundtrip_with_dependencies() {
        let store = setup().await;
        let objective = Objective::new("q");
        store.upsert_objective(&objective).await.unwrap();

        let mut task = Task::new(&objective.objective_id, "gather sources", TaskType::Research);
        task.depends_on.insert("upstream-task".to_string());
        store.upsert_task(&task).await.unwrap();

        let step = Step::new(&task.task_id, "search", "research_agent");
        store.upsert_step(&step).await.unwrap();

        let loaded = store.get_task(&task.task_id).await.unwrap();
        assert!(loaded.depends_on.contains("upstream-task"));
        assert_eq!(loaded.steps.len(), 1);
    }

    #[tokio::test]
    async fn status_update_on_missing_row_is_not_found() {
        let store = setup().await;
        let err = store.update_task_status("missing", TaskStatus::Completed).await;
        assert!(matches!(err, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn checkpoints_are_append_only_and_ordered() {
        let store = setup().await;
        let objective = Objective::new("q");
        store.upsert_objective(&objective).await.unwrap();
        let workflow = Workflow::new(&objective.objective_id, WorkflowType::Research);
        store.create_workflow(&workflow).await.unwrap();

        let first = WorkflowCheckpoint::new(&workflow.workflow_id, "context_analyzer", Value::Null);
        store.create_checkpoint(&first).await.unwrap();
        let second = WorkflowCheckpoint::new(&workflow.workflow_id, "task_analyzer", Value::Null);
        store.create_checkpoint(&second).await.unwrap();

        let latest = store.latest_checkpoint(&workflow.workflow_id).await.unwrap().unwrap();
        assert_eq!(latest.node_name, "task_analyzer");
        assert_eq!(store.list_checkpoints(&workflow.workflow_id).await.unwrap().len(), 2);
    }
}
