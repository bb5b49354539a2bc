use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{FromRow, Sqlite};
use tracing::debug;

use super::{normalize_prefix, TaskStore, TemplateStore};
use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{RelativeDue, SavedTemplate, Task, TaskId, TaskPriority};

const SELECT_TASKS: &str = r#"SELECT id, title, description, category, priority, due_date, completed,
    completed_at, created_at, parent_task_id, recurring_instance, recurrence
    FROM tasks"#;

const LISTING_ORDER: &str = " ORDER BY due_date IS NULL, due_date, created_at, id";

const INSERT_TASK: &str = r#"INSERT INTO tasks (id, title, description, category, priority, due_date, completed,
    completed_at, created_at, parent_task_id, recurring_instance, recurrence)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#;

const UPSERT_TASK: &str = r#"INSERT INTO tasks (id, title, description, category, priority, due_date, completed,
    completed_at, created_at, parent_task_id, recurring_instance, recurrence)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
    ON CONFLICT(id) DO UPDATE SET
        title = excluded.title,
        description = excluded.description,
        category = excluded.category,
        priority = excluded.priority,
        due_date = excluded.due_date,
        completed = excluded.completed,
        completed_at = excluded.completed_at,
        parent_task_id = excluded.parent_task_id,
        recurring_instance = excluded.recurring_instance,
        recurrence = excluded.recurrence"#;

const UPDATE_TASK: &str = r#"UPDATE tasks SET title = $2, description = $3, category = $4, priority = $5,
    due_date = $6, completed = $7, completed_at = $8, created_at = $9, parent_task_id = $10,
    recurring_instance = $11, recurrence = $12
    WHERE id = $1"#;

const SELECT_TEMPLATES: &str = r#"SELECT name, title, description, category, priority, relative_due,
    recurrence, usage_count, last_used_at, created_at
    FROM templates"#;

const INSERT_TEMPLATE: &str = r#"INSERT INTO templates (name, title, description, category, priority,
    relative_due, recurrence, usage_count, last_used_at, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#;

const UPDATE_TEMPLATE: &str = r#"UPDATE templates SET title = $2, description = $3, category = $4,
    priority = $5, relative_due = $6, recurrence = $7, usage_count = $8, last_used_at = $9,
    created_at = $10
    WHERE name = $1"#;

/// Row shape of the `tasks` table.
#[derive(Debug, FromRow)]
struct TaskRow {
    id: String,
    title: String,
    description: Option<String>,
    category: Option<String>,
    priority: TaskPriority,
    due_date: Option<NaiveDate>,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    parent_task_id: Option<String>,
    recurring_instance: bool,
    recurrence: Option<String>,
}

fn parse_id(raw: &str) -> Result<TaskId, CoreError> {
    raw.parse()
        .map_err(|e| CoreError::Store(format!("Corrupt task id '{}': {}", raw, e)))
}

impl TryFrom<TaskRow> for Task {
    type Error = CoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: parse_id(&row.id)?,
            title: row.title,
            description: row.description,
            category: row.category,
            priority: row.priority,
            due_date: row.due_date,
            completed: row.completed,
            completed_at: row.completed_at,
            created_at: row.created_at,
            parent_task_id: row.parent_task_id.as_deref().map(parse_id).transpose()?,
            recurring_instance: row.recurring_instance,
            recurrence: row.recurrence.as_deref().map(serde_json::from_str).transpose()?,
        })
    }
}

#[derive(Debug, FromRow)]
struct TemplateRow {
    name: String,
    title: String,
    description: Option<String>,
    category: Option<String>,
    priority: TaskPriority,
    relative_due: Option<RelativeDue>,
    recurrence: Option<String>,
    usage_count: i64,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for SavedTemplate {
    type Error = CoreError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(SavedTemplate {
            usage_count: u32::try_from(row.usage_count)
                .map_err(|e| CoreError::Store(format!("Corrupt usage count for '{}': {}", row.name, e)))?,
            name: row.name,
            title: row.title,
            description: row.description,
            category: row.category,
            priority: row.priority,
            relative_due: row.relative_due,
            recurrence: row.recurrence.as_deref().map(serde_json::from_str).transpose()?,
            last_used_at: row.last_used_at,
            created_at: row.created_at,
        })
    }
}

fn bind_template<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    template: &SavedTemplate,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>, CoreError> {
    let recurrence = template.recurrence.as_ref().map(serde_json::to_string).transpose()?;
    Ok(query
        .bind(template.name.clone())
        .bind(template.title.clone())
        .bind(template.description.clone())
        .bind(template.category.clone())
        .bind(template.priority)
        .bind(template.relative_due)
        .bind(recurrence)
        .bind(i64::from(template.usage_count))
        .bind(template.last_used_at)
        .bind(template.created_at))
}

fn into_tasks(rows: Vec<TaskRow>) -> Result<Vec<Task>, CoreError> {
    rows.into_iter().map(Task::try_from).collect()
}

/// Binds every column of `task` in table order.
fn bind_task<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    task: &Task,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>, CoreError> {
    let recurrence = task.recurrence.as_ref().map(serde_json::to_string).transpose()?;
    Ok(query
        .bind(task.id.to_string())
        .bind(task.title.clone())
        .bind(task.description.clone())
        .bind(task.category.clone())
        .bind(task.priority)
        .bind(task.due_date)
        .bind(task.completed)
        .bind(task.completed_at)
        .bind(task.created_at)
        .bind(task.parent_task_id.map(|id| id.to_string()))
        .bind(task.recurring_instance)
        .bind(recurrence))
}

/// SQLite-backed store. Multi-record writes run inside one transaction;
/// an error drops the transaction, which rolls it back.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn insert(&self, task: Task) -> Result<(), CoreError> {
        bind_task(sqlx::query(INSERT_TASK), &task)?
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update(&self, task: Task) -> Result<(), CoreError> {
        let result = bind_task(sqlx::query(UPDATE_TASK), &task)?
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(task.id.to_string()));
        }
        Ok(())
    }

    async fn remove(&self, id: TaskId) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, CoreError> {
        let row: Option<TaskRow> = sqlx::query_as(&format!("{SELECT_TASKS} WHERE id = $1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Task::try_from).transpose()
    }

    async fn find_by_id_prefix(&self, prefix: &str) -> Result<Vec<Task>, CoreError> {
        let mut pattern = normalize_prefix(prefix);
        pattern.push('%');

        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "{SELECT_TASKS} WHERE REPLACE(id, '-', '') LIKE $1{LISTING_ORDER}"
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        into_tasks(rows)
    }

    async fn find_by_parent_id(&self, parent_id: TaskId) -> Result<Vec<Task>, CoreError> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "{SELECT_TASKS} WHERE parent_task_id = $1{LISTING_ORDER}"
        ))
        .bind(parent_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        into_tasks(rows)
    }

    async fn find_all(&self) -> Result<Vec<Task>, CoreError> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!("{SELECT_TASKS}{LISTING_ORDER}"))
            .fetch_all(&self.pool)
            .await?;
        into_tasks(rows)
    }

    async fn replace_instances(&self, parent: &Task, instances: Vec<Task>) -> Result<usize, CoreError> {
        let mut tx = self.pool.begin().await?;

        bind_task(sqlx::query(UPSERT_TASK), parent)?
            .execute(&mut *tx)
            .await?;

        let removed = sqlx::query("DELETE FROM tasks WHERE parent_task_id = $1")
            .bind(parent.id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for instance in &instances {
            if instance.parent_task_id != Some(parent.id) {
                return Err(CoreError::Store(format!(
                    "Instance {} does not belong to parent {}",
                    instance.id, parent.id
                )));
            }
            bind_task(sqlx::query(INSERT_TASK), instance)?
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(parent = %parent.id, removed, inserted = instances.len(), "instance set replaced");

        usize::try_from(removed).map_err(|e| CoreError::Store(e.to_string()))
    }

    async fn remove_with_instances(&self, parent_id: TaskId) -> Result<usize, CoreError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tasks WHERE id = $1")
            .bind(parent_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(CoreError::NotFound(parent_id.to_string()));
        }

        let removed = sqlx::query("DELETE FROM tasks WHERE parent_task_id = $1")
            .bind(parent_id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(parent_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        usize::try_from(removed).map_err(|e| CoreError::Store(e.to_string()))
    }
}

#[async_trait]
impl TemplateStore for SqliteStore {
    async fn insert_template(&self, template: SavedTemplate) -> Result<(), CoreError> {
        bind_template(sqlx::query(INSERT_TEMPLATE), &template)?
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_template(&self, template: SavedTemplate) -> Result<(), CoreError> {
        let result = bind_template(sqlx::query(UPDATE_TEMPLATE), &template)?
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(template.name));
        }
        Ok(())
    }

    async fn remove_template(&self, name: &str) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM templates WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_template(&self, name: &str) -> Result<Option<SavedTemplate>, CoreError> {
        let row: Option<TemplateRow> = sqlx::query_as(&format!("{SELECT_TEMPLATES} WHERE name = $1"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(SavedTemplate::try_from).transpose()
    }

    async fn find_all_templates(&self) -> Result<Vec<SavedTemplate>, CoreError> {
        let rows: Vec<TemplateRow> =
            sqlx::query_as(&format!("{SELECT_TEMPLATES} ORDER BY usage_count DESC, name"))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(SavedTemplate::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::establish_in_memory;
    use crate::identity::{IdAllocator, SequentialAllocator};
    use crate::recurrence::{EndCondition, RecurrenceRule};
    use chrono::{TimeZone, Weekday};

    async fn store() -> SqliteStore {
        SqliteStore::new(establish_in_memory().await.unwrap())
    }

    fn task(ids: &SequentialAllocator, due: Option<NaiveDate>) -> Task {
        Task {
            id: ids.next_id(),
            title: "Pay rent".to_string(),
            description: Some("Transfer before noon".to_string()),
            category: Some("finance".to_string()),
            priority: TaskPriority::High,
            due_date: due,
            completed: false,
            completed_at: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 8, 30, 0).unwrap(),
            parent_task_id: None,
            recurring_instance: false,
            recurrence: None,
        }
    }

    fn instance_of(ids: &SequentialAllocator, parent: &Task, day: u32) -> Task {
        let mut t = task(ids, NaiveDate::from_ymd_opt(2024, 2, day));
        t.parent_task_id = Some(parent.id);
        t.recurring_instance = true;
        t
    }

    #[tokio::test]
    async fn test_task_survives_storage() {
        let ids = SequentialAllocator::new();
        let store = store().await;
        let mut parent = task(&ids, NaiveDate::from_ymd_opt(2024, 1, 31));
        parent.recurrence = Some(
            RecurrenceRule::weekly_on(2, [Weekday::Mon, Weekday::Thu])
                .ending(EndCondition::After { count: 4 }),
        );

        store.insert(parent.clone()).await.unwrap();
        let loaded = store.find_by_id(parent.id).await.unwrap();

        assert_eq!(loaded, Some(parent));
    }

    #[tokio::test]
    async fn test_update_missing_task_is_not_found() {
        let ids = SequentialAllocator::new();
        let store = store().await;
        let result = store.update(task(&ids, None)).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_replace_instances_swaps_set() {
        let ids = SequentialAllocator::new();
        let store = store().await;
        let parent = task(&ids, None);

        let first = vec![instance_of(&ids, &parent, 1), instance_of(&ids, &parent, 2)];
        assert_eq!(store.replace_instances(&parent, first).await.unwrap(), 0);

        let second = vec![instance_of(&ids, &parent, 9)];
        assert_eq!(store.replace_instances(&parent, second.clone()).await.unwrap(), 2);
        assert_eq!(store.find_by_parent_id(parent.id).await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_failed_replace_rolls_back() {
        let ids = SequentialAllocator::new();
        let store = store().await;
        let unrelated = task(&ids, None);
        store.insert(unrelated.clone()).await.unwrap();

        let parent = task(&ids, None);
        let kept = vec![instance_of(&ids, &parent, 3), instance_of(&ids, &parent, 4)];
        store.replace_instances(&parent, kept.clone()).await.unwrap();

        let mut clash = instance_of(&ids, &parent, 6);
        clash.id = unrelated.id;
        let result = store
            .replace_instances(&parent, vec![instance_of(&ids, &parent, 5), clash])
            .await;

        assert!(matches!(result, Err(CoreError::Database(_))));
        assert_eq!(store.find_by_parent_id(parent.id).await.unwrap(), kept);
        assert_eq!(store.find_all().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_remove_with_instances_cascades() {
        let ids = SequentialAllocator::new();
        let store = store().await;
        let parent = task(&ids, None);
        let instances = vec![instance_of(&ids, &parent, 1), instance_of(&ids, &parent, 8)];
        store.replace_instances(&parent, instances).await.unwrap();

        assert_eq!(store.remove_with_instances(parent.id).await.unwrap(), 2);
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prefix_lookup_ignores_hyphens() {
        let ids = SequentialAllocator::starting_at(0x1234);
        let store = store().await;
        let t = task(&ids, None);
        store.insert(t.clone()).await.unwrap();

        let simple = t.id.as_uuid().simple().to_string();
        assert_eq!(store.find_by_id_prefix(&simple[..12]).await.unwrap(), vec![t.clone()]);
        assert_eq!(store.find_by_id_prefix("00000000-0000").await.unwrap(), vec![t]);
        assert!(store.find_by_id_prefix("ffff").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_all_orders_undated_last() {
        let ids = SequentialAllocator::new();
        let store = store().await;
        let undated = task(&ids, None);
        let later = task(&ids, NaiveDate::from_ymd_opt(2024, 6, 1));
        let sooner = task(&ids, NaiveDate::from_ymd_opt(2024, 3, 1));
        for t in [undated.clone(), later.clone(), sooner.clone()] {
            store.insert(t).await.unwrap();
        }

        let order: Vec<TaskId> = store.find_all().await.unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(order, vec![sooner.id, later.id, undated.id]);
    }

    fn template(name: &str) -> SavedTemplate {
        SavedTemplate {
            name: name.to_string(),
            title: "Water plants".to_string(),
            description: None,
            category: Some("home".to_string()),
            priority: TaskPriority::Low,
            relative_due: Some(RelativeDue::NextWeek),
            recurrence: Some(RecurrenceRule::every_weeks(1).ending(EndCondition::After { count: 4 })),
            usage_count: 0,
            last_used_at: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_template_survives_storage() {
        let store = store().await;
        let saved = template("plants");
        store.insert_template(saved.clone()).await.unwrap();

        assert_eq!(store.find_template("plants").await.unwrap(), Some(saved.clone()));
        assert!(matches!(
            store.insert_template(saved).await,
            Err(CoreError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_templates_list_most_used_first() {
        let store = store().await;
        store.insert_template(template("alpha")).await.unwrap();
        let mut beta = template("beta");
        store.insert_template(beta.clone()).await.unwrap();

        beta.usage_count = 3;
        beta.last_used_at = Some(Utc.with_ymd_and_hms(2024, 2, 1, 7, 0, 0).unwrap());
        store.update_template(beta).await.unwrap();

        let names: Vec<String> = store
            .find_all_templates()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["beta", "alpha"]);

        assert!(store.remove_template("alpha").await.unwrap());
        assert!(!store.remove_template("alpha").await.unwrap());
        assert!(matches!(
            store.update_template(template("alpha")).await,
            Err(CoreError::NotFound(_))
        ));
    }
}
