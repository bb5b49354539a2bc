use cadence_core::clock::FixedClock;
use cadence_core::db::establish_connection;
use cadence_core::error::CoreError;
use cadence_core::identity::SequentialAllocator;
use cadence_core::lifecycle::RecurrenceLifecycleManager;
use cadence_core::models::*;
use cadence_core::occurrence::GeneratorConfig;
use cadence_core::recurrence::{EndCondition, RecurrenceRule};
use cadence_core::store::{SqliteStore, TaskStore};
use chrono::{NaiveDate, Weekday};
use std::sync::Arc;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Helper function to create a test database
async fn setup_test_store() -> (SqliteStore, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to establish test database connection");

    (SqliteStore::new(pool), temp_dir)
}

fn manager_with(store: SqliteStore, ids: SequentialAllocator) -> RecurrenceLifecycleManager<SqliteStore> {
    RecurrenceLifecycleManager::new(
        store,
        Arc::new(ids),
        Arc::new(FixedClock::on(date(2024, 1, 1))),
        GeneratorConfig::default(),
    )
}

async fn setup_manager() -> (RecurrenceLifecycleManager<SqliteStore>, TempDir) {
    let (store, temp_dir) = setup_test_store().await;
    (manager_with(store, SequentialAllocator::new()), temp_dir)
}

fn recurring(title: &str, due: NaiveDate, rule: RecurrenceRule) -> NewTaskData {
    NewTaskData {
        title: title.to_string(),
        description: Some(format!("Test task: {}", title)),
        category: Some("health".to_string()),
        priority: Some(TaskPriority::Medium),
        due_date: Some(due),
        recurrence: Some(rule),
    }
}

fn due_dates(tasks: &[Task]) -> Vec<NaiveDate> {
    tasks.iter().filter_map(|t| t.due_date).collect()
}

#[tokio::test]
async fn test_recurring_task_workflow() {
    let (manager, _temp_dir) = setup_manager().await;

    // Create a weekly parent
    let rule = RecurrenceRule::weekly_on(1, [Weekday::Mon, Weekday::Wed, Weekday::Fri])
        .ending(EndCondition::On { date: date(2024, 1, 10) });
    let parent = manager
        .create_task(recurring("Run", date(2024, 1, 1), rule))
        .await
        .expect("Failed to create recurring task")
        .task;

    let instances = manager.instances_of(parent.id).await.unwrap();
    assert_eq!(
        due_dates(&instances),
        vec![date(2024, 1, 3), date(2024, 1, 5), date(2024, 1, 8), date(2024, 1, 10)]
    );
    for instance in &instances {
        assert_eq!(instance.title, "Run");
        assert_eq!(instance.category.as_deref(), Some("health"));
        assert_eq!(instance.priority, TaskPriority::Medium);
        assert_eq!(instance.parent_task_id, Some(parent.id));
        assert!(instance.recurrence.is_none());
    }

    // Switch to a monthly rule
    let change = manager
        .update_task(
            parent.id,
            UpdateTaskData {
                recurrence: Some(Some(
                    RecurrenceRule::monthly_on(1, 31).ending(EndCondition::After { count: 3 }),
                )),
                due_date: Some(Some(date(2024, 1, 31))),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to update rule");

    let summary = change.regeneration.expect("rule change regenerates");
    assert_eq!((summary.removed, summary.created), (4, 3));
    let instances = manager.instances_of(parent.id).await.unwrap();
    assert_eq!(
        due_dates(&instances),
        vec![date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]
    );

    // The stored rule round-trips through the JSON column
    let stored = manager.find_task(parent.id).await.unwrap().unwrap();
    assert_eq!(stored.recurrence, change.task.recurrence);

    // Delete cascades
    let deletion = manager.delete_task(parent.id).await.unwrap();
    assert_eq!(deletion.instances_removed, 3);
    assert!(manager.store().find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_completing_instance_is_local() {
    let (manager, _temp_dir) = setup_manager().await;
    let parent = manager
        .create_task(recurring(
            "Journal",
            date(2024, 1, 1),
            RecurrenceRule::daily(1).ending(EndCondition::After { count: 3 }),
        ))
        .await
        .unwrap()
        .task;
    let instances = manager.instances_of(parent.id).await.unwrap();

    manager.toggle_complete(instances[0].id).await.unwrap();

    let after = manager.instances_of(parent.id).await.unwrap();
    assert!(after[0].completed);
    assert!(after[1..].iter().all(|t| !t.completed));
    assert_eq!(manager.find_task(parent.id).await.unwrap(), Some(parent));
}

#[tokio::test]
async fn test_failed_regeneration_keeps_previous_instances() {
    let (store, _temp_dir) = setup_test_store().await;
    let manager = manager_with(store.clone(), SequentialAllocator::new());

    let bystander = manager
        .create_task(NewTaskData {
            title: "Bystander".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .task;
    let parent = manager
        .create_task(recurring(
            "Stretch",
            date(2024, 1, 1),
            RecurrenceRule::daily(1).ending(EndCondition::After { count: 2 }),
        ))
        .await
        .unwrap()
        .task;
    let before = manager.instances_of(parent.id).await.unwrap();

    // A second manager whose allocator restarts at the bystander's id
    let clashing = manager_with(store, SequentialAllocator::new());
    let result = clashing.regenerate_for_parent(parent.id).await;

    match result {
        Err(CoreError::UpdateFailed { task_id, .. }) => assert_eq!(task_id, parent.id),
        other => panic!("expected UpdateFailed, got {:?}", other),
    }
    assert_eq!(manager.instances_of(parent.id).await.unwrap(), before);
    assert!(manager.find_task(bystander.id).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_regenerations_leave_one_instance_set() {
    let (manager, _temp_dir) = setup_manager().await;
    let manager = Arc::new(manager);
    let parent = manager
        .create_task(recurring(
            "Meditate",
            date(2024, 1, 1),
            RecurrenceRule::daily(2).ending(EndCondition::After { count: 6 }),
        ))
        .await
        .unwrap()
        .task;
    let expected = due_dates(&manager.instances_of(parent.id).await.unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.regenerate_for_parent(parent.id).await })
        })
        .collect();

    for handle in handles {
        let summary = handle.await.unwrap().unwrap();
        assert_eq!((summary.removed, summary.created), (6, 6));
    }

    let instances = manager.instances_of(parent.id).await.unwrap();
    assert_eq!(due_dates(&instances), expected);
    assert_eq!(manager.store().find_all().await.unwrap().len(), 7);
}

#[tokio::test]
async fn test_invalid_rule_is_rejected_before_any_write() {
    let (manager, _temp_dir) = setup_manager().await;
    let rule = RecurrenceRule::daily(1)
        .starting_on(date(2024, 6, 1))
        .ending(EndCondition::On { date: date(2024, 5, 1) });

    let result = manager.create_task(recurring("Backwards", date(2024, 6, 1), rule)).await;

    assert!(matches!(result, Err(CoreError::InvalidRule(_))));
    assert!(manager.store().find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_template_use_persists_recurring_parent() {
    let (manager, _temp_dir) = setup_manager().await;

    manager
        .save_template(NewTemplateData {
            name: "rent".to_string(),
            title: "Pay rent".to_string(),
            category: Some("finance".to_string()),
            relative_due: Some(RelativeDue::NextMonth),
            recurrence: Some(RecurrenceRule::monthly_last_day(1).ending(EndCondition::After { count: 2 })),
            ..Default::default()
        })
        .await
        .unwrap();

    let change = manager.create_from_template("rent").await.unwrap();
    assert_eq!(change.task.due_date, Some(date(2024, 2, 1)));

    let instances = manager.instances_of(change.task.id).await.unwrap();
    assert_eq!(due_dates(&instances), vec![date(2024, 3, 31), date(2024, 4, 30)]);

    let templates = manager.list_templates().await.unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].usage_count, 1);
}
