use anyhow::Result;
use cadence_core::lifecycle::RecurrenceLifecycleManager;
use cadence_core::models::TaskId;
use cadence_core::store::TaskStore;

pub async fn delete_task<S: TaskStore>(manager: &RecurrenceLifecycleManager<S>, task_id: TaskId) -> Result<()> {
    let summary = manager.delete_task(task_id).await?;
    if summary.instances_removed > 0 {
        println!(
            "Task deleted along with {} generated instance(s).",
            summary.instances_removed
        );
    } else {
        println!("Task deleted.");
    }
    Ok(())
}
