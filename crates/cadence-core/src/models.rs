use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::calendar;
use crate::recurrence::RecurrenceRule;

/// Identity of a task record. Allocated by an [`IdAllocator`](crate::identity::IdAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// First eight hex digits, as shown in listings.
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task priority: {0}")]
pub struct ParseTaskPriorityError(String);

impl FromStr for TaskPriority {
    type Err = ParseTaskPriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(TaskPriority::None),
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(ParseTaskPriorityError(s.to_string())),
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPriority::None => "none",
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        };
        f.write_str(s)
    }
}

/// A task record. Parent tasks may carry a recurrence rule; instances link
/// back to their parent through `parent_task_id` and never carry a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub parent_task_id: Option<TaskId>,
    pub recurring_instance: bool,
    pub recurrence: Option<RecurrenceRule>,
}

impl Task {
    /// The copyable fields handed down to every generated instance.
    pub fn template(&self) -> TaskTemplate {
        TaskTemplate {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            priority: self.priority,
        }
    }

    /// True for a parent task with an active rule.
    pub fn is_recurring(&self) -> bool {
        !self.recurring_instance && self.recurrence.is_some()
    }
}

/// Parent task fields cloned onto each instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: TaskPriority,
}

#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    /// When present the task becomes a recurring parent and its instances
    /// are generated in the same atomic write.
    pub recurrence: Option<RecurrenceRule>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTaskData {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<NaiveDate>>,
    /// `Some(None)` disables recurrence and purges the instance set.
    pub recurrence: Option<Option<RecurrenceRule>>,
}

impl UpdateTaskData {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.recurrence.is_none()
    }
}

/// Outcome of replacing a parent's instance set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerationSummary {
    pub parent_id: TaskId,
    pub removed: usize,
    pub created: usize,
    /// The generator stopped at its hard cap rather than at the rule's end.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionSummary {
    pub task_id: TaskId,
    pub instances_removed: usize,
}

/// A saved task, plus the instance rebuild it triggered, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskChange {
    pub task: Task,
    pub regeneration: Option<RegenerationSummary>,
}

/// Listing filter applied on top of the store's canonical order.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub include_completed: bool,
    /// Hide generated instances and show parents and plain tasks only.
    pub parents_only: bool,
    pub category: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if task.completed && !self.include_completed {
            return false;
        }
        if self.parents_only && task.recurring_instance {
            return false;
        }
        match &self.category {
            Some(wanted) => task
                .category
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(wanted)),
            None => true,
        }
    }
}

/// Due date a saved template works out from the clock each time it is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RelativeDue {
    Today,
    Tomorrow,
    NextWeek,
    /// Same day next month, clamped to that month's last day.
    NextMonth,
}

impl RelativeDue {
    pub fn resolve(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            RelativeDue::Today => Some(today),
            RelativeDue::Tomorrow => calendar::add_days(today, 1),
            RelativeDue::NextWeek => calendar::add_days(today, 7),
            RelativeDue::NextMonth => {
                let (year, month) = calendar::shift_months(today, 1)?;
                calendar::clamped_day(year, month, today.day())
            }
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid relative due date: {0} (expected today, tomorrow, next-week or next-month)")]
pub struct ParseRelativeDueError(String);

impl FromStr for RelativeDue {
    type Err = ParseRelativeDueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "today" => Ok(RelativeDue::Today),
            "tomorrow" => Ok(RelativeDue::Tomorrow),
            "next-week" => Ok(RelativeDue::NextWeek),
            "next-month" => Ok(RelativeDue::NextMonth),
            _ => Err(ParseRelativeDueError(s.to_string())),
        }
    }
}

impl fmt::Display for RelativeDue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelativeDue::Today => "today",
            RelativeDue::Tomorrow => "tomorrow",
            RelativeDue::NextWeek => "next-week",
            RelativeDue::NextMonth => "next-month",
        };
        f.write_str(s)
    }
}

/// A reusable task blueprint, looked up by its unique name. Using it
/// creates a task through the normal create path, recurring or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTemplate {
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: TaskPriority,
    pub relative_due: Option<RelativeDue>,
    pub recurrence: Option<RecurrenceRule>,
    pub usage_count: u32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SavedTemplate {
    /// Task data for one use of the template, due relative to `today`.
    pub fn to_new_task(&self, today: NaiveDate) -> NewTaskData {
        NewTaskData {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            priority: Some(self.priority),
            due_date: self.relative_due.and_then(|due| due.resolve(today)),
            recurrence: self.recurrence.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewTemplateData {
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<TaskPriority>,
    pub relative_due: Option<RelativeDue>,
    pub recurrence: Option<RecurrenceRule>,
}
