use cadence_core::models::{RelativeDue, TaskPriority};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Cadence: a personal task tracker with recurring tasks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a new task
    Add(AddCommand),
    /// List tasks
    List(ListCommand),
    /// Show a task with its rule and generated instances
    Show(ShowCommand),
    /// Edit a task
    Edit(EditCommand),
    /// Toggle a task between done and pending
    Do(DoCommand),
    /// Delete a task (a recurring task takes its instances with it)
    Delete(DeleteCommand),
    /// Rebuild the instances of a recurring task
    Regen(RegenCommand),
    /// Show the dates a rule would produce without saving anything
    Preview(PreviewCommand),
    /// Manage saved task templates
    #[command(subcommand)]
    Template(TemplateCommand),
}

/// Repetition cadence
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    /// Every N days
    Daily,
    /// Every N weeks, optionally on chosen weekdays
    Weekly,
    /// Every N months, on a fixed date or the last day
    Monthly,
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interval::Daily => write!(f, "daily"),
            Interval::Weekly => write!(f, "weekly"),
            Interval::Monthly => write!(f, "monthly"),
        }
    }
}

/// Flags describing a recurrence rule, shared by `add`, `edit` and `preview`.
#[derive(Args, Debug, Clone, Default)]
pub struct RecurrenceArgs {
    /// Repeat the task
    #[arg(long, value_enum)]
    pub every: Option<Interval>,
    /// Repeat every N days, weeks or months
    #[arg(long, value_name = "N")]
    pub frequency: Option<u32>,
    /// Weekdays for weekly repetition
    #[arg(long, value_name = "DAYS", help = "Days of week (mon,tue,wed,thu,fri,sat,sun)")]
    pub on: Option<String>,
    /// Day of the month for monthly repetition
    #[arg(long, value_name = "N", conflicts_with = "last_day")]
    pub day: Option<u32>,
    /// Repeat on the last day of the month
    #[arg(long)]
    pub last_day: bool,
    /// Stop after N occurrences
    #[arg(long, value_name = "N", conflicts_with = "until")]
    pub count: Option<u32>,
    /// Stop after this date
    #[arg(long, value_name = "DATE")]
    pub until: Option<String>,
    /// First date the rule applies from
    #[arg(long, value_name = "DATE")]
    pub start: Option<String>,
}

impl RecurrenceArgs {
    /// Whether any rule flag was given at all.
    pub fn is_present(&self) -> bool {
        self.every.is_some()
            || self.frequency.is_some()
            || self.on.is_some()
            || self.day.is_some()
            || self.last_day
            || self.count.is_some()
            || self.until.is_some()
            || self.start.is_some()
    }
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// The title of the task
    pub title: String,
    /// The description of the task
    #[arg(short, long)]
    pub description: Option<String>,
    /// The due date of the task
    #[arg(long)]
    pub due: Option<String>,
    /// The category of the task
    #[arg(short, long)]
    pub category: Option<String>,
    /// The priority of the task (none, low, medium, high)
    #[arg(short, long)]
    pub priority: Option<TaskPriority>,
    #[command(flatten)]
    pub recurrence: RecurrenceArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Include completed tasks
    #[arg(short, long)]
    pub all: bool,
    /// Hide generated instances
    #[arg(long)]
    pub parents: bool,
    /// Only tasks in this category
    #[arg(short, long)]
    pub category: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    /// The ID (or ID prefix) of the task
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    /// The ID (or ID prefix) of the task to edit
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(long, conflicts_with = "description")]
    pub description_clear: bool,

    #[arg(long)]
    pub due: Option<String>,
    #[arg(long, conflicts_with = "due")]
    pub due_clear: bool,

    #[arg(short, long)]
    pub category: Option<String>,
    #[arg(long, conflicts_with = "category")]
    pub category_clear: bool,

    #[arg(short, long)]
    pub priority: Option<TaskPriority>,

    #[command(flatten)]
    pub recurrence: RecurrenceArgs,
    /// Stop repeating and remove every generated instance
    #[arg(long, conflicts_with_all = ["every", "frequency", "on", "day", "last_day", "count", "until", "start"])]
    pub no_recurrence: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DoCommand {
    /// The ID (or ID prefix) of the task
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// The ID (or ID prefix) of the task to delete
    pub id: String,
    /// Delete without asking for confirmation
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct RegenCommand {
    /// The ID (or ID prefix) of the recurring task
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct PreviewCommand {
    #[command(flatten)]
    pub recurrence: RecurrenceArgs,
    /// Date the occurrences follow (defaults to the start date, else today)
    #[arg(long, value_name = "DATE")]
    pub from: Option<String>,
    /// Show at most N dates
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TemplateCommand {
    /// Save a template for tasks you create often
    Save(TemplateSaveCommand),
    /// List saved templates, most used first
    List,
    /// Create a task from a template
    Use(TemplateUseCommand),
    /// Delete a template
    Delete(TemplateDeleteCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct TemplateSaveCommand {
    /// Unique name of the template
    pub name: String,
    /// Title of the tasks created from it
    pub title: String,
    #[arg(short, long)]
    pub description: Option<String>,
    /// Due date relative to the day of use (today, tomorrow, next-week, next-month)
    #[arg(long, value_name = "WHEN")]
    pub due_in: Option<RelativeDue>,
    #[arg(short, long)]
    pub category: Option<String>,
    #[arg(short, long)]
    pub priority: Option<TaskPriority>,
    #[command(flatten)]
    pub recurrence: RecurrenceArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct TemplateUseCommand {
    /// Name of the template
    pub name: String,
}

#[derive(Parser, Debug, Clone)]
pub struct TemplateDeleteCommand {
    /// Name of the template
    pub name: String,
}
