use cadence_core::models::{SavedTemplate, Task, TaskPriority};
use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use chrono_humanize::Humanize;
use comfy_table::{Attribute, Cell, Color, Row, Table};

#[derive(Debug, Clone)]
pub struct ViewTask {
    pub short_id: String,
    pub title: String,
    pub category: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub is_parent: bool,
    pub is_instance: bool,
}

impl From<&Task> for ViewTask {
    fn from(task: &Task) -> Self {
        Self {
            short_id: task.id.short(),
            title: task.title.clone(),
            category: task.category.clone(),
            priority: task.priority,
            due_date: task.due_date,
            completed: task.completed,
            is_parent: task.is_recurring(),
            is_instance: task.recurring_instance,
        }
    }
}

/// Due date plus a relative hint, e.g. `2024-01-03 (in 2 days)`.
pub fn describe_due(due: NaiveDate, today: NaiveDate) -> String {
    if due == today {
        return format!("{} (today)", due);
    }
    let midnight = |d: NaiveDate| d.and_time(NaiveTime::MIN).and_utc();
    format!("{} ({})", due, (midnight(due) - midnight(today)).humanize())
}

pub fn display_tasks(tasks: &[ViewTask]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }

    let today = Utc::now().date_naive();
    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Status", "Priority", "Due Date", "Category"]);

    for task in tasks {
        let mut row = Row::new();
        row.add_cell(Cell::new(&task.short_id));

        let mut display_name = String::new();
        if task.is_parent {
            display_name.push('↻');
            display_name.push(' ');
        } else if task.is_instance {
            display_name.push_str("  ");
        }
        display_name.push_str(&task.title);

        let mut name_cell = Cell::new(display_name);
        name_cell = if task.completed {
            name_cell.add_attribute(Attribute::CrossedOut).fg(Color::DarkGrey)
        } else {
            match task.priority {
                TaskPriority::High => name_cell.fg(Color::Red).add_attribute(Attribute::Bold),
                TaskPriority::Medium => name_cell.fg(Color::Yellow),
                TaskPriority::Low => name_cell.fg(Color::Green),
                TaskPriority::None => name_cell,
            }
        };
        row.add_cell(name_cell);

        row.add_cell(if task.completed {
            Cell::new("Done").fg(Color::Green)
        } else {
            Cell::new("Pending")
        });

        row.add_cell(Cell::new(task.priority.to_string()));

        let due_date_cell = match task.due_date {
            Some(due) => {
                let cell = Cell::new(describe_due(due, today));
                if task.completed {
                    cell
                } else if due < today {
                    cell.fg(Color::Red) // Overdue
                } else if due == today {
                    cell.fg(Color::Yellow)
                } else {
                    cell
                }
            }
            None => Cell::new("None"),
        };
        row.add_cell(due_date_cell);

        row.add_cell(Cell::new(task.category.as_deref().unwrap_or("None")));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_occurrences(dates: &[NaiveDate]) {
    if dates.is_empty() {
        println!("No occurrences.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Date", "Weekday"]);
    for (index, date) in dates.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(date),
            Cell::new(date.weekday()),
        ]);
    }

    println!("{table}");
}

pub fn display_templates(templates: &[SavedTemplate]) {
    if templates.is_empty() {
        println!("No templates saved.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Name", "Title", "Due", "Repeats", "Used"]);
    for template in templates {
        table.add_row(vec![
            Cell::new(&template.name).add_attribute(Attribute::Bold),
            Cell::new(&template.title),
            Cell::new(template.relative_due.map_or("None".to_string(), |d| d.to_string())),
            Cell::new(template.recurrence.as_ref().map_or("No".to_string(), |r| r.to_string())),
            Cell::new(template.usage_count),
        ]);
    }

    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_describe_due() {
        let today = date(2024, 1, 1);
        assert_eq!(describe_due(today, today), "2024-01-01 (today)");
        assert_eq!(describe_due(date(2024, 1, 3), today), "2024-01-03 (in 2 days)");
        assert!(describe_due(date(2023, 12, 31), today).ends_with("ago)"));
    }
}
