use crate::models::{Task, TaskFilter, TaskPriority};
use chrono::NaiveDate;

/// Inclusive due date bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DueDateRange {
    pub gte: Option<NaiveDate>,
    pub lte: Option<NaiveDate>,
}

/// Predicate consumed by the repository. All set clauses must hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryPredicate {
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DueDateRange>,
}

impl QueryPredicate {
    /// Predicate that matches every task.
    pub fn all() -> Self {
        QueryPredicate::default()
    }

    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.due_date.is_none()
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if let Some(range) = self.due_date {
            if range.gte.is_some_and(|from| task.due_date < from) {
                return false;
            }
            if range.lte.is_some_and(|to| task.due_date > to) {
                return false;
            }
        }
        true
    }
}

pub fn build_query(filter: &TaskFilter) -> QueryPredicate {
    let due_date = if filter.due_date_from.is_some() || filter.due_date_to.is_some() {
        Some(DueDateRange {
            gte: filter.due_date_from,
            lte: filter.due_date_to,
        })
    } else {
        None
    };

    QueryPredicate {
        priority: filter.priority,
        due_date,
    }
}
