use crate::error::ValidationError;
use crate::models::{parse_calendar_date, TaskFilter, TaskPriority, TaskQueryParams};
use chrono::NaiveDate;

/// Turns raw query parameters into a typed, range-checked [`TaskFilter`].
pub trait FilterValidator: Send + Sync + 'static {
    fn validate_and_transform(&self, params: &TaskQueryParams)
        -> Result<TaskFilter, ValidationError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TaskFilterValidator;

impl FilterValidator for TaskFilterValidator {
    fn validate_and_transform(
        &self,
        params: &TaskQueryParams,
    ) -> Result<TaskFilter, ValidationError> {
        let mut filter = TaskFilter::default();

        if let Some(raw) = present(&params.priority) {
            let priority = raw.parse::<TaskPriority>().map_err(|_| {
                let allowed: Vec<&str> = TaskPriority::ALL.iter().map(|p| p.as_str()).collect();
                ValidationError::new(format!(
                    "Invalid priority. Must be one of: {}",
                    allowed.join(", ")
                ))
            })?;
            filter.priority = Some(priority);
        }

        filter.due_date_from = parse_bound("dueDateFrom", &params.due_date_from)?;
        filter.due_date_to = parse_bound("dueDateTo", &params.due_date_to)?;

        if let (Some(from), Some(to)) = (filter.due_date_from, filter.due_date_to) {
            if from > to {
                return Err(ValidationError::new("dueDateFrom cannot be after dueDateTo"));
            }
        }

        Ok(filter)
    }
}

// Empty strings count as absent, like an unset form field
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|raw| !raw.is_empty())
}

fn parse_bound(
    name: &str,
    value: &Option<String>,
) -> Result<Option<NaiveDate>, ValidationError> {
    match present(value) {
        None => Ok(None),
        Some(raw) => parse_calendar_date(raw).map(Some).ok_or_else(|| {
            ValidationError::new(format!("Invalid {name} format. Use YYYY-MM-DD"))
        }),
    }
}
