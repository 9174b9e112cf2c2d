//! Shape checks for recurring task input.
//!
//! These run where input enters the system (repository create/update, the
//! HTTP layer). The recurrence evaluator and the materializer assume they
//! already passed and never repeat them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Frequency, RecurrenceRule, TaskTemplate};

pub const MAX_INTERVAL: u32 = 365;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 5000;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 50;
pub const MAX_ESTIMATED_HOURS: f64 = 1000.0;
pub const MAX_CHECKLIST_ITEMS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Error, Debug, Clone, Default, PartialEq)]
#[error("Validation failed: {}", summary(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

pub fn validate_rule(rule: &RecurrenceRule) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_rule(rule, &mut errors);
    errors.into_result()
}

pub fn validate_template(template: &TaskTemplate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_template(template, &mut errors);
    errors.into_result()
}

/// Rule and template together, reporting every problem at once.
pub fn validate_definition(
    template: &TaskTemplate,
    rule: &RecurrenceRule,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_template(template, &mut errors);
    check_rule(rule, &mut errors);
    errors.into_result()
}

pub fn validate_pause_until(
    pause_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if let Some(until) = pause_until {
        if until <= now {
            errors.push("pauseUntil", "must be in the future");
        }
    }
    errors.into_result()
}

fn check_rule(rule: &RecurrenceRule, errors: &mut ValidationErrors) {
    if !(1..=MAX_INTERVAL).contains(&rule.interval) {
        errors.push("interval", format!("must be between 1 and {}", MAX_INTERVAL));
    }

    if rule.days_of_week.iter().any(|d| *d > 6) {
        errors.push("daysOfWeek", "values must be between 0 (Sunday) and 6 (Saturday)");
    }
    if rule.days_of_month.iter().any(|d| !(1..=31).contains(d)) {
        errors.push("daysOfMonth", "values must be between 1 and 31");
    }
    if rule.months_of_year.iter().any(|m| *m > 11) {
        errors.push("monthsOfYear", "values must be between 0 (January) and 11 (December)");
    }

    match rule.frequency {
        Frequency::Daily => {}
        Frequency::Weekly if rule.days_of_week.is_empty() => {
            errors.push("daysOfWeek", "is required for weekly recurrence");
        }
        Frequency::Monthly if rule.days_of_month.is_empty() => {
            errors.push("daysOfMonth", "is required for monthly recurrence");
        }
        Frequency::Yearly if rule.months_of_year.is_empty() => {
            errors.push("monthsOfYear", "is required for yearly recurrence");
        }
        _ => {}
    }

    if let Some(end) = rule.end_date {
        if end <= rule.start_date {
            errors.push("endDate", "must be after startDate");
        }
    }
}

fn check_template(template: &TaskTemplate, errors: &mut ValidationErrors) {
    let title = template.title.trim();
    if title.is_empty() {
        errors.push("title", "is required");
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.push("title", format!("must be at most {} characters", MAX_TITLE_LEN));
    }

    if let Some(description) = &template.description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            errors.push(
                "description",
                format!("must be at most {} characters", MAX_DESCRIPTION_LEN),
            );
        }
    }

    if template.tags.len() > MAX_TAGS {
        errors.push("tags", format!("at most {} tags are allowed", MAX_TAGS));
    }
    if template
        .tags
        .iter()
        .any(|t| t.trim().is_empty() || t.chars().count() > MAX_TAG_LEN)
    {
        errors.push("tags", format!("each tag must be 1 to {} characters", MAX_TAG_LEN));
    }

    if let Some(hours) = template.estimated_hours {
        if !hours.is_finite() || !(0.0..=MAX_ESTIMATED_HOURS).contains(&hours) {
            errors.push(
                "estimatedHours",
                format!("must be between 0 and {}", MAX_ESTIMATED_HOURS),
            );
        }
    }

    if template.checklist.len() > MAX_CHECKLIST_ITEMS {
        errors.push(
            "checklist",
            format!("at most {} items are allowed", MAX_CHECKLIST_ITEMS),
        );
    }
    if template.checklist.iter().any(|item| item.text.trim().is_empty()) {
        errors.push("checklist", "items need text");
    }

    if template
        .attachments
        .iter()
        .any(|a| a.name.trim().is_empty() || a.url.trim().is_empty())
    {
        errors.push("attachments", "each attachment needs a name and a url");
    }
}
