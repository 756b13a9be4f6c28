//! Pure, synchronous step validation.

use std::{collections::BTreeMap, fmt};

use shared::domain::{FieldMap, FieldValue};

use crate::schema::{FieldKind, FieldSpec, StepDefinition};

/// Field name (dotted for nested fields) to the first failing message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn remove(&mut self, field: &str) {
        let nested_prefix = format!("{field}.");
        self.0
            .retain(|key, _| key != field && !key.starts_with(&nested_prefix));
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, message) in other.0 {
            self.insert(field, message);
        }
    }

    /// The errors whose top-level field belongs to `step`.
    pub fn for_step(&self, step: &StepDefinition) -> ValidationErrors {
        ValidationErrors(
            self.0
                .iter()
                .filter(|(field, _)| step.owns(top_level(field)))
                .map(|(field, message)| (field.clone(), message.clone()))
                .collect(),
        )
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.values().map(String::as_str).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Checks one step's fields. Conditional requirements are evaluated against
/// `values`, which holds the answers of every step.
pub fn validate_step(step: &StepDefinition, values: &FieldMap) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    for spec in &step.fields {
        check_field(spec, values.get(spec.name), values, None, &mut errors);
    }
    errors
}

pub fn validate_all(steps: &[StepDefinition], values: &FieldMap) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    for step in steps {
        errors.merge(validate_step(step, values));
    }
    errors
}

/// Index of the first step that owns one of the failing fields.
pub fn first_failing_step(steps: &[StepDefinition], errors: &ValidationErrors) -> Option<usize> {
    steps
        .iter()
        .find(|step| {
            errors.fields().any(|field| step.owns(top_level(field)))
        })
        .map(|step| step.index)
}

fn top_level(field: &str) -> &str {
    field.split('.').next().unwrap_or(field)
}

fn check_field(
    spec: &FieldSpec,
    value: Option<&FieldValue>,
    aggregate: &FieldMap,
    parent: Option<&str>,
    errors: &mut ValidationErrors,
) {
    let key = match parent {
        Some(parent) => format!("{parent}.{}", spec.name),
        None => spec.name.to_string(),
    };

    let value = match value {
        Some(value) if !value.is_blank() => value,
        _ => {
            if spec.is_required(aggregate) {
                errors.insert(key, format!("{} is required", spec.name));
            }
            return;
        }
    };

    if !spec.kind.accepts(value) {
        errors.insert(
            key,
            format!(
                "{} must be a {} value, got {}",
                spec.name,
                spec.kind.name(),
                value.kind_name()
            ),
        );
        return;
    }

    match (&spec.kind, value) {
        (FieldKind::Choice(options), FieldValue::Choice(selected))
            if !options.iter().any(|option| option == selected) =>
        {
            errors.insert(
                key,
                format!("{} must be one of: {}", spec.name, options.join(", ")),
            );
            return;
        }
        (FieldKind::Nested(children), FieldValue::Nested(map)) => {
            for child in children {
                check_field(child, map.get(child.name), aggregate, Some(key.as_str()), errors);
            }
        }
        _ => {}
    }

    if let Some(message) = spec.rules.iter().find_map(|rule| rule.check(spec.name, value)) {
        errors.insert(key, message);
    }
}

#[cfg(test)]
#[path = "tests/validator_tests.rs"]
mod tests;
