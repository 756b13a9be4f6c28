//! Declarative field and step schemas.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use shared::domain::{FieldMap, FieldValue, FileSlot, TriState};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").expect("email regex is valid")
});

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{6,19}$").expect("phone regex is valid"));

#[derive(Debug, Clone)]
pub enum FieldKind {
    Text,
    Choice(&'static [&'static str]),
    Flag,
    TriState,
    File,
    FileList,
    Nested(Vec<FieldSpec>),
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Choice(_) => "choice",
            Self::Flag => "flag",
            Self::TriState => "tri-state",
            Self::File => "file",
            Self::FileList => "file list",
            Self::Nested(_) => "nested",
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File | Self::FileList)
    }

    /// Whether `value` has the shape this kind stores.
    pub fn accepts(&self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (Self::Text, FieldValue::Text(_))
                | (Self::Choice(_), FieldValue::Choice(_))
                | (Self::Flag, FieldValue::Flag(_))
                | (Self::TriState, FieldValue::Tri(_))
                | (Self::File, FieldValue::File(_))
                | (Self::FileList, FieldValue::FileList(_))
                | (Self::Nested(_), FieldValue::Nested(_))
        )
    }
}

/// Predicate over the aggregate values of every step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Equals {
        field: &'static str,
        value: &'static str,
    },
    Is {
        field: &'static str,
        state: TriState,
    },
    Not(Box<Condition>),
}

impl Condition {
    pub fn equals(field: &'static str, value: &'static str) -> Self {
        Self::Equals { field, value }
    }

    pub fn is(field: &'static str, state: TriState) -> Self {
        Self::Is { field, state }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn holds(&self, values: &FieldMap) -> bool {
        match self {
            Self::Equals { field, value } => values
                .get(*field)
                .and_then(FieldValue::as_str)
                .is_some_and(|current| current == *value),
            Self::Is { field, state } => {
                matches!(values.get(*field), Some(FieldValue::Tri(current)) if current == state)
            }
            Self::Not(inner) => !inner.holds(values),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Optional,
    Required,
    RequiredWhen(Condition),
}

#[derive(Debug, Clone)]
pub enum Rule {
    MinLength(usize),
    MaxLength(usize),
    Email,
    Phone,
    Pattern {
        regex: Regex,
        message: &'static str,
    },
    /// Four-digit year between `min` and the current year.
    Year {
        min: i32,
    },
    /// ISO `YYYY-MM-DD`, not in the future.
    PastDate,
    MaxFileSize(u64),
    MimePrefix(&'static str),
    MaxItems(usize),
    MustBeTrue,
}

impl Rule {
    pub fn pattern(pattern: &str, message: &'static str) -> Self {
        Self::Pattern {
            regex: Regex::new(pattern).expect("schema patterns are static and valid"),
            message,
        }
    }

    /// Returns the failure message, or `None` when the value passes or the
    /// rule does not apply to its kind. Text rules see the trimmed text.
    pub fn check(&self, name: &str, value: &FieldValue) -> Option<String> {
        match (self, value) {
            (Self::MinLength(min), FieldValue::Text(text)) if text.trim().chars().count() < *min => {
                Some(format!("{name} must be at least {min} characters"))
            }
            (Self::MaxLength(max), FieldValue::Text(text)) if text.trim().chars().count() > *max => {
                Some(format!("{name} must be at most {max} characters"))
            }
            (Self::Email, FieldValue::Text(text)) if !EMAIL_RE.is_match(text.trim()) => {
                Some(format!("{name} must be a valid email address"))
            }
            (Self::Phone, FieldValue::Text(text)) if !PHONE_RE.is_match(text.trim()) => {
                Some(format!("{name} must be a valid phone number"))
            }
            (Self::Pattern { regex, message }, FieldValue::Text(text))
                if !regex.is_match(text.trim()) =>
            {
                Some(format!("{name} {message}"))
            }
            (Self::Year { min }, FieldValue::Text(text)) => {
                let max = Utc::now().year();
                match text.trim().parse::<i32>() {
                    Ok(year) if (*min..=max).contains(&year) => None,
                    _ => Some(format!("{name} must be a year between {min} and {max}")),
                }
            }
            (Self::PastDate, FieldValue::Text(text)) => {
                match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
                    Ok(date) if date <= Utc::now().date_naive() => None,
                    Ok(_) => Some(format!("{name} cannot be in the future")),
                    Err(_) => Some(format!("{name} must be a date formatted YYYY-MM-DD")),
                }
            }
            (Self::MaxFileSize(max), FieldValue::File(slot)) => oversized(name, *max, [slot]),
            (Self::MaxFileSize(max), FieldValue::FileList(slots)) => oversized(name, *max, slots),
            (Self::MimePrefix(prefix), FieldValue::File(slot)) => wrong_mime(name, prefix, [slot]),
            (Self::MimePrefix(prefix), FieldValue::FileList(slots)) => {
                wrong_mime(name, prefix, slots)
            }
            (Self::MaxItems(max), FieldValue::FileList(slots)) if slots.len() > *max => {
                Some(format!("{name} accepts at most {max} files"))
            }
            (Self::MustBeTrue, FieldValue::Flag(false)) => Some(format!("{name} must be accepted")),
            _ => None,
        }
    }
}

fn oversized<'a>(
    name: &str,
    max: u64,
    slots: impl IntoIterator<Item = &'a FileSlot>,
) -> Option<String> {
    slots
        .into_iter()
        .filter_map(FileSlot::staged)
        .any(|handle| handle.size_bytes() > max)
        .then(|| format!("{name} must be smaller than {} KB", max / 1024))
}

fn wrong_mime<'a>(
    name: &str,
    prefix: &str,
    slots: impl IntoIterator<Item = &'a FileSlot>,
) -> Option<String> {
    slots
        .into_iter()
        .filter_map(FileSlot::staged)
        .any(|handle| {
            !handle
                .mime_type
                .as_deref()
                .is_some_and(|mime| mime.starts_with(prefix))
        })
        .then(|| format!("{name} must be a {} file", prefix.trim_end_matches('/')))
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub requirement: Requirement,
    pub rules: Vec<Rule>,
}

impl FieldSpec {
    fn of(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            requirement: Requirement::Optional,
            rules: Vec::new(),
        }
    }

    pub fn text(name: &'static str) -> Self {
        Self::of(name, FieldKind::Text)
    }

    pub fn choice(name: &'static str, options: &'static [&'static str]) -> Self {
        Self::of(name, FieldKind::Choice(options))
    }

    pub fn flag(name: &'static str) -> Self {
        Self::of(name, FieldKind::Flag)
    }

    pub fn tri(name: &'static str) -> Self {
        Self::of(name, FieldKind::TriState)
    }

    pub fn file(name: &'static str) -> Self {
        Self::of(name, FieldKind::File)
    }

    pub fn file_list(name: &'static str) -> Self {
        Self::of(name, FieldKind::FileList)
    }

    pub fn nested(name: &'static str, children: Vec<FieldSpec>) -> Self {
        Self::of(name, FieldKind::Nested(children))
    }

    pub fn required(mut self) -> Self {
        self.requirement = Requirement::Required;
        self
    }

    pub fn required_when(mut self, condition: Condition) -> Self {
        self.requirement = Requirement::RequiredWhen(condition);
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn is_required(&self, aggregate: &FieldMap) -> bool {
        match &self.requirement {
            Requirement::Optional => false,
            Requirement::Required => true,
            Requirement::RequiredWhen(condition) => condition.holds(aggregate),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub index: usize,
    pub key: &'static str,
    pub title: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl StepDefinition {
    pub fn new(index: usize, key: &'static str, title: &'static str, fields: Vec<FieldSpec>) -> Self {
        Self {
            index,
            key,
            title,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn owns(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Fields required regardless of other answers.
    pub fn required_fields(&self) -> BTreeSet<&'static str> {
        self.fields
            .iter()
            .filter(|spec| spec.requirement == Requirement::Required)
            .map(|spec| spec.name)
            .collect()
    }

    pub fn file_fields(&self) -> BTreeSet<&'static str> {
        self.fields
            .iter()
            .filter(|spec| spec.kind.is_file())
            .map(|spec| spec.name)
            .collect()
    }
}

/// Looks up a top-level field across all steps.
pub fn find_field<'a>(steps: &'a [StepDefinition], name: &str) -> Option<(usize, &'a FieldSpec)> {
    steps
        .iter()
        .find_map(|step| step.field(name).map(|spec| (step.index, spec)))
}
