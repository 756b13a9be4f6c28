//! Schema-directed conversion of raw JSON answers into typed field values.

use serde_json::Value;
use shared::{
    domain::{FieldMap, FieldValue, FileSlot, TriState, WatchId},
    protocol::RecordFields,
};
use tracing::warn;

use crate::schema::{FieldKind, FieldSpec, StepDefinition};

/// Read-only starting values injected once when a wizard is constructed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitialState {
    record_id: Option<WatchId>,
    values: FieldMap,
}

impl InitialState {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the starting values of an edit flow from a fetched record.
    /// File fields hold the stored paths; unknown keys are ignored.
    pub fn from_record(steps: &[StepDefinition], record_id: WatchId, record: &RecordFields) -> Self {
        let mut values = FieldMap::new();
        for spec in steps.iter().flat_map(|step| step.fields.iter()) {
            let Some(raw) = record.get(spec.name) else {
                continue;
            };
            match coerce_json(spec, raw) {
                Some(value) => {
                    values.insert(spec.name.to_string(), value);
                }
                None if raw.is_null() => {}
                None => warn!(field = spec.name, "ignored record value of unexpected shape"),
            }
        }

        Self {
            record_id: Some(record_id),
            values,
        }
    }

    pub fn record_id(&self) -> Option<WatchId> {
        self.record_id
    }

    pub fn values(&self) -> &FieldMap {
        &self.values
    }

    pub(crate) fn into_parts(self) -> (Option<WatchId>, FieldMap) {
        (self.record_id, self.values)
    }
}

/// Converts one raw JSON value into the representation `spec` expects.
/// Returns `None` for nulls and for shapes that cannot be mapped.
pub fn coerce_json(spec: &FieldSpec, raw: &Value) -> Option<FieldValue> {
    match (&spec.kind, raw) {
        (_, Value::Null) => None,
        (FieldKind::Text, Value::String(s)) => Some(FieldValue::Text(s.clone())),
        (FieldKind::Text, Value::Number(n)) => Some(FieldValue::Text(n.to_string())),
        (FieldKind::Choice(_), Value::String(s)) => Some(FieldValue::Choice(s.clone())),
        (FieldKind::Choice(_), Value::Number(n)) => Some(FieldValue::Choice(n.to_string())),
        (FieldKind::Flag, Value::Bool(b)) => Some(FieldValue::Flag(*b)),
        (FieldKind::Flag, Value::Number(n)) => n.as_i64().map(|n| FieldValue::Flag(n != 0)),
        (FieldKind::Flag, Value::String(s)) => {
            match TriState::parse(s)? {
                TriState::Yes => Some(FieldValue::Flag(true)),
                TriState::No => Some(FieldValue::Flag(false)),
                TriState::NotApplicable => None,
            }
        }
        (FieldKind::TriState, Value::Bool(true)) => Some(FieldValue::Tri(TriState::Yes)),
        (FieldKind::TriState, Value::Bool(false)) => Some(FieldValue::Tri(TriState::No)),
        (FieldKind::TriState, Value::Number(n)) => match n.as_i64()? {
            1 => Some(FieldValue::Tri(TriState::Yes)),
            0 => Some(FieldValue::Tri(TriState::No)),
            _ => None,
        },
        (FieldKind::TriState, Value::String(s)) => TriState::parse(s).map(FieldValue::Tri),
        (FieldKind::File, Value::String(path)) if !path.is_empty() => {
            Some(FieldValue::File(FileSlot::Stored(path.clone())))
        }
        (FieldKind::FileList, Value::String(path)) if !path.is_empty() => {
            Some(FieldValue::FileList(vec![FileSlot::Stored(path.clone())]))
        }
        (FieldKind::FileList, Value::Array(items)) => Some(FieldValue::FileList(
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|path| !path.is_empty())
                .map(|path| FileSlot::Stored(path.to_string()))
                .collect(),
        )),
        (FieldKind::Nested(children), Value::Object(map)) => {
            let nested = children
                .iter()
                .filter_map(|child| {
                    let raw = map.get(child.name)?;
                    coerce_json(child, raw).map(|value| (child.name.to_string(), value))
                })
                .collect();
            Some(FieldValue::Nested(nested))
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/prefill_tests.rs"]
mod tests;
