//! Multipart encoding of a submission request.
//!
//! Keys follow the bracket convention the intake API parses: `parent[child]`
//! for nested groups and a trailing `[]` for repeated values.

use reqwest::multipart::{Form, Part};
use shared::domain::{FieldValue, FileSlot};
use wizard::SubmissionRequest;

pub const REMOVED_FILES_KEY: &str = "removed_files[]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

pub fn encode_parts(request: &SubmissionRequest) -> Vec<FormPart> {
    let mut parts = Vec::new();
    for (name, value) in &request.values {
        push_value(&mut parts, name.clone(), value);
    }
    for path in &request.removed_files {
        parts.push(FormPart::text(REMOVED_FILES_KEY, path.clone()));
    }
    parts
}

fn push_value(parts: &mut Vec<FormPart>, key: String, value: &FieldValue) {
    match value {
        FieldValue::Text(text) | FieldValue::Choice(text) => parts.push(FormPart::text(key, text.clone())),
        FieldValue::Flag(flag) => parts.push(FormPart::text(key, if *flag { "1" } else { "0" })),
        FieldValue::Tri(state) => parts.push(FormPart::text(key, state.as_str())),
        FieldValue::File(slot) => push_slot(parts, key, slot),
        FieldValue::FileList(slots) => {
            let key = format!("{key}[]");
            for slot in slots {
                push_slot(parts, key.clone(), slot);
            }
        }
        FieldValue::Nested(children) => {
            for (child, value) in children {
                push_value(parts, format!("{key}[{child}]"), value);
            }
        }
    }
}

fn push_slot(parts: &mut Vec<FormPart>, key: String, slot: &FileSlot) {
    match slot {
        FileSlot::Stored(path) => parts.push(FormPart::text(key, path.clone())),
        FileSlot::Staged(handle) => parts.push(FormPart::File {
            name: key,
            file_name: handle.file_name.clone(),
            mime_type: handle.mime_or_default().to_string(),
            bytes: handle.bytes.clone(),
        }),
    }
}

pub fn into_multipart(parts: Vec<FormPart>) -> Result<Form, reqwest::Error> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name, value),
            FormPart::File {
                name,
                file_name,
                mime_type,
                bytes,
            } => form.part(name, Part::bytes(bytes).file_name(file_name).mime_str(&mime_type)?),
        };
    }
    Ok(form)
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
