use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(WatchId);

/// Answer to a yes/no question where "not applicable" is a legitimate reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriState {
    #[serde(rename = "yes")]
    Yes,
    #[serde(rename = "no")]
    No,
    #[serde(rename = "na")]
    NotApplicable,
}

impl TriState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::NotApplicable => "na",
        }
    }

    /// Accepts the spellings the intake API has historically produced for
    /// yes/no answers: `yes`/`no`/`na`, `true`/`false` and `1`/`0`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Some(Self::Yes),
            "no" | "n" | "false" | "0" => Some(Self::No),
            "na" | "n/a" | "not_applicable" => Some(Self::NotApplicable),
            _ => None,
        }
    }
}

impl fmt::Display for TriState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file selected by the user and held in memory until submission.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileHandle {
    pub fn new(file_name: impl Into<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type,
            bytes,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn mime_or_default(&self) -> &str {
        self.mime_type
            .as_deref()
            .unwrap_or("application/octet-stream")
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// Content of a file field: a fresh upload or the path of a file the API
/// already stores. Never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "file", rename_all = "snake_case")]
pub enum FileSlot {
    Staged(FileHandle),
    Stored(String),
}

impl FileSlot {
    pub fn staged(&self) -> Option<&FileHandle> {
        match self {
            Self::Staged(handle) => Some(handle),
            Self::Stored(_) => None,
        }
    }
}

pub type FieldMap = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Choice(String),
    Flag(bool),
    Tri(TriState),
    File(FileSlot),
    FileList(Vec<FileSlot>),
    Nested(FieldMap),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn choice(value: impl Into<String>) -> Self {
        Self::Choice(value.into())
    }

    pub fn stored_file(path: impl Into<String>) -> Self {
        Self::File(FileSlot::Stored(path.into()))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Choice(_) => "choice",
            Self::Flag(_) => "flag",
            Self::Tri(_) => "tri-state",
            Self::File(_) => "file",
            Self::FileList(_) => "file list",
            Self::Nested(_) => "nested",
        }
    }

    /// String view used by conditions and text rules.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) | Self::Choice(value) => Some(value),
            Self::Tri(state) => Some(state.as_str()),
            Self::Flag(true) => Some("1"),
            Self::Flag(false) => Some("0"),
            Self::File(_) | Self::FileList(_) | Self::Nested(_) => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(value) | Self::Choice(value) => value.trim().is_empty(),
            Self::Flag(_) | Self::Tri(_) | Self::File(_) => false,
            Self::FileList(slots) => slots.is_empty(),
            Self::Nested(children) => children.values().all(FieldValue::is_blank),
        }
    }

    pub fn has_staged_files(&self) -> bool {
        match self {
            Self::File(slot) => slot.staged().is_some(),
            Self::FileList(slots) => slots.iter().any(|slot| slot.staged().is_some()),
            Self::Nested(children) => children.values().any(FieldValue::has_staged_files),
            _ => false,
        }
    }

    /// Copy of the value with every in-memory upload removed. Returns `None`
    /// when nothing persistable is left.
    pub fn without_staged_files(&self) -> Option<Self> {
        match self {
            Self::File(FileSlot::Staged(_)) => None,
            Self::FileList(slots) => Some(Self::FileList(
                slots
                    .iter()
                    .filter(|slot| slot.staged().is_none())
                    .cloned()
                    .collect(),
            )),
            Self::Nested(children) => Some(Self::Nested(
                children
                    .iter()
                    .filter_map(|(name, value)| {
                        value
                            .without_staged_files()
                            .map(|value| (name.clone(), value))
                    })
                    .collect(),
            )),
            other => Some(other.clone()),
        }
    }
}

/// Stored file the user replaced or removed; the API deletes it once the
/// submission is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemovedFile {
    pub field: String,
    pub path: String,
}
