//! In-memory staging of uploads, the removal set for replaced stored files,
//! and transient preview URLs.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use shared::domain::{FieldMap, FieldValue, FileHandle, FileSlot, RemovedFile};
use tracing::debug;
use uuid::Uuid;

/// What the UI needs to show a staged file. Decoded image bytes are not kept;
/// `object_url` stays valid until the field changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePreview {
    pub field: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub mime_type: Option<String>,
    pub object_url: String,
}

impl FilePreview {
    fn open(field: &str, handle: &FileHandle) -> Self {
        let object_url = format!("blob:intake/{}", Uuid::new_v4());
        debug!(field, %object_url, file = %handle.file_name, "opened file preview");
        Self {
            field: field.to_string(),
            file_name: handle.file_name.clone(),
            size_bytes: handle.size_bytes(),
            mime_type: handle.mime_type.clone(),
            object_url,
        }
    }
}

/// Callback run for every preview as it is released; a UI revokes the
/// object URL here.
#[derive(Clone)]
pub struct ReleaseHook(Arc<dyn Fn(&FilePreview) + Send + Sync>);

impl ReleaseHook {
    pub fn new(hook: impl Fn(&FilePreview) + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }
}

impl fmt::Debug for ReleaseHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReleaseHook")
    }
}

#[derive(Debug, Default)]
pub struct FileStaging {
    previews: BTreeMap<String, Vec<FilePreview>>,
    removed: BTreeSet<RemovedFile>,
    on_release: Option<ReleaseHook>,
}

impl FileStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a removal set carried over from a saved draft.
    pub fn with_removed(removed: impl IntoIterator<Item = RemovedFile>) -> Self {
        Self {
            previews: BTreeMap::new(),
            removed: removed.into_iter().collect(),
            on_release: None,
        }
    }

    pub fn set_release_hook(&mut self, hook: ReleaseHook) {
        self.on_release = Some(hook);
    }

    /// Puts `handle` into a single-file field. A previously stored path for
    /// the field joins the removal set; a previously staged file is dropped.
    pub fn attach(&mut self, values: &mut FieldMap, field: &str, handle: FileHandle) -> FilePreview {
        let preview = FilePreview::open(field, &handle);
        let previous = values.insert(field.to_string(), FieldValue::File(FileSlot::Staged(handle)));
        self.retire(field, previous);
        self.release_field(field);
        self.previews
            .insert(field.to_string(), vec![preview.clone()]);
        preview
    }

    /// Adds `handle` to a multi-file field.
    pub fn append(&mut self, values: &mut FieldMap, field: &str, handle: FileHandle) -> FilePreview {
        let preview = FilePreview::open(field, &handle);
        match values.get_mut(field) {
            Some(FieldValue::FileList(slots)) => slots.push(FileSlot::Staged(handle)),
            _ => {
                let previous = values.insert(
                    field.to_string(),
                    FieldValue::FileList(vec![FileSlot::Staged(handle)]),
                );
                self.retire(field, previous);
            }
        }
        self.previews
            .entry(field.to_string())
            .or_default()
            .push(preview.clone());
        preview
    }

    /// Removes one entry of a multi-file field. Previews for the field are
    /// reissued because their positions shift.
    pub fn remove_at(&mut self, values: &mut FieldMap, field: &str, index: usize) -> Option<FileSlot> {
        let Some(FieldValue::FileList(slots)) = values.get_mut(field) else {
            return None;
        };
        if index >= slots.len() {
            return None;
        }

        let removed = slots.remove(index);
        if let FileSlot::Stored(path) = &removed {
            self.mark_removed(field, path);
        }
        let remaining: Vec<FilePreview> = slots
            .iter()
            .filter_map(FileSlot::staged)
            .map(|handle| FilePreview::open(field, handle))
            .collect();

        self.release_field(field);
        if !remaining.is_empty() {
            self.previews.insert(field.to_string(), remaining);
        }
        Some(removed)
    }

    /// Empties a file field entirely.
    pub fn clear(&mut self, values: &mut FieldMap, field: &str) {
        let previous = values.remove(field);
        self.retire(field, previous);
        self.release_field(field);
    }

    pub fn previews(&self, field: &str) -> &[FilePreview] {
        self.previews.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn live_previews(&self) -> usize {
        self.previews.values().map(Vec::len).sum()
    }

    pub fn removed_files(&self) -> &BTreeSet<RemovedFile> {
        &self.removed
    }

    pub fn is_pending_removal(&self, field: &str, path: &str) -> bool {
        self.removed.contains(&RemovedFile {
            field: field.to_string(),
            path: path.to_string(),
        })
    }

    /// Removal set as consumed by a successful submission.
    pub fn take_removed(&mut self) -> BTreeSet<RemovedFile> {
        std::mem::take(&mut self.removed)
    }

    pub fn release_all(&mut self) {
        let fields: Vec<String> = self.previews.keys().cloned().collect();
        for field in fields {
            self.release_field(&field);
        }
    }

    fn release_field(&mut self, field: &str) {
        if let Some(previews) = self.previews.remove(field) {
            for preview in previews {
                debug!(field, object_url = %preview.object_url, "released file preview");
                if let Some(ReleaseHook(hook)) = &self.on_release {
                    hook(&preview);
                }
            }
        }
    }

    fn retire(&mut self, field: &str, previous: Option<FieldValue>) {
        match previous {
            Some(FieldValue::File(FileSlot::Stored(path))) => self.mark_removed(field, &path),
            Some(FieldValue::FileList(slots)) => {
                for slot in slots {
                    if let FileSlot::Stored(path) = slot {
                        self.mark_removed(field, &path);
                    }
                }
            }
            _ => {}
        }
    }

    fn mark_removed(&mut self, field: &str, path: &str) {
        debug!(field, path, "stored file marked for removal");
        self.removed.insert(RemovedFile {
            field: field.to_string(),
            path: path.to_string(),
        });
    }
}

impl Drop for FileStaging {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
#[path = "tests/staging_tests.rs"]
mod tests;
