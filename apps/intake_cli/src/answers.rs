//! Answers files: one TOML key per wizard field. File fields hold a local
//! path (or an array of paths) that is read and staged.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use shared::domain::{FieldValue, FileHandle};
use tracing::debug;
use wizard::{coerce_json, schema::find_field, FieldKind, StepDefinition, WizardController, WizardError};

#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Value(FieldValue),
    File(FileHandle),
    Files(Vec<FileHandle>),
}

#[derive(Debug, Clone, Default)]
pub struct AnswerSheet {
    entries: Vec<(String, Answer)>,
}

impl AnswerSheet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn apply(self, wizard: &mut WizardController) -> Result<(), WizardError> {
        for (field, answer) in self.entries {
            match answer {
                Answer::Value(value) => wizard.set_value(&field, value)?,
                Answer::File(handle) => {
                    wizard.attach_file(&field, handle)?;
                }
                Answer::Files(handles) => {
                    for handle in handles {
                        wizard.append_file(&field, handle)?;
                    }
                }
            }
        }
        Ok(())
    }
}

pub fn load_answers(path: &Path, steps: &[StepDefinition]) -> Result<AnswerSheet> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read answers file '{}'", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_answers(&raw, base_dir, steps)
        .with_context(|| format!("invalid answers file '{}'", path.display()))
}

/// Relative file paths resolve against `base_dir`.
pub fn parse_answers(raw: &str, base_dir: &Path, steps: &[StepDefinition]) -> Result<AnswerSheet> {
    let table: toml::Table = toml::from_str(raw).context("answers are not valid TOML")?;
    let mut entries = Vec::with_capacity(table.len());

    for (name, value) in table {
        let (_, spec) = find_field(steps, &name)
            .ok_or_else(|| anyhow!("unknown field '{name}'"))?;
        let answer = match &spec.kind {
            FieldKind::File => {
                let Some(path) = value.as_str() else {
                    bail!("field '{name}' expects a file path");
                };
                Answer::File(read_file(base_dir, path)?)
            }
            FieldKind::FileList => {
                let paths = match &value {
                    toml::Value::String(path) => vec![path.as_str()],
                    toml::Value::Array(items) => items
                        .iter()
                        .map(|item| {
                            item.as_str()
                                .ok_or_else(|| anyhow!("field '{name}' expects file paths"))
                        })
                        .collect::<Result<_>>()?,
                    _ => bail!("field '{name}' expects a file path or a list of paths"),
                };
                Answer::Files(
                    paths
                        .into_iter()
                        .map(|path| read_file(base_dir, path))
                        .collect::<Result<_>>()?,
                )
            }
            kind => {
                let json = serde_json::to_value(&value)?;
                let coerced = coerce_json(spec, &json).ok_or_else(|| {
                    anyhow!("field '{name}' cannot be read as a {} value", kind.name())
                })?;
                Answer::Value(coerced)
            }
        };
        entries.push((name, answer));
    }

    debug!(fields = entries.len(), "parsed answers");
    Ok(AnswerSheet { entries })
}

fn read_file(base_dir: &Path, raw_path: &str) -> Result<FileHandle> {
    let path = resolve(base_dir, raw_path);
    let bytes =
        fs::read(&path).with_context(|| format!("failed to read file '{}'", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| raw_path.to_string());
    let mime_type = mime_guess::from_path(&path)
        .first()
        .map(|mime| mime.essence_str().to_string());
    Ok(FileHandle::new(file_name, mime_type, bytes))
}

fn resolve(base_dir: &Path, raw_path: &str) -> PathBuf {
    let path = Path::new(raw_path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
#[path = "tests/answers_tests.rs"]
mod tests;
