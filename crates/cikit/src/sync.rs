//! Per-CI workflow: from file text and current model to a command batch.
//!
//! [`plan_update`] is pure; fetching the current model and sending the batch
//! happen in [`Client`](crate::Client). Every error is wrapped with the kind
//! and name of the CI it was raised for, so one failing CI can be reported
//! without touching the others in the same run.

use crate::delta::{Operation, compute_delta};
use crate::emit::{CommandBatch, EmitOptions, emit};
use crate::error::{Error, Result};
use crate::kind::Kind;
use crate::model::{
    CiObject, PROP_FILE_DATE, PROP_INSTALLED_DATE, PROP_INSTALLER, PROP_ORIGINAL_NAME,
    PROP_SUB_PATH,
};
use crate::parser::parse_document;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Format of date properties.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A discovered CI file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiFile {
    /// Kind declared by the file
    pub kind: Kind,
    /// Name declared by the file
    pub name: String,
    /// Location on disk
    pub path: PathBuf,
    /// Last modification time
    pub modified: DateTime<Utc>,
    /// Directory relative to the discovery root, `/`-separated
    pub sub_path: String,
}

/// Values stamped into bookkeeping properties.
#[derive(Debug, Clone)]
pub struct Stamp {
    /// Installer identity
    pub installer: String,
    /// Time of this run, used for objects created now
    pub now: DateTime<Utc>,
}

impl Stamp {
    /// Stamp for the current time.
    pub fn now(installer: impl Into<String>) -> Self {
        Self {
            installer: installer.into(),
            now: Utc::now(),
        }
    }
}

/// Planned update of one CI.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Kind of the CI
    pub kind: Kind,
    /// Name of the CI
    pub name: String,
    /// Whether the CI already exists on the platform
    pub exists: bool,
    /// Operations in emission order
    pub operations: Vec<Operation>,
    /// Commands to send
    pub batch: CommandBatch,
}

impl Plan {
    /// Whether the live object already matches the file.
    pub fn is_noop(&self) -> bool {
        self.exists && self.operations.is_empty()
    }
}

/// Plan the update of one CI.
///
/// `current` is `None` when the object does not exist yet.
pub fn plan_update(
    file: &CiFile,
    text: &str,
    current: Option<&CiObject>,
    stamp: &Stamp,
    options: &EmitOptions,
) -> Result<Plan> {
    plan_inner(file, text, current, stamp, options).map_err(|e| e.in_ci(file.kind, &file.name))
}

fn plan_inner(
    file: &CiFile,
    text: &str,
    current: Option<&CiObject>,
    stamp: &Stamp,
    options: &EmitOptions,
) -> Result<Plan> {
    let mut target = parse_document(text)?;
    if target.kind != file.kind || target.name != file.name {
        return Err(Error::Other(format!(
            "{} declares {} '{}'",
            file.path.display(),
            target.kind,
            target.name
        )));
    }

    let exists = current.is_some();
    let fresh;
    let current = match current {
        Some(obj) => obj,
        None => {
            fresh = CiObject::new(file.kind, file.name.clone());
            &fresh
        }
    };
    stamp_properties(&mut target, current, file, stamp);

    let operations = compute_delta(&target, current)?;
    let batch = if exists && operations.is_empty() {
        CommandBatch::default()
    } else {
        emit(file.kind, &file.name, exists, &operations, options)
    };

    Ok(Plan {
        kind: file.kind,
        name: file.name.clone(),
        exists,
        operations,
        batch,
    })
}

/// Set bookkeeping properties on a target model.
///
/// Creation-time properties are carried over from the live object when it
/// has them and set from the stamp otherwise.
pub fn stamp_properties(target: &mut CiObject, current: &CiObject, file: &CiFile, stamp: &Stamp) {
    let props = &mut target.properties;
    props.insert(PROP_INSTALLER, stamp.installer.clone());
    if file.sub_path.is_empty() {
        props.remove(PROP_SUB_PATH);
    } else {
        props.insert(PROP_SUB_PATH, file.sub_path.clone());
    }

    let installed = current
        .properties
        .get(PROP_INSTALLED_DATE)
        .map_or_else(|| stamp.now.format(DATE_FORMAT).to_string(), str::to_string);
    props.insert(PROP_INSTALLED_DATE, installed);

    let original = current
        .properties
        .get(PROP_ORIGINAL_NAME)
        .unwrap_or(file.name.as_str())
        .to_string();
    props.insert(PROP_ORIGINAL_NAME, original);

    props.insert(PROP_FILE_DATE, file.modified.format(DATE_FORMAT).to_string());
}
