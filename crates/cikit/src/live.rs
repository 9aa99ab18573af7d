//! Reading current models back from the live platform.
//!
//! The platform answers a `print ... dump` query with delimiter-separated
//! records. Sentinels are configurable so they never collide with real data:
//! ```text
//! description@@|@@part key@@;@@
//! hidden@@|@@false@@;@@
//! for type@@|@@Part@@;@@
//! field@@|@@name@@|@@size@@|@@21@@;@@
//! property@@|@@file date@@|@@2024-01-01 10:00:00@@;@@
//! ```
//!
//! The first column is the declarative keyword path. The remaining columns
//! are raw, unescaped values which go through the same kind table and model
//! setters as the declarative parser.

use crate::error::{Error, Result};
use crate::kind::{ChildDef, ColumnRole, ColumnType, Kind};
use crate::model::{CiObject, Origin, Record, Value};
use crate::token::quote;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Sentinels used to split live readback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveFormat {
    /// Separates columns within a record
    pub field_separator: String,
    /// Separates records
    pub record_separator: String,
}

impl Default for LiveFormat {
    fn default() -> Self {
        Self {
            field_separator: "@@|@@".to_string(),
            record_separator: "@@;@@".to_string(),
        }
    }
}

impl LiveFormat {
    /// Command that dumps one object.
    pub fn print_command(&self, kind: Kind, name: &str) -> String {
        format!(
            "print {kind} {} dump {} recordsep {};",
            quote(name),
            quote(&self.field_separator),
            quote(&self.record_separator)
        )
    }

    /// Command that lists all names of a kind.
    pub fn list_command(&self, kind: Kind) -> String {
        format!("list {kind} * recordsep {};", quote(&self.record_separator))
    }

    /// Split output into records with their byte offsets, skipping blanks.
    ///
    /// Leading line breaks belong to the separator, never to a value.
    fn records<'a>(&self, output: &'a str) -> Vec<(usize, &'a str)> {
        let mut out = Vec::new();
        let mut start = 0;
        for chunk in output.split(self.record_separator.as_str()) {
            // Only the line break the platform prints after each separator is
            // dropped; the last column keeps its trailing newlines.
            let record = chunk.trim_start_matches(['\n', '\r']);
            if !record.trim().is_empty() {
                out.push((start + chunk.len() - record.len(), record));
            }
            start += chunk.len() + self.record_separator.len();
        }
        out
    }
}

/// Parse a name listing: one name per record.
pub fn parse_names(output: &str, format: &LiveFormat) -> Vec<String> {
    format
        .records(output)
        .into_iter()
        .map(|(_, name)| name.trim().to_string())
        .collect()
}

/// Build the current model of one object from its dump.
pub fn parse_live(kind: Kind, name: &str, output: &str, format: &LiveFormat) -> Result<CiObject> {
    let mut obj = CiObject::with_origin(kind, name, Origin::Live);

    for (offset, record) in format.records(output) {
        let cols: Vec<&str> = record.split(format.field_separator.as_str()).collect();
        let path: Vec<&str> = cols[0].split_whitespace().collect();
        let values = &cols[1..];

        match path.as_slice() {
            ["symbolicname"] => {
                let alias = single(values, "symbolicname", offset)?;
                obj.symbolic_names.insert(alias.to_string());
            }
            ["property"] => {
                let key = first_value(values, "property", offset)?;
                let value = values.get(1).copied().unwrap_or_default();
                obj.properties.insert(key, value);
            }
            _ => apply_row(&mut obj, &path, values, offset)?,
        }
    }

    obj.properties.keep_read_order();
    obj.prepare();
    debug!("read live {kind} '{name}'");
    Ok(obj)
}

/// Apply one kind-specific row: a flag, a child record or a field value.
fn apply_row(obj: &mut CiObject, path: &[&str], values: &[&str], offset: usize) -> Result<()> {
    let schema = obj.schema();
    let fail = |message: String| Error::parse(offset, message);

    if let [word] = path {
        if let Some(flag) = schema.flag(word) {
            let value = flag
                .value_from_text(single(values, word, offset)?)
                .map_err(fail)?;
            return obj.set(flag.name, value).map_err(fail);
        }
        if let Some(list) = schema.list_by_keyword(word) {
            let record = live_record(list, values, offset)?;
            return obj.push_record(list.name, record).map_err(fail);
        }
    }

    let field = schema
        .field_by_path(path)
        .ok_or_else(|| fail(format!("unknown live keyword '{}'", path.join(" "))))?;
    let raw = single(values, &field.keyword_text(), offset)?;
    match field.value_from_text(raw).map_err(fail)? {
        Value::Names(names) => {
            for name in names {
                obj.add_name(field.name, name).map_err(fail)?;
            }
            Ok(())
        }
        other => obj.set(field.name, other).map_err(fail),
    }
}

fn single<'a>(values: &[&'a str], what: &str, offset: usize) -> Result<&'a str> {
    match values {
        [value] => Ok(*value),
        _ => Err(Error::parse(
            offset,
            format!("'{what}' expects one value, got {}", values.len()),
        )),
    }
}

fn first_value<'a>(values: &[&'a str], what: &str, offset: usize) -> Result<&'a str> {
    values
        .first()
        .copied()
        .ok_or_else(|| Error::parse(offset, format!("'{what}' expects a value")))
}

/// Convert one dumped child row: head columns, block column, name/value pairs.
fn live_record(list: &ChildDef, values: &[&str], offset: usize) -> Result<Record> {
    let mut cells = list.blank_cells();
    let mut rest = values.iter().copied();

    for (i, column) in list.columns.iter().enumerate() {
        if column.role == ColumnRole::Named {
            continue;
        }
        let raw = rest.next().ok_or_else(|| {
            Error::parse(
                offset,
                format!("{} record is missing column '{}'", list.keyword, column.name),
            )
        })?;
        cells[i] = column
            .value_from_text(raw)
            .map_err(|e| Error::parse(offset, e))?;
    }

    let pairs: Vec<&str> = rest.collect();
    if pairs.len() % 2 != 0 {
        return Err(Error::parse(
            offset,
            format!("{} record has an unpaired named column", list.keyword),
        ));
    }

    for pair in pairs.chunks(2) {
        let (word, raw) = (pair[0].trim(), pair[1]);
        if let Some((i, column)) = list.named_column(word) {
            let raw = if column.ty == ColumnType::Integer { raw.trim() } else { raw };
            cells[i] = column
                .value_from_text(raw)
                .map_err(|e| Error::parse(offset, e))?;
        } else if list.legacy.iter().any(|l| *l == word) {
            warn!("ignoring legacy '{word}' in live {}", list.keyword);
        } else {
            return Err(Error::parse(
                offset,
                format!("unknown column '{word}' in live {}", list.keyword),
            ));
        }
    }

    Ok(Record::new(cells))
}
