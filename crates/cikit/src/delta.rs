//! Structural delta between a target and a current model.
//!
//! [`compute_delta`] is a pure function: it performs no I/O and returns the
//! same operations for the same two models. Ordering constraints between
//! operations are resolved here; the emitter never reorders.
//!
//! Order of the produced operations:
//!
//! 1. immutable fields (only when the current model has never set them)
//! 2. description, hidden, other unguarded flags and scalars, in table order
//! 3. symbolic names: all removals, then all additions
//! 4. name lists: removals, then additions, per list
//! 5. unguarded child lists: removals, modifications, additions
//! 6. structural changes, bracketed by the guard flag exactly once
//! 7. properties: removals, then sets; trailing keys last

use crate::error::{Error, Result};
use crate::kind::{ChildDef, FieldDef, FieldType, KindSchema, ListOrder};
use crate::model::{CiObject, Record, RecordKey, Value};
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One atomic mutation converging current state toward the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Set a text, choice or integer field
    SetScalar {
        /// Field name
        field: &'static str,
        /// New value
        value: Value,
    },
    /// Turn a flag on or off
    SetFlag {
        /// Field name
        field: &'static str,
        /// New state
        value: bool,
    },
    /// Register a symbolic name
    AddSymbolicName {
        /// Alias to add
        name: String,
    },
    /// Unregister a symbolic name
    RemoveSymbolicName {
        /// Alias to remove
        name: String,
    },
    /// Add one name to a name-list field
    AddListItem {
        /// Field name
        field: &'static str,
        /// Name to add
        name: String,
    },
    /// Remove one name from a name-list field
    RemoveListItem {
        /// Field name
        field: &'static str,
        /// Name to remove
        name: String,
    },
    /// Add a child record
    AddChild {
        /// List name
        list: &'static str,
        /// Full record
        record: Record,
    },
    /// Remove a child record
    RemoveChild {
        /// List name
        list: &'static str,
        /// Key of the removed record
        key: RecordKey,
    },
    /// Change non-key cells of a child record
    ModifyChild {
        /// List name
        list: &'static str,
        /// Key of the modified record
        key: RecordKey,
        /// Changed columns with their new values
        changes: Vec<(&'static str, Value)>,
    },
    /// Set a property
    SetProperty {
        /// Property key
        key: String,
        /// New value
        value: String,
    },
    /// Remove a property
    RemoveProperty {
        /// Property key
        key: String,
    },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::SetScalar { field, value } => write!(f, "set {field} = {value}"),
            Operation::SetFlag { field, value } => {
                write!(f, "{}{field}", if *value { "" } else { "!" })
            }
            Operation::AddSymbolicName { name } => write!(f, "add symbolic name {name}"),
            Operation::RemoveSymbolicName { name } => write!(f, "remove symbolic name {name}"),
            Operation::AddListItem { field, name } => write!(f, "add {name} to {field}"),
            Operation::RemoveListItem { field, name } => write!(f, "remove {name} from {field}"),
            Operation::AddChild { list, record } => {
                let cells: Vec<String> = record.cells.iter().map(ToString::to_string).collect();
                write!(f, "add {list} [{}]", cells.join(", "))
            }
            Operation::RemoveChild { list, key } => write!(f, "remove {list} {key}"),
            Operation::ModifyChild { list, key, changes } => {
                let changes: Vec<String> =
                    changes.iter().map(|(c, v)| format!("{c} = {v}")).collect();
                write!(f, "modify {list} {key}: {}", changes.join(", "))
            }
            Operation::SetProperty { key, value } => write!(f, "set property {key} = {value}"),
            Operation::RemoveProperty { key } => write!(f, "remove property {key}"),
        }
    }
}

/// Compute the ordered operations that turn `current` into `target`.
///
/// Fails with [`Error::Conflict`] when the models disagree on an immutable
/// field that the current object has already set; no operations are
/// returned in that case.
pub fn compute_delta(target: &CiObject, current: &CiObject) -> Result<Vec<Operation>> {
    if target.kind != current.kind {
        return Err(Error::Other(format!(
            "cannot compare {} '{}' with {} '{}'",
            target.kind, target.name, current.kind, current.name
        )));
    }

    let schema = target.schema();
    let mut ops = Vec::new();

    // 1. immutable fields
    for field in schema.fields.iter().filter(|f| f.immutable) {
        let (want, have) = field_pair(field, target, current);
        if want == have {
            continue;
        }
        if have != field.default_value() {
            return Err(Error::Conflict {
                field: field.name,
                target: want.to_string(),
                current: have.to_string(),
            });
        }
        ops.push(field_op(field, want));
    }

    // 2. unguarded flags and scalars
    for field in schema.fields.iter().filter(|f| {
        !f.immutable && f.ty != FieldType::NameList && !schema.is_guarded_field(f.name)
    }) {
        let (want, have) = field_pair(field, target, current);
        if want != have {
            ops.push(field_op(field, want));
        }
    }

    // 3. symbolic names
    ops.extend(
        current
            .symbolic_names
            .difference(&target.symbolic_names)
            .map(|name| Operation::RemoveSymbolicName { name: name.clone() }),
    );
    ops.extend(
        target
            .symbolic_names
            .difference(&current.symbolic_names)
            .map(|name| Operation::AddSymbolicName { name: name.clone() }),
    );

    // 4. name lists
    for field in schema.fields.iter().filter(|f| f.ty == FieldType::NameList) {
        let empty = BTreeSet::new();
        let want = target.get(field.name).and_then(Value::as_names).unwrap_or(&empty);
        let have = current.get(field.name).and_then(Value::as_names).unwrap_or(&empty);
        ops.extend(have.difference(want).map(|name| Operation::RemoveListItem {
            field: field.name,
            name: name.clone(),
        }));
        ops.extend(want.difference(have).map(|name| Operation::AddListItem {
            field: field.name,
            name: name.clone(),
        }));
    }

    // 5. unguarded child lists
    for list in schema.lists.iter().filter(|l| !schema.is_guarded_list(l.name)) {
        ops.extend(list_delta(list, target.records(list.name), current.records(list.name)));
    }

    // 6. guarded structural changes
    ops.extend(guarded_delta(schema, target, current));

    // 7. properties
    ops.extend(property_delta(schema, target, current));

    debug!(
        "{} '{}': {} operation(s)",
        target.kind,
        target.name,
        ops.len()
    );
    Ok(ops)
}

fn field_pair(field: &FieldDef, target: &CiObject, current: &CiObject) -> (Value, Value) {
    let value = |obj: &CiObject| {
        obj.get(field.name)
            .cloned()
            .unwrap_or_else(|| field.default_value())
    };
    (value(target), value(current))
}

fn field_op(field: &FieldDef, value: Value) -> Operation {
    match value {
        Value::Bool(on) if field.is_flag() => Operation::SetFlag {
            field: field.name,
            value: on,
        },
        value => Operation::SetScalar {
            field: field.name,
            value,
        },
    }
}

/// Operations inside the structural guard, bracketed by the guard flag.
fn guarded_delta(schema: &KindSchema, target: &CiObject, current: &CiObject) -> Vec<Operation> {
    let Some(guard) = schema.guard else {
        return Vec::new();
    };

    let mut structural = Vec::new();
    for name in guard.fields {
        if let Some(field) = schema.field(name) {
            let (want, have) = field_pair(field, target, current);
            if want != have {
                structural.push(field_op(field, want));
            }
        }
    }
    for name in guard.lists {
        if let Some(list) = schema.list(name) {
            structural.extend(list_delta(list, target.records(name), current.records(name)));
        }
    }

    let want_on = target.flag(guard.flag);
    let have_on = current.flag(guard.flag);
    let toggle = |on: bool| Operation::SetFlag {
        field: guard.flag,
        value: on,
    };

    let mut ops = Vec::new();
    if structural.is_empty() {
        if want_on != have_on {
            ops.push(toggle(want_on));
        }
        return ops;
    }

    if have_on {
        ops.push(toggle(false));
    }
    ops.extend(structural);
    if want_on {
        ops.push(toggle(true));
    }
    ops
}

/// Diff one child list.
pub fn list_delta(list: &ChildDef, target: &[Record], current: &[Record]) -> Vec<Operation> {
    match list.order {
        ListOrder::Sorted => sorted_list_delta(list, target, current),
        ListOrder::Positional => positional_list_delta(list, target, current),
    }
}

fn sorted_list_delta(list: &ChildDef, target: &[Record], current: &[Record]) -> Vec<Operation> {
    let want: BTreeMap<RecordKey, &Record> = target.iter().map(|r| (r.key(list), r)).collect();
    let have: BTreeMap<RecordKey, &Record> = current.iter().map(|r| (r.key(list), r)).collect();

    let mut removals = Vec::new();
    let mut modifications = Vec::new();
    let mut additions = Vec::new();

    for (key, old) in &have {
        match want.get(key) {
            None => removals.push(Operation::RemoveChild {
                list: list.name,
                key: key.clone(),
            }),
            Some(new) => modifications.extend(modify_child(list, key, new, old)),
        }
    }
    for (key, new) in &want {
        if !have.contains_key(key) {
            additions.push(Operation::AddChild {
                list: list.name,
                record: (*new).clone(),
            });
        }
    }

    removals.extend(modifications);
    removals.extend(additions);
    removals
}

/// Positional lists keep their longest common key prefix; everything after
/// it is removed from current and re-added from target, in order.
fn positional_list_delta(list: &ChildDef, target: &[Record], current: &[Record]) -> Vec<Operation> {
    let prefix = target
        .iter()
        .zip(current)
        .take_while(|(new, old)| new.key(list) == old.key(list))
        .count();

    let mut ops: Vec<Operation> = target[..prefix]
        .iter()
        .zip(&current[..prefix])
        .filter_map(|(new, old)| modify_child(list, &new.key(list), new, old))
        .collect();

    ops.extend(current[prefix..].iter().map(|old| Operation::RemoveChild {
        list: list.name,
        key: old.key(list),
    }));
    ops.extend(target[prefix..].iter().map(|new| Operation::AddChild {
        list: list.name,
        record: new.clone(),
    }));
    ops
}

fn modify_child(list: &ChildDef, key: &RecordKey, new: &Record, old: &Record) -> Option<Operation> {
    let changes: Vec<(&'static str, Value)> = list
        .columns
        .iter()
        .zip(new.cells.iter().zip(&old.cells))
        .filter(|(column, (a, b))| !column.key && a != b)
        .map(|(column, (a, _))| (column.name, a.clone()))
        .collect();

    (!changes.is_empty()).then(|| Operation::ModifyChild {
        list: list.name,
        key: key.clone(),
        changes,
    })
}

fn property_delta(schema: &KindSchema, target: &CiObject, current: &CiObject) -> Vec<Operation> {
    let want = target.properties.sorted();
    let have = current.properties.sorted();

    let mut ops = Vec::new();
    for key in have.keys() {
        if !want.contains_key(key) {
            ops.push(Operation::RemoveProperty {
                key: (*key).to_string(),
            });
        }
    }
    for (key, value) in &want {
        if have.get(key) != Some(value) {
            ops.push(Operation::SetProperty {
                key: (*key).to_string(),
                value: (*value).to_string(),
            });
        }
    }

    let (mut leading, trailing): (Vec<_>, Vec<_>) = ops.into_iter().partition(|op| match op {
        Operation::SetProperty { key, .. } | Operation::RemoveProperty { key } => {
            !schema.is_trailing_property(key)
        }
        _ => true,
    });
    leading.extend(trailing);
    leading
}

/// Replay operations on a copy of `current`.
///
/// Used to preview the result of a batch and to check that a delta
/// converges on its target.
pub fn apply_operations(current: &CiObject, ops: &[Operation]) -> Result<CiObject> {
    let mut obj = current.clone();
    let schema = obj.schema();

    for op in ops {
        match op {
            Operation::SetScalar { field, value } => {
                obj.set(field, value.clone()).map_err(Error::Other)?;
            }
            Operation::SetFlag { field, value } => {
                obj.set_flag(field, *value).map_err(Error::Other)?;
            }
            Operation::AddSymbolicName { name } => {
                obj.symbolic_names.insert(name.clone());
            }
            Operation::RemoveSymbolicName { name } => {
                obj.symbolic_names.remove(name);
            }
            Operation::AddListItem { field, name } => {
                obj.add_name(field, name.clone()).map_err(Error::Other)?;
            }
            Operation::RemoveListItem { field, name } => {
                obj.remove_name(field, name).map_err(Error::Other)?;
            }
            Operation::AddChild { list, record } => {
                obj.push_record(list, record.clone()).map_err(Error::Other)?;
                let def = list_def(schema, list)?;
                if def.order == ListOrder::Sorted
                    && let Some(records) = obj.children.get_mut(def.name)
                {
                    records.sort_by_cached_key(|r| r.key(def));
                }
            }
            Operation::RemoveChild { list, key } => {
                let def = list_def(schema, list)?;
                let records = obj.children.entry(def.name).or_default();
                let before = records.len();
                records.retain(|r| r.key(def) != *key);
                if records.len() == before {
                    return Err(Error::Other(format!("no {} {key} to remove", def.keyword)));
                }
            }
            Operation::ModifyChild { list, key, changes } => {
                let def = list_def(schema, list)?;
                let record = obj
                    .children
                    .entry(def.name)
                    .or_default()
                    .iter_mut()
                    .find(|r| r.key(def) == *key)
                    .ok_or_else(|| Error::Other(format!("no {} {key} to modify", def.keyword)))?;
                for (column, value) in changes {
                    record.set(def, column, value.clone());
                }
            }
            Operation::SetProperty { key, value } => {
                obj.properties.insert(key.clone(), value.clone());
            }
            Operation::RemoveProperty { key } => {
                obj.properties.remove(key);
            }
        }
    }
    Ok(obj)
}

fn list_def(schema: &'static KindSchema, list: &str) -> Result<&'static ChildDef> {
    schema
        .list(list)
        .ok_or_else(|| Error::Other(format!("{} has no list '{list}'", schema.kind)))
}
