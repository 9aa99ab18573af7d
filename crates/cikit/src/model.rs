//! In-memory object model for configuration items.
//!
//! A [`CiObject`] is generic over its kind: fields and child lists are keyed
//! by the names declared in the kind's [`KindSchema`](crate::kind::KindSchema).
//! Unordered platform state is held in sets or sorted vectors so that two
//! models built from differently ordered text compare equal.

use crate::kind::{ChildDef, FieldType, Kind, KindSchema, ListOrder};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Property holding the modification time of the source file.
pub const PROP_FILE_DATE: &str = "file date";
/// Property naming the tool that installed the object.
pub const PROP_INSTALLER: &str = "installer";
/// Property holding the time the object was first created.
pub const PROP_INSTALLED_DATE: &str = "installed date";
/// Property holding the name the object was created with.
pub const PROP_ORIGINAL_NAME: &str = "original name";
/// Property holding the directory of the source file, relative to its root.
pub const PROP_SUB_PATH: &str = "sub path";

/// Property keys set by the workflow rather than by users.
pub const RESERVED_PROPERTIES: [&str; 5] = [
    PROP_FILE_DATE,
    PROP_INSTALLER,
    PROP_INSTALLED_DATE,
    PROP_ORIGINAL_NAME,
    PROP_SUB_PATH,
];

/// A typed field or cell value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Free text
    Text(String),
    /// Bare word (choice value, record kind)
    Word(String),
    /// Integer
    Int(i64),
    /// Flag
    Bool(bool),
    /// Unordered set of names
    Names(BTreeSet<String>),
}

impl Value {
    /// Build a name set.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Names(names.into_iter().map(Into::into).collect())
    }

    /// Text content of a text or word value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Word(s) => Some(s),
            _ => None,
        }
    }

    /// Flag value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Name set value.
    pub fn as_names(&self) -> Option<&BTreeSet<String>> {
        match self {
            Value::Names(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) | Value::Word(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Names(names) => {
                let joined: Vec<&str> = names.iter().map(String::as_str).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

/// Composite key identifying a child record within its list.
///
/// Ordered cell by cell, so sorting records by key never goes through
/// string concatenation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordKey(pub Vec<Value>);

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cell) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match cell {
                Value::Text(text) => f.write_str(&crate::token::quote(text))?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

/// One child record; cells are aligned with the list's column table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    /// Cell values, in column order
    pub cells: Vec<Value>,
}

impl Record {
    /// Create a record from cells.
    pub fn new(cells: Vec<Value>) -> Self {
        Self { cells }
    }

    /// Composite key of this record.
    pub fn key(&self, list: &ChildDef) -> RecordKey {
        RecordKey(
            list.key_indices()
                .filter_map(|i| self.cells.get(i).cloned())
                .collect(),
        )
    }

    /// Cell value by column name.
    pub fn get(&self, list: &ChildDef, column: &str) -> Option<&Value> {
        list.column(column).and_then(|(i, _)| self.cells.get(i))
    }

    /// Set a cell by column name.
    pub fn set(&mut self, list: &ChildDef, column: &str, value: Value) -> bool {
        match list.column(column) {
            Some((i, _)) if i < self.cells.len() => {
                self.cells[i] = value;
                true
            }
            _ => false,
        }
    }
}

/// Property map compared as an unordered map.
///
/// Entries keep the order they were read in. Maps that were never read from
/// text or a live dump are written sorted by key.
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    entries: Vec<(String, String)>,
    read_order: bool,
}

impl PropertyMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the current insertion order when writing.
    pub fn keep_read_order(&mut self) {
        self.read_order = true;
    }

    /// Whether entries are written in the order they were read.
    pub fn has_read_order(&self) -> bool {
        self.read_order
    }

    /// Get a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert a property, replacing an existing value in place.
    ///
    /// Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut entry.1, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Remove a property.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries sorted by key.
    pub fn sorted(&self) -> BTreeMap<&str, &str> {
        self.iter().collect()
    }

    /// Entries in the order they are written out.
    pub fn written(&self) -> Vec<(&str, &str)> {
        if self.read_order {
            self.iter().collect()
        } else {
            self.sorted().into_iter().collect()
        }
    }
}

impl PartialEq for PropertyMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.sorted() == other.sorted()
    }
}

impl Eq for PropertyMap {}

impl Serialize for PropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.sorted().serialize(serializer)
    }
}

/// Where a model came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Parsed from declarative text
    File,
    /// Read back from the live platform
    Live,
    /// Freshly constructed (object does not exist yet)
    New,
}

/// One configuration item.
#[derive(Debug, Clone, Serialize)]
pub struct CiObject {
    /// Kind of the item
    pub kind: Kind,
    /// Name, unique within the kind
    pub name: String,
    /// Source of this model
    #[serde(skip)]
    pub origin: Origin,
    /// Field values keyed by field name; every declared field is present
    pub fields: BTreeMap<&'static str, Value>,
    /// Symbolic-name aliases
    pub symbolic_names: BTreeSet<String>,
    /// Child records keyed by list name
    pub children: BTreeMap<&'static str, Vec<Record>>,
    /// Generic property map
    pub properties: PropertyMap,
}

impl PartialEq for CiObject {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.fields == other.fields
            && self.symbolic_names == other.symbolic_names
            && self.children == other.children
            && self.properties == other.properties
    }
}

impl Eq for CiObject {}

impl CiObject {
    /// Create a model holding only default values.
    pub fn new(kind: Kind, name: impl Into<String>) -> Self {
        Self::with_origin(kind, name, Origin::New)
    }

    /// Create a default model with an explicit origin.
    pub fn with_origin(kind: Kind, name: impl Into<String>, origin: Origin) -> Self {
        let schema = kind.schema();
        Self {
            kind,
            name: name.into(),
            origin,
            fields: schema
                .fields
                .iter()
                .map(|f| (f.name, f.default_value()))
                .collect(),
            symbolic_names: BTreeSet::new(),
            children: schema.lists.iter().map(|l| (l.name, Vec::new())).collect(),
            properties: PropertyMap::new(),
        }
    }

    /// Field table of this model's kind.
    pub fn schema(&self) -> &'static KindSchema {
        self.kind.schema()
    }

    /// Field value by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Text of a text or choice field; empty when unset.
    pub fn text(&self, field: &str) -> &str {
        self.get(field).and_then(Value::as_str).unwrap_or_default()
    }

    /// Value of a flag; `false` when the kind has no such flag.
    pub fn flag(&self, field: &str) -> bool {
        self.get(field).and_then(Value::as_bool).unwrap_or(false)
    }

    /// The description text.
    pub fn description(&self) -> &str {
        self.text("description")
    }

    /// Set a declared field.
    pub fn set(&mut self, field: &str, value: Value) -> Result<(), String> {
        let def = self
            .schema()
            .field(field)
            .ok_or_else(|| format!("{} has no field '{field}'", self.kind))?;
        self.fields.insert(def.name, value);
        Ok(())
    }

    /// Set a flag.
    pub fn set_flag(&mut self, field: &str, on: bool) -> Result<(), String> {
        self.set(field, Value::Bool(on))
    }

    /// Add one name to a name-list field.
    pub fn add_name(&mut self, field: &str, name: impl Into<String>) -> Result<bool, String> {
        match self.names_mut(field)? {
            Some(names) => Ok(names.insert(name.into())),
            None => Err(format!("'{field}' is not a name list")),
        }
    }

    /// Remove one name from a name-list field.
    pub fn remove_name(&mut self, field: &str, name: &str) -> Result<bool, String> {
        match self.names_mut(field)? {
            Some(names) => Ok(names.remove(name)),
            None => Err(format!("'{field}' is not a name list")),
        }
    }

    fn names_mut(&mut self, field: &str) -> Result<Option<&mut BTreeSet<String>>, String> {
        let def = self
            .schema()
            .field(field)
            .ok_or_else(|| format!("{} has no field '{field}'", self.kind))?;
        if def.ty != FieldType::NameList {
            return Ok(None);
        }
        let entry = self
            .fields
            .entry(def.name)
            .or_insert_with(|| Value::Names(BTreeSet::new()));
        match entry {
            Value::Names(names) => Ok(Some(names)),
            _ => Ok(None),
        }
    }

    /// Records of a child list.
    pub fn records(&self, list: &str) -> &[Record] {
        self.children.get(list).map_or(&[], Vec::as_slice)
    }

    /// Append a record, rejecting a duplicate composite key.
    pub fn push_record(&mut self, list: &str, record: Record) -> Result<(), String> {
        let def = self
            .schema()
            .list(list)
            .ok_or_else(|| format!("{} has no list '{list}'", self.kind))?;
        if record.cells.len() != def.columns.len() {
            return Err(format!(
                "{} record expects {} cells, got {}",
                def.keyword,
                def.columns.len(),
                record.cells.len()
            ));
        }

        let key = record.key(def);
        let records = self.children.entry(def.name).or_default();
        if records.iter().any(|r| r.key(def) == key) {
            return Err(format!("duplicate {} {key}", def.keyword));
        }
        records.push(record);
        Ok(())
    }

    /// Normalize after all input was consumed.
    ///
    /// Sorted lists are ordered by composite key. Models read from the live
    /// platform get each list's readback correction applied once.
    pub fn prepare(&mut self) {
        let schema = self.schema();
        for def in schema.lists {
            let Some(records) = self.children.get_mut(def.name) else {
                continue;
            };

            if self.origin == Origin::Live
                && let Some(correction) = def.live_correction
                && let Some((col, _)) = def.column(correction.column)
            {
                for record in records.iter_mut() {
                    if let Some(Value::Int(n)) = record.cells.get_mut(col)
                        && *n > 0
                    {
                        *n += correction.delta;
                    }
                }
            }

            if def.order == ListOrder::Sorted {
                records.sort_by_cached_key(|r| r.key(def));
            }
        }
    }
}
