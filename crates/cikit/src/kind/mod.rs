//! Kind descriptors.
//!
//! Every configuration-item kind is described by a static [`KindSchema`]:
//! its fields, child-record lists, the flag that guards structural changes,
//! and which properties must be written last. The parser, writer, delta
//! calculator and emitter are generic over this table; adding a kind means
//! adding a schema, not code.

mod attribute;
mod index;
mod package;
mod rule;
mod unique_key;

use crate::model::{PROP_FILE_DATE, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of a configuration item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Attribute definition
    Attribute,
    /// Database index
    Index,
    /// Package grouping other administrative objects
    Package,
    /// Access rule
    Rule,
    /// Unique key on a type or interface
    UniqueKey,
}

impl Kind {
    /// All kinds, in declaration order.
    pub const ALL: [Kind; 5] = [
        Kind::Attribute,
        Kind::Index,
        Kind::Package,
        Kind::Rule,
        Kind::UniqueKey,
    ];

    /// Keyword used in declarative headers and in the command protocol.
    pub fn keyword(&self) -> &'static str {
        match self {
            Kind::Attribute => "attribute",
            Kind::Index => "index",
            Kind::Package => "package",
            Kind::Rule => "rule",
            Kind::UniqueKey => "uniquekey",
        }
    }

    /// Parse a kind from its keyword.
    pub fn from_keyword(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.keyword() == s)
    }

    /// Field table for this kind.
    pub fn schema(&self) -> &'static KindSchema {
        match self {
            Kind::Attribute => &attribute::SCHEMA,
            Kind::Index => &index::SCHEMA,
            Kind::Package => &package::SCHEMA,
            Kind::Rule => &rule::SCHEMA,
            Kind::UniqueKey => &unique_key::SCHEMA,
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// Value type of a top-level field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Quoted free text
    Text,
    /// Integer literal
    Integer,
    /// One word out of a fixed set (empty means unset)
    Choice(&'static [&'static str]),
    /// `keyword` for true, `!keyword` for false
    Flag,
    /// Repeated `keyword "name"` lines, stored as a sorted set
    NameList,
}

/// Default value of a field, usable in static tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    /// Empty text
    Text,
    /// Integer
    Int(i64),
    /// Boolean flag
    Bool(bool),
    /// Empty name set
    Names,
}

/// One top-level field of a kind.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Model name (used in operations and error messages)
    pub name: &'static str,
    /// Declarative keyword path, e.g. `["for", "type"]`
    pub keyword: &'static [&'static str],
    /// Value type
    pub ty: FieldType,
    /// Value of a freshly created object
    pub default: FieldDefault,
    /// Cannot change once the object exists
    pub immutable: bool,
    /// Written even when equal to the default
    pub always_written: bool,
    /// Command-protocol words for a flag's on/off states
    pub commands: Option<(&'static str, &'static str)>,
}

impl FieldDef {
    const fn new(
        name: &'static str,
        keyword: &'static [&'static str],
        ty: FieldType,
        default: FieldDefault,
    ) -> Self {
        Self {
            name,
            keyword,
            ty,
            default,
            immutable: false,
            always_written: false,
            commands: None,
        }
    }

    /// Flag field; flags are always written.
    pub const fn flag(name: &'static str, keyword: &'static [&'static str], default: bool) -> Self {
        Self::new(name, keyword, FieldType::Flag, FieldDefault::Bool(default)).always()
    }

    /// Free-text field.
    pub const fn text(name: &'static str, keyword: &'static [&'static str]) -> Self {
        Self::new(name, keyword, FieldType::Text, FieldDefault::Text)
    }

    /// Integer field.
    pub const fn integer(name: &'static str, keyword: &'static [&'static str], default: i64) -> Self {
        Self::new(name, keyword, FieldType::Integer, FieldDefault::Int(default))
    }

    /// Single-choice field.
    pub const fn choice(
        name: &'static str,
        keyword: &'static [&'static str],
        options: &'static [&'static str],
    ) -> Self {
        Self::new(name, keyword, FieldType::Choice(options), FieldDefault::Text)
    }

    /// Name-list field.
    pub const fn names(name: &'static str, keyword: &'static [&'static str]) -> Self {
        Self::new(name, keyword, FieldType::NameList, FieldDefault::Names)
    }

    /// Mark the field immutable after creation.
    pub const fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// Always write the field, even when it holds its default.
    pub const fn always(mut self) -> Self {
        self.always_written = true;
        self
    }

    /// Command words for the on/off states of a flag.
    pub const fn commands(mut self, on: &'static str, off: &'static str) -> Self {
        self.commands = Some((on, off));
        self
    }

    /// Whether this field is a flag.
    pub fn is_flag(&self) -> bool {
        self.ty == FieldType::Flag
    }

    /// Keyword path joined by spaces.
    pub fn keyword_text(&self) -> String {
        self.keyword.join(" ")
    }

    /// Default value of the field.
    pub fn default_value(&self) -> Value {
        match self.default {
            FieldDefault::Text => match self.ty {
                FieldType::Choice(_) => Value::Word(String::new()),
                _ => Value::Text(String::new()),
            },
            FieldDefault::Int(n) => Value::Int(n),
            FieldDefault::Bool(b) => Value::Bool(b),
            FieldDefault::Names => Value::Names(BTreeSet::new()),
        }
    }

    /// Convert raw (already unescaped) text into a typed value.
    ///
    /// Name lists take a single name and return a one-element set.
    pub fn value_from_text(&self, raw: &str) -> std::result::Result<Value, String> {
        match self.ty {
            FieldType::Text => Ok(Value::Text(raw.to_string())),
            FieldType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("'{}' expects an integer, got '{raw}'", self.name)),
            FieldType::Choice(options) => {
                if raw.is_empty() || options.iter().any(|o| *o == raw) {
                    Ok(Value::Word(raw.to_string()))
                } else {
                    Err(format!(
                        "'{}' must be one of {}, got '{raw}'",
                        self.name,
                        options.join(", ")
                    ))
                }
            }
            FieldType::Flag => match raw.trim().to_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(format!("'{}' expects true or false, got '{raw}'", self.name)),
            },
            FieldType::NameList => Ok(Value::Names(BTreeSet::from([raw.to_string()]))),
        }
    }
}

/// The description field shared by every kind.
pub const DESCRIPTION: FieldDef = FieldDef::text("description", &["description"]).always();

/// The hidden flag shared by every kind.
pub const HIDDEN: FieldDef = FieldDef::flag("hidden", &["hidden"], false).commands("hidden", "nothidden");

/// Value type of a child-record column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Quoted text, required
    Text,
    /// Quoted text, omitted when empty
    OptText,
    /// Bare word
    Word,
    /// Integer literal
    Integer,
    /// Braced set of access words, e.g. `{read modify}`
    Rights,
}

/// Where a column appears in a record line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Positional, right after the record keyword
    Head,
    /// Braced block after the head columns
    Block,
    /// `name value` pair after the head and block
    Named,
}

/// One column of a child record.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    /// Column name (named columns use it as their keyword)
    pub name: &'static str,
    /// Value type
    pub ty: ColumnType,
    /// Position in the record line
    pub role: ColumnRole,
    /// Part of the composite key
    pub key: bool,
}

impl Column {
    /// Positional column.
    pub const fn head(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            role: ColumnRole::Head,
            key: false,
        }
    }

    /// Braced rights block.
    pub const fn block(name: &'static str) -> Self {
        Self {
            name,
            ty: ColumnType::Rights,
            role: ColumnRole::Block,
            key: false,
        }
    }

    /// Named `name value` column.
    pub const fn named(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            role: ColumnRole::Named,
            key: false,
        }
    }

    /// Make the column part of the composite key.
    pub const fn key(mut self) -> Self {
        self.key = true;
        self
    }

    /// Default cell value.
    pub fn default_value(&self) -> Value {
        match self.ty {
            ColumnType::Text | ColumnType::OptText => Value::Text(String::new()),
            ColumnType::Word => Value::Word(String::new()),
            ColumnType::Integer => Value::Int(0),
            ColumnType::Rights => Value::Names(BTreeSet::new()),
        }
    }

    /// Convert raw (already unescaped) text into a typed cell.
    ///
    /// Rights are comma separated.
    pub fn value_from_text(&self, raw: &str) -> std::result::Result<Value, String> {
        match self.ty {
            ColumnType::Text | ColumnType::OptText => Ok(Value::Text(raw.to_string())),
            ColumnType::Word => Ok(Value::Word(raw.trim().to_string())),
            ColumnType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("column '{}' expects an integer, got '{raw}'", self.name)),
            ColumnType::Rights => Ok(Value::Names(
                raw.split([',', ' '])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            )),
        }
    }
}

/// How a child list is ordered on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    /// Unordered on the platform; stored sorted by composite key
    Sorted,
    /// Order is significant; stored and compared as a sequence
    Positional,
}

/// Fixed numeric correction applied to a column of live readback.
#[derive(Debug, Clone, Copy)]
pub struct LiveCorrection {
    /// Integer column to correct
    pub column: &'static str,
    /// Amount added to positive values read from the live system
    pub delta: i64,
}

/// A list of child records.
#[derive(Debug, Clone, Copy)]
pub struct ChildDef {
    /// List name in the model (used in operations)
    pub name: &'static str,
    /// Record keyword in the declarative text
    pub keyword: &'static str,
    /// Columns, in storage order
    pub columns: &'static [Column],
    /// Platform ordering of the list
    pub order: ListOrder,
    /// Named words inside a record that are accepted and ignored
    pub legacy: &'static [&'static str],
    /// Platform readback correction
    pub live_correction: Option<LiveCorrection>,
}

impl ChildDef {
    /// Find a column by name, with its index.
    pub fn column(&self, name: &str) -> Option<(usize, &Column)> {
        self.columns.iter().enumerate().find(|(_, c)| c.name == name)
    }

    /// Find a named column by its keyword.
    pub fn named_column(&self, word: &str) -> Option<(usize, &Column)> {
        self.column(word)
            .filter(|(_, c)| c.role == ColumnRole::Named)
    }

    /// Indices of the key columns.
    pub fn key_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.key)
            .map(|(i, _)| i)
    }

    /// Default cells of a new record.
    pub fn blank_cells(&self) -> Vec<Value> {
        self.columns.iter().map(Column::default_value).collect()
    }
}

/// A flag that must be off while structural fields change.
#[derive(Debug, Clone, Copy)]
pub struct StructuralGuard {
    /// Flag field name
    pub flag: &'static str,
    /// Child lists whose changes need the flag off
    pub lists: &'static [&'static str],
    /// Fields whose changes need the flag off
    pub fields: &'static [&'static str],
}

/// Complete description of one kind.
#[derive(Debug)]
pub struct KindSchema {
    /// The kind described
    pub kind: Kind,
    /// Top-level fields, in canonical order
    pub fields: &'static [FieldDef],
    /// Child-record lists, in canonical order
    pub lists: &'static [ChildDef],
    /// Structural guard, if the kind has one
    pub guard: Option<StructuralGuard>,
    /// Property keys whose changes are emitted after everything else
    pub trailing_properties: &'static [&'static str],
}

impl KindSchema {
    /// Find a field by model name.
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Find a flag by its keyword.
    pub fn flag(&self, keyword: &str) -> Option<&'static FieldDef> {
        self.fields
            .iter()
            .find(|f| f.is_flag() && f.keyword == [keyword])
    }

    /// Find a non-flag field by its full keyword path.
    pub fn field_by_path(&self, path: &[&str]) -> Option<&'static FieldDef> {
        self.fields
            .iter()
            .find(|f| !f.is_flag() && f.keyword == path)
    }

    /// Non-flag fields whose keyword path starts with `word`.
    pub fn fields_starting_with<'s>(
        &'s self,
        word: &'s str,
    ) -> impl Iterator<Item = &'static FieldDef> + 's {
        self.fields
            .iter()
            .filter(move |f| !f.is_flag() && f.keyword.first() == Some(&word))
    }

    /// Find a child list by model name.
    pub fn list(&self, name: &str) -> Option<&'static ChildDef> {
        self.lists.iter().find(|l| l.name == name)
    }

    /// Find a child list by record keyword.
    pub fn list_by_keyword(&self, keyword: &str) -> Option<&'static ChildDef> {
        self.lists.iter().find(|l| l.keyword == keyword)
    }

    /// Whether a field change falls inside the structural guard.
    pub fn is_guarded_field(&self, name: &str) -> bool {
        self.guard
            .is_some_and(|g| g.flag == name || g.fields.iter().any(|f| *f == name))
    }

    /// Whether a list change falls inside the structural guard.
    pub fn is_guarded_list(&self, name: &str) -> bool {
        self.guard
            .is_some_and(|g| g.lists.iter().any(|l| *l == name))
    }

    /// Whether a property key is emitted after all other operations.
    pub fn is_trailing_property(&self, key: &str) -> bool {
        self.trailing_properties.iter().any(|k| *k == key)
    }
}

/// Trailing properties shared by every kind: the file date is only
/// written once all other changes went through.
const TRAILING_PROPERTIES: &[&str] = &[PROP_FILE_DATE];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_round_trip() {
        for kind in Kind::ALL {
            assert_eq!(Kind::from_keyword(kind.keyword()), Some(kind));
            assert_eq!(kind.schema().kind, kind);
        }
        assert_eq!(Kind::from_keyword("program"), None);
    }

    #[test]
    fn test_every_schema_starts_with_common_fields() {
        for kind in Kind::ALL {
            let schema = kind.schema();
            assert_eq!(schema.fields[0].name, "description");
            assert_eq!(schema.fields[1].name, "hidden");
        }
    }

    #[test]
    fn test_every_list_has_a_key() {
        for kind in Kind::ALL {
            for list in kind.schema().lists {
                assert!(list.key_indices().count() > 0, "{kind} {}", list.name);
            }
        }
    }

    #[test]
    fn test_guard_references_exist() {
        for kind in Kind::ALL {
            let schema = kind.schema();
            if let Some(guard) = schema.guard {
                assert!(schema.field(guard.flag).is_some_and(FieldDef::is_flag));
                for list in guard.lists {
                    assert!(schema.list(list).is_some());
                }
                for field in guard.fields {
                    assert!(schema.field(field).is_some());
                }
            }
        }
    }

    #[test]
    fn test_named_columns_do_not_shadow_top_level_keywords() {
        for kind in Kind::ALL {
            let schema = kind.schema();
            for list in schema.lists {
                for column in list.columns.iter().filter(|c| c.role == ColumnRole::Named) {
                    assert!(schema.fields_starting_with(column.name).next().is_none());
                    assert!(schema.flag(column.name).is_none());
                    assert!(schema.list_by_keyword(column.name).is_none());
                    assert!(!["description", "symbolicname", "property"].contains(&column.name));
                }
            }
        }
    }

    #[test]
    fn test_value_from_text() {
        let choice = FieldDef::choice("type", &["type"], &["string", "integer"]);
        assert_eq!(
            choice.value_from_text("integer").unwrap(),
            Value::Word("integer".into())
        );
        assert!(choice.value_from_text("blob").is_err());

        let flag = FieldDef::flag("hidden", &["hidden"], false);
        assert_eq!(flag.value_from_text("TRUE").unwrap(), Value::Bool(true));
        assert!(flag.value_from_text("yes").is_err());

        let rights = Column::block("rights");
        assert_eq!(
            rights.value_from_text("read, modify,show").unwrap(),
            Value::names(["modify", "read", "show"])
        );
    }
}
