//! Writer for canonical declarative text.
//!
//! Output order is fixed per kind and never depends on the order in which
//! fields were set: header, description, flags, symbolic names, scalar
//! fields, name lists, child records, properties.

use crate::error::{Error, Result};
use crate::kind::{ChildDef, Column, ColumnRole, ColumnType, FieldDef, FieldType};
use crate::model::{CiObject, Record, RecordKey, Value};
use crate::parser::parse_document;
use crate::token::{is_bare_word, quote};
use std::fmt::Write;
use std::path::Path;

const INDENT: &str = "  ";

/// Write a CI to a file.
pub fn write_file(obj: &CiObject, path: &Path) -> Result<()> {
    std::fs::write(path, write_string(obj))?;
    Ok(())
}

/// Render a CI as canonical declarative text.
pub fn write_string(obj: &CiObject) -> String {
    let schema = obj.schema();
    let mut out = String::new();
    let _ = writeln!(out, "{} {} {{", obj.kind, quote(&obj.name));

    let _ = writeln!(out, "{INDENT}description {}", quote(obj.description()));

    for field in schema.fields.iter().filter(|f| f.is_flag()) {
        let bang = if obj.flag(field.name) { "" } else { "!" };
        let _ = writeln!(out, "{INDENT}{bang}{}", field.keyword_text());
    }

    for alias in &obj.symbolic_names {
        let _ = writeln!(out, "{INDENT}symbolicname {}", quote(alias));
    }

    for field in schema.fields.iter().filter(|f| is_scalar(f)) {
        let value = obj.get(field.name).cloned().unwrap_or_else(|| field.default_value());
        if field.always_written || value != field.default_value() {
            let _ = writeln!(
                out,
                "{INDENT}{} {}",
                field.keyword_text(),
                field_value(field, &value)
            );
        }
    }

    for field in schema.fields.iter().filter(|f| f.ty == FieldType::NameList) {
        if let Some(names) = obj.get(field.name).and_then(Value::as_names) {
            for name in names {
                let _ = writeln!(out, "{INDENT}{} {}", field.keyword_text(), quote(name));
            }
        }
    }

    for list in schema.lists {
        for record in obj.records(list.name) {
            let _ = writeln!(out, "{INDENT}{}", record_line(list, record));
        }
    }

    for (key, value) in obj.properties.written() {
        if value.is_empty() {
            let _ = writeln!(out, "{INDENT}property {}", quote(key));
        } else {
            let _ = writeln!(out, "{INDENT}property {} value {}", quote(key), quote(value));
        }
    }

    out.push_str("}\n");
    out
}

/// Fields written in the scalar section (not description, flags or name lists).
fn is_scalar(field: &FieldDef) -> bool {
    field.name != "description" && !field.is_flag() && field.ty != FieldType::NameList
}

/// Render a field value the way the parser reads it back.
pub(crate) fn field_value(field: &FieldDef, value: &Value) -> String {
    match (field.ty, value) {
        (FieldType::Choice(_), Value::Word(w) | Value::Text(w)) => word(w),
        (_, Value::Int(n)) => n.to_string(),
        (_, Value::Bool(b)) => b.to_string(),
        (_, Value::Names(names)) => names.iter().map(|n| quote(n)).collect::<Vec<_>>().join(" "),
        (_, Value::Text(t) | Value::Word(t)) => quote(t),
    }
}

/// Render a cell value the way the parser reads it back.
pub(crate) fn cell_value(column: &Column, value: &Value) -> String {
    match (column.ty, value) {
        (ColumnType::Rights, Value::Names(names)) => {
            let words: Vec<String> = names.iter().map(|n| word(n)).collect();
            format!("{{{}}}", words.join(" "))
        }
        (ColumnType::Word, Value::Word(w) | Value::Text(w)) => word(w),
        (_, Value::Int(n)) => n.to_string(),
        (_, Value::Text(t) | Value::Word(t)) => quote(t),
        (_, other) => quote(&other.to_string()),
    }
}

fn word(text: &str) -> String {
    if is_bare_word(text) {
        text.to_string()
    } else {
        quote(text)
    }
}

/// Render one record line, starting with the list's record keyword.
///
/// Optional head text and named columns holding their default are omitted.
pub fn record_line(list: &ChildDef, record: &Record) -> String {
    let mut parts = vec![list.keyword.to_string()];

    for role in [ColumnRole::Head, ColumnRole::Block, ColumnRole::Named] {
        for (column, value) in list.columns.iter().zip(&record.cells) {
            if column.role != role || is_omitted(column, value) {
                continue;
            }
            if role == ColumnRole::Named {
                parts.push(column.name.to_string());
            }
            parts.push(cell_value(column, value));
        }
    }

    parts.join(" ")
}

/// Render only the key columns of a record, as used to address it.
pub fn key_clause(list: &ChildDef, key: &RecordKey) -> String {
    let mut parts = vec![list.keyword.to_string()];
    let columns = list.key_indices().map(|i| &list.columns[i]);

    for (column, value) in columns.zip(&key.0) {
        if is_omitted(column, value) {
            continue;
        }
        if column.role == ColumnRole::Named {
            parts.push(column.name.to_string());
        }
        parts.push(cell_value(column, value));
    }

    parts.join(" ")
}

fn is_omitted(column: &Column, value: &Value) -> bool {
    match column.role {
        ColumnRole::Head => column.ty == ColumnType::OptText && value.as_str() == Some(""),
        ColumnRole::Block => false,
        ColumnRole::Named => *value == column.default_value(),
    }
}

/// Render a CI and verify that the text parses back to the same model and
/// the same text.
///
/// A mismatch is a [`Error::RoundTripViolation`]; it means the writer and
/// parser disagree about the format.
pub fn check_round_trip(obj: &CiObject) -> Result<String> {
    let expected = write_string(obj);
    let violation = |actual: String| Error::RoundTripViolation {
        kind: obj.kind,
        name: obj.name.clone(),
        expected: expected.clone(),
        actual,
    };

    let reparsed = parse_document(&expected).map_err(|e| violation(format!("<{e}>")))?;
    let actual = write_string(&reparsed);
    if reparsed != *obj || actual != expected {
        return Err(violation(actual));
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Kind;
    use crate::model::{Origin, PropertyMap};

    fn unique_key() -> CiObject {
        let mut obj = CiObject::new(Kind::UniqueKey, "UK_Part");
        obj.set("description", Value::Text("part {name} key".into())).unwrap();
        obj.set("forType", Value::Text("Part".into())).unwrap();
        obj.symbolic_names.insert("uk_b".into());
        obj.symbolic_names.insert("uk_a".into());
        obj.push_record(
            "fields",
            Record::new(vec![Value::Text("name".into()), Value::Int(20)]),
        )
        .unwrap();
        obj.push_record(
            "fields",
            Record::new(vec![Value::Text("desc".into()), Value::Int(0)]),
        )
        .unwrap();
        obj.properties.insert("z", "last");
        obj.properties.insert("a", "");
        obj.prepare();
        obj
    }

    #[test]
    fn test_write_unique_key() {
        let text = write_string(&unique_key());
        assert_eq!(
            text,
            r#"uniquekey "UK_Part" {
  description "part \{name\} key"
  !hidden
  enable
  !global
  symbolicname "uk_a"
  symbolicname "uk_b"
  for type "Part"
  field "desc"
  field "name" size 20
  property "a"
  property "z" value "last"
}
"#
        );
    }

    #[test]
    fn test_write_rule_access() {
        let mut obj = CiObject::new(Kind::Rule, "R");
        obj.push_record(
            "access",
            Record::new(vec![
                Value::Word("user".into()),
                Value::Text("Employee".into()),
                Value::names(["show", "read"]),
                Value::Text("emp".into()),
                Value::Text("a == \"b\"".into()),
            ]),
        )
        .unwrap();
        obj.push_record(
            "access",
            Record::new(vec![
                Value::Word("owner".into()),
                Value::Text(String::new()),
                Value::names(Vec::<String>::new()),
                Value::Text(String::new()),
                Value::Text(String::new()),
            ]),
        )
        .unwrap();
        obj.prepare();

        let text = write_string(&obj);
        assert!(text.contains("\n  access owner {}\n"));
        assert!(text.contains(
            "\n  access user \"Employee\" {read show} key \"emp\" filter \"a == \\\"b\\\"\"\n"
        ));
    }

    #[test]
    fn test_optional_scalars_omitted_at_default() {
        let mut obj = CiObject::new(Kind::Attribute, "A");
        let text = write_string(&obj);
        assert!(!text.contains("type"));
        assert!(!text.contains("maxlength"));
        assert!(text.contains("description \"\""));

        obj.set("type", Value::Word("string".into())).unwrap();
        obj.set("maxLength", Value::Int(40)).unwrap();
        let text = write_string(&obj);
        assert!(text.contains("\n  type string\n"));
        assert!(text.contains("\n  maxlength 40\n"));
    }

    #[test]
    fn test_every_flag_written_exactly_once() {
        for kind in Kind::ALL {
            let text = write_string(&CiObject::new(kind, "x"));
            for flag in kind.schema().fields.iter().filter(|f| f.is_flag()) {
                let kw = flag.keyword_text();
                let on = text.lines().filter(|l| l.trim() == kw).count();
                let off = text.lines().filter(|l| l.trim() == format!("!{kw}")).count();
                assert_eq!(on + off, 1, "{kind} {kw}");
            }
        }
    }

    #[test]
    fn test_name_list_written_sorted() {
        let mut obj = CiObject::new(Kind::Package, "P");
        obj.add_name("usesPackage", "Zed").unwrap();
        obj.add_name("usesPackage", "Alpha").unwrap();
        let text = write_string(&obj);
        let a = text.find("usespackage \"Alpha\"").unwrap();
        let z = text.find("usespackage \"Zed\"").unwrap();
        assert!(a < z);
    }

    #[test]
    fn test_key_clause() {
        let list = Kind::Rule.schema().list("access").unwrap();
        let key = RecordKey(vec![
            Value::Word("user".into()),
            Value::Text("Employee".into()),
            Value::Text("emp".into()),
        ]);
        assert_eq!(key_clause(list, &key), "access user \"Employee\" key \"emp\"");

        let key = RecordKey(vec![
            Value::Word("public".into()),
            Value::Text(String::new()),
            Value::Text(String::new()),
        ]);
        assert_eq!(key_clause(list, &key), "access public");
    }

    #[test]
    fn test_check_round_trip() {
        let obj = unique_key();
        let text = check_round_trip(&obj).unwrap();
        assert_eq!(text, write_string(&obj));
    }

    #[test]
    fn test_round_trip_of_live_model_keeps_property_order() {
        let mut obj = CiObject::with_origin(Kind::Index, "IX", Origin::Live);
        let mut props = PropertyMap::new();
        props.insert("zeta", "1");
        props.insert("alpha", "2");
        props.keep_read_order();
        obj.properties = props;

        let text = check_round_trip(&obj).unwrap();
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());
    }

    #[test]
    fn test_round_trip_violation_is_reported() {
        // a choice value outside the table cannot be read back
        let mut obj = CiObject::new(Kind::Attribute, "A");
        obj.set("type", Value::Word("blob".into())).unwrap();
        match check_round_trip(&obj).unwrap_err() {
            Error::RoundTripViolation { kind, name, .. } => {
                assert_eq!(kind, Kind::Attribute);
                assert_eq!(name, "A");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
