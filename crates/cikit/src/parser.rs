//! Declarative parser for CI files.
//!
//! One file holds exactly one CI:
//! ```text
//! index "IX_Part" {
//!   description "part lookup"
//!   !hidden
//!   enable
//!   !unique
//!   symbolicname "index_Part"
//!   field "attribute\[Name\]" size 20
//!   field "type"
//!   property "owner" value "plm"
//! }
//! ```
//!
//! The body grammar is driven entirely by the kind's [`KindSchema`]; this
//! module knows only the common keywords (`symbolicname`, `property`).

use crate::error::{Error, Result};
use crate::kind::{ChildDef, ColumnRole, ColumnType, FieldDef, FieldType, Kind, KindSchema};
use crate::model::{CiObject, Origin, Record, Value};
use crate::token::{Cursor, Token};
use log::{debug, warn};

/// Parse a whole CI file.
pub fn parse_document(text: &str) -> Result<CiObject> {
    let mut cursor = Cursor::new(text);
    let (kind, name) = read_header(&mut cursor)?;
    let (body, offset) = cursor.expect_block("CI body")?;

    if !cursor.is_at_end() {
        return Err(Error::parse(
            cursor.offset(),
            "only one CI declaration is allowed per file",
        ));
    }

    parse_body(kind, &name, &body, offset)
}

/// Read only the `kind "name"` header of a CI file.
pub fn parse_header(text: &str) -> Result<(Kind, String)> {
    read_header(&mut Cursor::new(text))
}

fn read_header(cursor: &mut Cursor<'_>) -> Result<(Kind, String)> {
    let offset = cursor.next_offset();
    let keyword = cursor.expect_word("CI kind")?;
    let kind = Kind::from_keyword(&keyword)
        .ok_or_else(|| Error::parse(offset, format!("unknown CI kind '{keyword}'")))?;
    let name = cursor.expect_text("CI name")?;
    Ok((kind, name))
}

/// Parse the body of one CI declaration (the text between its braces).
///
/// `offset` is the absolute position of `body` in the file, used for error
/// reporting.
pub fn parse_body(kind: Kind, name: &str, body: &str, offset: usize) -> Result<CiObject> {
    let mut obj = CiObject::with_origin(kind, name, Origin::File);
    let mut parser = BodyParser {
        cursor: Cursor::with_offset(body, offset),
        schema: kind.schema(),
    };

    while !parser.cursor.is_at_end() {
        parser.statement(&mut obj)?;
    }

    obj.properties.keep_read_order();
    obj.prepare();
    debug!("parsed {kind} '{name}'");
    Ok(obj)
}

/// Parser state for one CI body.
struct BodyParser<'a> {
    cursor: Cursor<'a>,
    schema: &'static KindSchema,
}

impl BodyParser<'_> {
    fn statement(&mut self, obj: &mut CiObject) -> Result<()> {
        let offset = self.cursor.next_offset();
        let word = self.cursor.expect_word("keyword")?;

        match word.as_str() {
            "symbolicname" => {
                let alias = self.cursor.expect_text("symbolic name")?;
                obj.symbolic_names.insert(alias);
            }
            "property" => {
                let key = self.cursor.expect_text("property name")?;
                let value = if self.cursor.eat_word("value")? {
                    self.cursor.expect_text("property value")?
                } else {
                    String::new()
                };
                if obj.properties.insert(key.clone(), value).is_some() {
                    return Err(Error::parse(offset, format!("duplicate property '{key}'")));
                }
            }
            _ => self.kind_statement(obj, &word, offset)?,
        }
        Ok(())
    }

    fn kind_statement(&mut self, obj: &mut CiObject, word: &str, offset: usize) -> Result<()> {
        let (keyword, on) = match word.strip_prefix('!') {
            Some(rest) => (rest, false),
            None => (word, true),
        };

        if let Some(flag) = self.schema.flag(keyword) {
            return obj
                .set_flag(flag.name, on)
                .map_err(|e| Error::parse(offset, e));
        }
        if !on {
            return Err(Error::parse(offset, format!("unknown flag '{keyword}'")));
        }

        if let Some(list) = self.schema.list_by_keyword(word) {
            let record = self.record(list)?;
            return obj
                .push_record(list.name, record)
                .map_err(|e| Error::parse(offset, e));
        }

        let field = self
            .field_path(word)?
            .ok_or_else(|| Error::parse(offset, format!("unknown keyword '{word}'")))?;
        self.field_value(obj, field, offset)
    }

    /// Resolve a possibly multi-word keyword path starting with `first`.
    fn field_path(&mut self, first: &str) -> Result<Option<&'static FieldDef>> {
        let mut candidates: Vec<&'static FieldDef> =
            self.schema.fields_starting_with(first).collect();
        candidates.sort_by_key(|f| std::cmp::Reverse(f.keyword.len()));

        for field in candidates {
            let mut probe = self.cursor.clone();
            let mut matched = true;
            for word in &field.keyword[1..] {
                if !probe.eat_word(word)? {
                    matched = false;
                    break;
                }
            }
            if matched {
                self.cursor = probe;
                return Ok(Some(field));
            }
        }
        Ok(None)
    }

    fn field_value(&mut self, obj: &mut CiObject, field: &FieldDef, offset: usize) -> Result<()> {
        let what = field.keyword_text();
        let value_offset = self.cursor.next_offset();

        let result = match field.ty {
            FieldType::Integer => {
                let n = self.cursor.expect_number(&what)?;
                obj.set(field.name, Value::Int(n))
            }
            FieldType::NameList => {
                let name = self.cursor.expect_text(&what)?;
                obj.add_name(field.name, name).map(|_| ())
            }
            FieldType::Text | FieldType::Choice(_) | FieldType::Flag => {
                let raw = self.cursor.expect_text(&what)?;
                let value = field
                    .value_from_text(&raw)
                    .map_err(|e| Error::parse(value_offset, e))?;
                obj.set(field.name, value)
            }
        };
        result.map_err(|e| Error::parse(offset, e))
    }

    /// Read one record line: head columns, optional block, named columns.
    fn record(&mut self, list: &ChildDef) -> Result<Record> {
        let mut cells = list.blank_cells();

        for (i, column) in list.columns.iter().enumerate() {
            match column.role {
                ColumnRole::Head => {
                    if column.ty == ColumnType::OptText
                        && !matches!(self.cursor.peek()?, Some(Token::Str(_)))
                    {
                        continue;
                    }
                    cells[i] = self.cell(list, i)?;
                }
                ColumnRole::Block => {
                    if matches!(self.cursor.peek()?, Some(Token::Block { .. })) {
                        cells[i] = self.rights(column.name)?;
                    }
                }
                ColumnRole::Named => {}
            }
        }

        while let Some(word) = self.cursor.peek_word()? {
            if let Some((i, _)) = list.named_column(&word) {
                self.cursor.next_token()?;
                cells[i] = self.cell(list, i)?;
            } else if list.legacy.iter().any(|l| *l == word) {
                self.cursor.next_token()?;
                let offset = self.cursor.next_offset();
                self.cursor.expect_text(&word)?;
                warn!("ignoring legacy '{word}' in {} at offset {offset}", list.keyword);
            } else {
                break;
            }
        }

        Ok(Record::new(cells))
    }

    fn cell(&mut self, list: &ChildDef, index: usize) -> Result<Value> {
        let column = &list.columns[index];
        let offset = self.cursor.next_offset();
        let raw = match column.ty {
            ColumnType::Integer => return Ok(Value::Int(self.cursor.expect_number(column.name)?)),
            _ => self.cursor.expect_text(column.name)?,
        };
        column
            .value_from_text(&raw)
            .map_err(|e| Error::parse(offset, e))
    }

    fn rights(&mut self, what: &str) -> Result<Value> {
        let (content, offset) = self.cursor.expect_block(what)?;
        let mut inner = Cursor::with_offset(&content, offset);
        let mut names = std::collections::BTreeSet::new();
        while !inner.is_at_end() {
            names.insert(inner.expect_text(what)?);
        }
        Ok(Value::Names(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PROP_FILE_DATE;

    const UNIQUE_KEY: &str = r#"
uniquekey "UK_Part" {
  description "part \"name\" key"
  !hidden
  enable
  !global
  symbolicname "uniquekey_Part"
  for type "Part"
  field "name" size 20
  field "desc" size 10
  property "file date" value "2024-01-01 10:00:00"
}
"#;

    #[test]
    fn test_parse_unique_key() {
        let obj = parse_document(UNIQUE_KEY).unwrap();
        assert_eq!(obj.kind, Kind::UniqueKey);
        assert_eq!(obj.name, "UK_Part");
        assert_eq!(obj.description(), "part \"name\" key");
        assert!(obj.flag("enable"));
        assert!(!obj.flag("global"));
        assert!(!obj.flag("hidden"));
        assert_eq!(obj.text("forType"), "Part");
        assert_eq!(obj.text("forInterface"), "");
        assert!(obj.symbolic_names.contains("uniquekey_Part"));
        assert_eq!(
            obj.properties.get(PROP_FILE_DATE),
            Some("2024-01-01 10:00:00")
        );

        // sorted by composite key
        let fields = obj.records("fields");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].cells, vec![Value::Text("desc".into()), Value::Int(10)]);
        assert_eq!(fields[1].cells, vec![Value::Text("name".into()), Value::Int(20)]);
    }

    #[test]
    fn test_index_fields_keep_order() {
        let obj = parse_document(
            r#"index "IX" { enable field "name" size 20 field "desc" field "id" size 4 }"#,
        )
        .unwrap();
        let exprs: Vec<String> = obj
            .records("fields")
            .iter()
            .map(|r| r.cells[0].to_string())
            .collect();
        assert_eq!(exprs, ["name", "desc", "id"]);
        assert_eq!(obj.records("fields")[1].cells[1], Value::Int(0));
    }

    #[test]
    fn test_rule_access_records() {
        let obj = parse_document(
            r#"rule "R" {
                access user "Employee" {show read} key "emp" filter "current == Released"
                access owner {read modify}
                enforcereserveaccess
            }"#,
        )
        .unwrap();
        assert!(obj.flag("enforceReserveAccess"));
        let access = obj.records("access");
        assert_eq!(access.len(), 2);
        assert_eq!(access[0].cells[0], Value::Word("owner".into()));
        assert_eq!(access[0].cells[1], Value::Text(String::new()));
        assert_eq!(access[0].cells[2], Value::names(["modify", "read"]));
        assert_eq!(access[1].cells[1], Value::Text("Employee".into()));
        assert_eq!(access[1].cells[3], Value::Text("emp".into()));
        assert_eq!(access[1].cells[4], Value::Text("current == Released".into()));
    }

    #[test]
    fn test_package_name_lists_are_sets() {
        let a = parse_document(
            r#"package "P" { usespackage "B" usespackage "A" member type "Part" }"#,
        )
        .unwrap();
        let b = parse_document(
            r#"package "P" { member type "Part" usespackage "A" usespackage "B" }"#,
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get("usesPackage"), Some(&Value::names(["A", "B"])));
    }

    #[test]
    fn test_attribute_choice_and_integer() {
        let obj = parse_document(
            r#"attribute "A" { type string maxlength 40 range "=" "x" multiline }"#,
        )
        .unwrap();
        assert_eq!(obj.get("type"), Some(&Value::Word("string".into())));
        assert_eq!(obj.get("maxLength"), Some(&Value::Int(40)));
        assert!(obj.flag("multiline"));

        let err = parse_document(r#"attribute "A" { type blob }"#).unwrap_err();
        assert!(matches!(err, Error::Parse { offset: 21, .. }), "{err:?}");
    }

    #[test]
    fn test_flags_accept_both_forms() {
        let on = parse_document(r#"index "I" { unique hidden }"#).unwrap();
        let off = parse_document(r#"index "I" { !unique !hidden }"#).unwrap();
        assert!(on.flag("unique") && on.flag("hidden"));
        assert!(!off.flag("unique") && !off.flag("hidden"));
    }

    #[test]
    fn test_unknown_keyword_reports_offset() {
        let text = r#"package "P" { description "" bogus "x" }"#;
        match parse_document(text).unwrap_err() {
            Error::Parse { offset, message } => {
                assert_eq!(offset, text.find("bogus").unwrap());
                assert!(message.contains("bogus"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unknown_negated_flag() {
        let err = parse_document(r#"package "P" { !enable }"#).unwrap_err();
        assert!(err.to_string().contains("unknown flag 'enable'"));
    }

    #[test]
    fn test_legacy_word_in_record_is_ignored() {
        let obj =
            parse_document(r#"uniquekey "U" { field "name" order 1 size 20 }"#).unwrap();
        assert_eq!(
            obj.records("fields")[0].cells,
            vec![Value::Text("name".into()), Value::Int(20)]
        );

        // same word is not accepted where it is not allow-listed
        let err = parse_document(r#"index "I" { field "name" order 1 }"#).unwrap_err();
        assert!(err.to_string().contains("unknown keyword 'order'"));
    }

    #[test]
    fn test_duplicate_record_key_is_error() {
        let err =
            parse_document(r#"uniquekey "U" { field "a" size 1 field "a" size 2 }"#).unwrap_err();
        assert!(err.to_string().contains("duplicate field"));
    }

    #[test]
    fn test_duplicate_property_is_error() {
        let err = parse_document(r#"rule "R" { property "a" property "a" value "b" }"#)
            .unwrap_err();
        assert!(err.to_string().contains("duplicate property 'a'"));
    }

    #[test]
    fn test_multi_word_keyword() {
        let obj =
            parse_document(r#"uniquekey "U" { with interface "IF" for type "T" }"#).unwrap();
        assert_eq!(obj.text("forInterface"), "IF");
        assert_eq!(obj.text("forType"), "T");

        let err = parse_document(r#"uniquekey "U" { for "T" }"#).unwrap_err();
        assert!(err.to_string().contains("unknown keyword 'for'"));
    }

    #[test]
    fn test_one_ci_per_file() {
        let err = parse_document(r#"rule "A" { } rule "B" { }"#).unwrap_err();
        assert!(err.to_string().contains("only one CI"));
    }

    #[test]
    fn test_header_errors() {
        assert!(parse_document(r#"program "X" { }"#)
            .unwrap_err()
            .to_string()
            .contains("unknown CI kind 'program'"));
        assert!(parse_document(r#"rule "X" "#).is_err());
        assert_eq!(
            parse_header("# comment\nrule \"X\" {").unwrap(),
            (Kind::Rule, "X".to_string())
        );
    }

    #[test]
    fn test_comment_after_string_hides_braces() {
        let obj = parse_document("rule \"R\" {\n  description \"x\"# note { b\n}\n").unwrap();
        assert_eq!(obj.description(), "x");
    }

    #[test]
    fn test_unterminated_quote_in_body() {
        let text = "rule \"R\" { description \"oops }";
        match parse_document(text).unwrap_err() {
            Error::Parse { offset, .. } => assert_eq!(offset, text.find("\"oops").unwrap()),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_properties_keep_read_order() {
        let obj = parse_document(r#"rule "R" { property "z" property "a" value "1" }"#).unwrap();
        assert!(obj.properties.has_read_order());
        assert_eq!(obj.properties.written(), vec![("z", ""), ("a", "1")]);
    }
}
