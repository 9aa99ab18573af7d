//! Command emitter for the administrative protocol.
//!
//! Translates an operation list into one command batch, one command per
//! operation, in the order given. Every interpolated string goes through
//! [`token::quote`](crate::token::quote).

use crate::delta::Operation;
use crate::error::Result;
use crate::kind::{FieldDef, Kind, KindSchema};
use crate::token::quote;
use crate::transport::Transport;
use crate::writer::{cell_value, field_value, key_clause, record_line};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Text wrapped around every rendered batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitOptions {
    /// Emitted before the first command (e.g. a transaction start)
    pub prefix: String,
    /// Emitted after the last command
    pub suffix: String,
}

/// Commands for one CI, ready to be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandBatch {
    /// One command per line, each terminated by `;`
    pub commands: Vec<String>,
    /// Wrapper text from [`EmitOptions`]
    #[serde(skip)]
    options: EmitOptions,
}

impl CommandBatch {
    /// Whether there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Render the batch with its prefix and suffix.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.options.prefix.is_empty() {
            out.push_str(&self.options.prefix);
            out.push('\n');
        }
        for command in &self.commands {
            out.push_str(command);
            out.push('\n');
        }
        if !self.options.suffix.is_empty() {
            out.push_str(&self.options.suffix);
            out.push('\n');
        }
        out
    }
}

/// Build the command batch for one CI.
///
/// A CI that does not exist yet is created first; leading operations that
/// set immutable fields become part of the `add` command, since those
/// fields cannot be modified afterwards.
pub fn emit(
    kind: Kind,
    name: &str,
    exists: bool,
    ops: &[Operation],
    options: &EmitOptions,
) -> CommandBatch {
    let schema = kind.schema();
    let target = format!("{kind} {}", quote(name));
    let mut commands = Vec::with_capacity(ops.len() + 1);
    let mut rest = ops;

    if !exists {
        let folded = ops
            .iter()
            .take_while(|op| immutable_field(schema, op).is_some())
            .count();
        let mut add = format!("add {target}");
        for op in &ops[..folded] {
            add.push(' ');
            add.push_str(&clause(schema, op));
        }
        add.push(';');
        commands.push(add);
        rest = &ops[folded..];
    }

    commands.extend(
        rest.iter()
            .map(|op| format!("modify {target} {};", clause(schema, op))),
    );

    debug!("{kind} '{name}': emitted {} command(s)", commands.len());
    CommandBatch {
        commands,
        options: options.clone(),
    }
}

fn immutable_field(schema: &KindSchema, op: &Operation) -> Option<&'static FieldDef> {
    match op {
        Operation::SetScalar { field, .. } => schema.field(field).filter(|f| f.immutable),
        _ => None,
    }
}

/// Protocol clause for one operation.
fn clause(schema: &KindSchema, op: &Operation) -> String {
    match op {
        Operation::SetScalar { field, value } => match schema.field(field) {
            Some(def) => format!("{} {}", def.keyword_text(), field_value(def, value)),
            None => format!("{field} {}", quote(&value.to_string())),
        },
        Operation::SetFlag { field, value } => {
            let def = schema.field(field);
            match def.and_then(|d| d.commands) {
                Some((on, off)) => (if *value { on } else { off }).to_string(),
                None => {
                    let keyword = def.map_or_else(|| (*field).to_string(), FieldDef::keyword_text);
                    if *value { keyword } else { format!("!{keyword}") }
                }
            }
        }
        Operation::AddSymbolicName { name } => format!("add symbolicname {}", quote(name)),
        Operation::RemoveSymbolicName { name } => format!("remove symbolicname {}", quote(name)),
        Operation::AddListItem { field, name } => {
            format!("add {} {}", list_keyword(schema, field), quote(name))
        }
        Operation::RemoveListItem { field, name } => {
            format!("remove {} {}", list_keyword(schema, field), quote(name))
        }
        Operation::AddChild { list, record } => match schema.list(list) {
            Some(def) => format!("add {}", record_line(def, record)),
            None => format!("add {list}"),
        },
        Operation::RemoveChild { list, key } => match schema.list(list) {
            Some(def) => format!("remove {}", key_clause(def, key)),
            None => format!("remove {list} {key}"),
        },
        Operation::ModifyChild { list, key, changes } => match schema.list(list) {
            Some(def) => {
                let mut out = format!("modify {}", key_clause(def, key));
                for (column, value) in changes {
                    if let Some((_, col)) = def.column(column) {
                        out.push(' ');
                        out.push_str(col.name);
                        out.push(' ');
                        out.push_str(&cell_value(col, value));
                    }
                }
                out
            }
            None => format!("modify {list} {key}"),
        },
        Operation::SetProperty { key, value } => {
            if value.is_empty() {
                format!("property {}", quote(key))
            } else {
                format!("property {} value {}", quote(key), quote(value))
            }
        }
        Operation::RemoveProperty { key } => format!("remove property {}", quote(key)),
    }
}

fn list_keyword(schema: &KindSchema, field: &str) -> String {
    schema
        .field(field)
        .map_or_else(|| field.to_string(), FieldDef::keyword_text)
}

/// Send a batch through the transport.
///
/// Empty batches are not sent. A failure is returned as the transport
/// reported it, with the rendered batch attached.
pub fn send(transport: &dyn Transport, batch: &CommandBatch) -> Result<String> {
    if batch.is_empty() {
        return Ok(String::new());
    }
    let rendered = batch.render();
    info!("sending {} command(s) via {}", batch.len(), transport.name());
    transport.execute(&rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{Record, RecordKey, Value};
    use crate::transport::mock::MockTransport;

    fn key(expr: &str) -> RecordKey {
        RecordKey(vec![Value::Text(expr.into())])
    }

    #[test]
    fn test_unique_key_bracket_commands() {
        let ops = [
            Operation::SetFlag { field: "enable", value: false },
            Operation::RemoveChild { list: "fields", key: key("desc") },
            Operation::SetFlag { field: "enable", value: true },
        ];
        let batch = emit(Kind::UniqueKey, "UK", true, &ops, &EmitOptions::default());
        assert_eq!(
            batch.commands,
            [
                r#"modify uniquekey "UK" disable;"#,
                r#"modify uniquekey "UK" remove field "desc";"#,
                r#"modify uniquekey "UK" enable;"#,
            ]
        );
    }

    #[test]
    fn test_create_folds_immutable_fields_into_add() {
        let ops = [
            Operation::SetScalar {
                field: "forType",
                value: Value::Text("Part".into()),
            },
            Operation::SetScalar {
                field: "description",
                value: Value::Text("d".into()),
            },
            Operation::AddChild {
                list: "fields",
                record: Record::new(vec![Value::Text("name".into()), Value::Int(20)]),
            },
        ];
        let batch = emit(Kind::UniqueKey, "UK", false, &ops, &EmitOptions::default());
        assert_eq!(
            batch.commands,
            [
                r#"add uniquekey "UK" for type "Part";"#,
                r#"modify uniquekey "UK" description "d";"#,
                r#"modify uniquekey "UK" add field "name" size 20;"#,
            ]
        );
    }

    #[test]
    fn test_create_without_operations() {
        let batch = emit(Kind::Rule, "R", false, &[], &EmitOptions::default());
        assert_eq!(batch.commands, [r#"add rule "R";"#]);
    }

    #[test]
    fn test_escaping_and_clause_forms() {
        let ops = [
            Operation::SetScalar {
                field: "description",
                value: Value::Text("a \"b\" {c} $d [e]".into()),
            },
            Operation::SetFlag { field: "multiline", value: false },
            Operation::SetFlag { field: "hidden", value: true },
            Operation::SetScalar {
                field: "type",
                value: Value::Word("string".into()),
            },
            Operation::AddSymbolicName { name: "attr_A".into() },
            Operation::RemoveProperty { key: "x y".into() },
            Operation::SetProperty {
                key: "k".into(),
                value: "v".into(),
            },
        ];
        let batch = emit(Kind::Attribute, "A", true, &ops, &EmitOptions::default());
        assert_eq!(
            batch.commands,
            [
                r#"modify attribute "A" description "a \"b\" \{c\} \$d \[e\]";"#,
                r#"modify attribute "A" !multiline;"#,
                r#"modify attribute "A" hidden;"#,
                r#"modify attribute "A" type string;"#,
                r#"modify attribute "A" add symbolicname "attr_A";"#,
                r#"modify attribute "A" remove property "x y";"#,
                r#"modify attribute "A" property "k" value "v";"#,
            ]
        );
    }

    #[test]
    fn test_list_items_and_child_modification() {
        let ops = [
            Operation::AddListItem {
                field: "usesPackage",
                name: "P1".into(),
            },
            Operation::RemoveListItem {
                field: "usesPackage",
                name: "P0".into(),
            },
        ];
        let batch = emit(Kind::Package, "P", true, &ops, &EmitOptions::default());
        assert_eq!(
            batch.commands,
            [
                r#"modify package "P" add usespackage "P1";"#,
                r#"modify package "P" remove usespackage "P0";"#,
            ]
        );

        let ops = [Operation::ModifyChild {
            list: "access",
            key: RecordKey(vec![
                Value::Word("user".into()),
                Value::Text("E".into()),
                Value::Text(String::new()),
            ]),
            changes: vec![("rights", Value::names(["read", "show"]))],
        }];
        let batch = emit(Kind::Rule, "R", true, &ops, &EmitOptions::default());
        assert_eq!(
            batch.commands,
            [r#"modify rule "R" modify access user "E" rights {read show};"#]
        );
    }

    #[test]
    fn test_render_wraps_prefix_and_suffix() {
        let options = EmitOptions {
            prefix: "start transaction;".into(),
            suffix: "commit transaction;".into(),
        };
        let batch = emit(Kind::Rule, "R", false, &[], &options);
        assert_eq!(
            batch.render(),
            "start transaction;\nadd rule \"R\";\ncommit transaction;\n"
        );

        let plain = emit(Kind::Rule, "R", false, &[], &EmitOptions::default());
        assert_eq!(plain.render(), "add rule \"R\";\n");
    }

    #[test]
    fn test_send_skips_empty_batch() {
        let mock = MockTransport::new();
        let batch = emit(Kind::Rule, "R", true, &[], &EmitOptions::default());
        assert!(batch.is_empty());
        send(&mock, &batch).unwrap();
        assert!(mock.batches().is_empty());
    }

    #[test]
    fn test_send_surfaces_failure_with_batch() {
        let mock = MockTransport::new();
        mock.fail_next("Error: #1900068: modify uniquekey failed");
        let ops = [Operation::SetFlag { field: "enable", value: false }];
        let batch = emit(Kind::UniqueKey, "UK", true, &ops, &EmitOptions::default());

        match send(&mock, &batch).unwrap_err() {
            Error::Transport { message, batch } => {
                assert_eq!(message, "Error: #1900068: modify uniquekey failed");
                assert_eq!(batch, "modify uniquekey \"UK\" disable;\n");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
