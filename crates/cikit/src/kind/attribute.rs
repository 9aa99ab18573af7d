//! Attribute: a typed value definition with optional range constraints.
//!
//! The attribute type is fixed at creation time.

use super::{
    ChildDef, Column, ColumnType, DESCRIPTION, FieldDef, HIDDEN, Kind, KindSchema, ListOrder,
    TRAILING_PROPERTIES,
};

const TYPES: &[&str] = &["binary", "boolean", "date", "integer", "real", "string"];

pub(super) static SCHEMA: KindSchema = KindSchema {
    kind: Kind::Attribute,
    fields: &[
        DESCRIPTION,
        HIDDEN,
        FieldDef::flag("multiline", &["multiline"], false),
        FieldDef::flag("resetOnClone", &["resetonclone"], false),
        FieldDef::flag("resetOnRevision", &["resetonrevision"], false),
        FieldDef::choice("type", &["type"], TYPES).immutable(),
        FieldDef::text("default", &["default"]),
        FieldDef::integer("maxLength", &["maxlength"], 0),
    ],
    lists: &[ChildDef {
        name: "ranges",
        keyword: "range",
        columns: &[
            Column::head("op", ColumnType::Word).key(),
            Column::head("value", ColumnType::Text).key(),
        ],
        order: ListOrder::Sorted,
        legacy: &[],
        live_correction: None,
    }],
    guard: None,
    trailing_properties: TRAILING_PROPERTIES,
};
