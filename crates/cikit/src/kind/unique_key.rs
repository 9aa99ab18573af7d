//! Unique key: a set of field expressions that must be unique for a type
//! or interface.
//!
//! The type and interface the key applies to cannot change after creation.
//! Fields can only change while the key is disabled.
//!
//! Live readback reports each field size one larger than the size accepted
//! by update commands, the same quirk as for indexes; the readback is
//! corrected by `-1`.

use super::{
    ChildDef, Column, ColumnType, DESCRIPTION, FieldDef, HIDDEN, Kind, KindSchema, ListOrder,
    LiveCorrection, StructuralGuard, TRAILING_PROPERTIES,
};

pub(super) static SCHEMA: KindSchema = KindSchema {
    kind: Kind::UniqueKey,
    fields: &[
        DESCRIPTION,
        HIDDEN,
        FieldDef::flag("enable", &["enable"], true).commands("enable", "disable"),
        FieldDef::flag("global", &["global"], false).commands("global", "notglobal"),
        FieldDef::text("forType", &["for", "type"]).immutable(),
        FieldDef::text("forInterface", &["with", "interface"]).immutable(),
    ],
    lists: &[ChildDef {
        name: "fields",
        keyword: "field",
        columns: &[
            Column::head("expr", ColumnType::Text).key(),
            Column::named("size", ColumnType::Integer),
        ],
        order: ListOrder::Sorted,
        // older exports wrote a field ordinal that the platform derives itself
        legacy: &["order"],
        live_correction: Some(LiveCorrection {
            column: "size",
            delta: -1,
        }),
    }],
    guard: Some(StructuralGuard {
        flag: "enable",
        lists: &["fields"],
        fields: &[],
    }),
    trailing_properties: TRAILING_PROPERTIES,
};
