//! Index: an ordered list of field expressions.
//!
//! Field order is significant on the platform. Fields and the unique flag
//! can only change while the index is disabled.
//!
//! Live readback reports each field size one larger than the size accepted
//! by update commands; the readback is corrected by `-1`. This mirrors an
//! observed platform quirk and should be re-checked against new platform
//! releases.

use super::{
    ChildDef, Column, ColumnType, DESCRIPTION, FieldDef, HIDDEN, Kind, KindSchema, ListOrder,
    LiveCorrection, StructuralGuard, TRAILING_PROPERTIES,
};

pub(super) static SCHEMA: KindSchema = KindSchema {
    kind: Kind::Index,
    fields: &[
        DESCRIPTION,
        HIDDEN,
        FieldDef::flag("enable", &["enable"], true).commands("enable", "disable"),
        FieldDef::flag("unique", &["unique"], false).commands("unique", "notunique"),
    ],
    lists: &[ChildDef {
        name: "fields",
        keyword: "field",
        columns: &[
            Column::head("expr", ColumnType::Text).key(),
            Column::named("size", ColumnType::Integer),
        ],
        order: ListOrder::Positional,
        legacy: &[],
        live_correction: Some(LiveCorrection {
            column: "size",
            delta: -1,
        }),
    }],
    guard: Some(StructuralGuard {
        flag: "enable",
        lists: &["fields"],
        fields: &["unique"],
    }),
    trailing_properties: TRAILING_PROPERTIES,
};
