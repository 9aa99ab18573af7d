//! Rule: a named set of access grants.
//!
//! ```text
//! rule "Confidential" {
//!   description ""
//!   !hidden
//!   enforcereserveaccess
//!   access owner {modify read}
//!   access user "Employee" {read show} key "emp" filter "current == Released"
//! }
//! ```

use super::{
    ChildDef, Column, ColumnType, DESCRIPTION, FieldDef, HIDDEN, Kind, KindSchema, ListOrder,
    TRAILING_PROPERTIES,
};

pub(super) static SCHEMA: KindSchema = KindSchema {
    kind: Kind::Rule,
    fields: &[
        DESCRIPTION,
        HIDDEN,
        FieldDef::flag("enforceReserveAccess", &["enforcereserveaccess"], false),
    ],
    lists: &[ChildDef {
        name: "access",
        keyword: "access",
        columns: &[
            Column::head("kind", ColumnType::Word).key(),
            Column::head("user", ColumnType::OptText).key(),
            Column::block("rights"),
            Column::named("key", ColumnType::Text).key(),
            Column::named("filter", ColumnType::Text),
        ],
        order: ListOrder::Sorted,
        legacy: &[],
        live_correction: None,
    }],
    guard: None,
    trailing_properties: TRAILING_PROPERTIES,
};
