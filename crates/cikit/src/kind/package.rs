//! Package: groups administrative objects and declares package dependencies.
//!
//! ```text
//! package "Core" {
//!   description "core data model"
//!   !hidden
//!   !custom
//!   symbolicname "package_Core"
//!   fileprefix "core_"
//!   usespackage "Base"
//!   member type "Part"
//! }
//! ```

use super::{
    ChildDef, Column, ColumnType, DESCRIPTION, FieldDef, HIDDEN, Kind, KindSchema, ListOrder,
    TRAILING_PROPERTIES,
};

pub(super) static SCHEMA: KindSchema = KindSchema {
    kind: Kind::Package,
    fields: &[
        DESCRIPTION,
        HIDDEN,
        FieldDef::flag("custom", &["custom"], false),
        FieldDef::text("filePrefix", &["fileprefix"]),
        FieldDef::names("usesPackage", &["usespackage"]),
    ],
    lists: &[ChildDef {
        name: "members",
        keyword: "member",
        columns: &[
            Column::head("kind", ColumnType::Word).key(),
            Column::head("name", ColumnType::Text).key(),
        ],
        order: ListOrder::Sorted,
        legacy: &[],
        live_correction: None,
    }],
    guard: None,
    trailing_properties: TRAILING_PROPERTIES,
};
