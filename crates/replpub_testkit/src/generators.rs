//! Property-based test generators using proptest.

use proptest::prelude::*;
use replpub_core::record::DataType;

/// Strategy for savepoint stack depths.
pub fn savepoint_depth_strategy() -> impl Strategy<Value = usize> {
    0usize..12
}

/// Strategy for engine-style table names (upper-case identifiers).
pub fn table_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][A-Z0-9_]{0,30}").expect("Invalid regex")
}

/// Strategy for field types able to hold any `i16`.
pub fn integer_holder_strategy() -> impl Strategy<Value = DataType> {
    prop_oneof![
        Just(DataType::SmallInt),
        Just(DataType::Integer),
        Just(DataType::BigInt),
        Just(DataType::VarChar(16)),
        Just(DataType::Char(8)),
    ]
}

/// Strategy for one field of an upgrade case: its type and value
/// (`None` = null).
pub fn field_case_strategy() -> impl Strategy<Value = (DataType, Option<i16>)> {
    (integer_holder_strategy(), prop::option::of(any::<i16>()))
}

/// Strategy for a record layout with values plus a number of fields added
/// by the next format version.
pub fn upgrade_case_strategy() -> impl Strategy<Value = (Vec<(DataType, Option<i16>)>, usize)> {
    (prop::collection::vec(field_case_strategy(), 1..10), 0usize..4)
}

/// Strategy for SQL statement text.
pub fn sql_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("(CREATE|ALTER|DROP) TABLE [A-Z]{1,12}( \\(ID INT\\))?")
        .expect("Invalid regex")
}
