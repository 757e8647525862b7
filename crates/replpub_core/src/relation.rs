//! Relation (table) metadata seen by the publisher.

use crate::record::Format;
use crate::types::RelationId;
use std::sync::Arc;

/// Flags describing a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelationFlags(u8);

impl RelationFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// System (catalog) relation.
    pub const SYSTEM: Self = Self(0x01);
    /// Temporary relation; never replicated.
    pub const TEMPORARY: Self = Self(0x02);
    /// Relation is individually enabled for replication.
    pub const REPLICATING: Self = Self(0x04);

    /// Returns true if all bits of `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the flags with `other` set or cleared.
    #[must_use]
    pub const fn with(self, other: Self, value: bool) -> Self {
        if value {
            Self(self.0 | other.0)
        } else {
            Self(self.0 & !other.0)
        }
    }
}

/// A table as seen by the publisher.
///
/// The engine keeps this in sync with its metadata cache: the current format
/// and field names change on `ALTER TABLE`.
#[derive(Debug, Clone)]
pub struct Relation {
    id: RelationId,
    name: String,
    flags: RelationFlags,
    format: Arc<Format>,
    field_names: Vec<Option<String>>,
}

impl Relation {
    /// Creates a user relation that is enabled for replication.
    #[must_use]
    pub fn new(id: RelationId, name: impl Into<String>, format: Arc<Format>) -> Self {
        Self {
            id,
            name: name.into(),
            flags: RelationFlags::REPLICATING,
            format,
            field_names: Vec::new(),
        }
    }

    /// Sets the field names, by field position.
    #[must_use]
    pub fn with_field_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_names = names.into_iter().map(|n| Some(n.into())).collect();
        self
    }

    /// Marks the relation as a system relation.
    #[must_use]
    pub fn system(mut self, value: bool) -> Self {
        self.flags = self.flags.with(RelationFlags::SYSTEM, value);
        self
    }

    /// Marks the relation as temporary.
    #[must_use]
    pub fn temporary(mut self, value: bool) -> Self {
        self.flags = self.flags.with(RelationFlags::TEMPORARY, value);
        self
    }

    /// Enables or disables replication of this relation.
    #[must_use]
    pub fn replicating(mut self, value: bool) -> Self {
        self.flags = self.flags.with(RelationFlags::REPLICATING, value);
        self
    }

    /// Installs a new current format with its field names.
    pub fn alter(&mut self, format: Arc<Format>, field_names: Vec<Option<String>>) {
        self.format = format;
        self.field_names = field_names;
    }

    /// Returns the relation ID.
    #[must_use]
    pub const fn id(&self) -> RelationId {
        self.id
    }

    /// Returns the relation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the flags.
    #[must_use]
    pub const fn flags(&self) -> RelationFlags {
        self.flags
    }

    /// Returns true for system relations.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        self.flags.contains(RelationFlags::SYSTEM)
    }

    /// Returns true for temporary relations.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        self.flags.contains(RelationFlags::TEMPORARY)
    }

    /// Returns true if the relation is enabled for replication.
    #[must_use]
    pub const fn is_replicating(&self) -> bool {
        self.flags.contains(RelationFlags::REPLICATING)
    }

    /// Returns the current format.
    #[must_use]
    pub fn format(&self) -> &Arc<Format> {
        &self.format
    }

    /// Returns the name of the field at `index`.
    #[must_use]
    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.field_names.get(index)?.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DataType, FieldDesc};
    use crate::types::FormatVersion;

    fn format(version: u16) -> Arc<Format> {
        Arc::new(Format::new(
            FormatVersion::new(version),
            vec![FieldDesc::new(DataType::Integer)],
        ))
    }

    #[test]
    fn flags() {
        let rel = Relation::new(RelationId::new(1), "RDB$PAGES", format(1))
            .system(true)
            .replicating(false);
        assert!(rel.is_system());
        assert!(!rel.is_replicating());
        assert!(!rel.is_temporary());
    }

    #[test]
    fn alter_replaces_format_and_names() {
        let mut rel =
            Relation::new(RelationId::new(200), "T1", format(1)).with_field_names(["ID"]);
        assert_eq!(rel.field_name(0), Some("ID"));

        rel.alter(format(2), vec![Some("PK".into()), None]);
        assert_eq!(rel.format().version(), FormatVersion::new(2));
        assert_eq!(rel.field_name(0), Some("PK"));
        assert_eq!(rel.field_name(1), None);
        assert_eq!(rel.field_name(5), None);
    }
}
