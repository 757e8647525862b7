//! Sequence (generator) metadata.

use crate::types::SequenceId;
use std::collections::HashMap;

/// System sequence that is replicated like a user sequence.
pub const BACKUP_HISTORY: SequenceId = SequenceId(9);

/// Sequences owned by the engine itself.
pub const SYSTEM_SEQUENCES: &[(SequenceId, &str)] = &[
    (SequenceId(0), "RDB$GENERATORS"),
    (SequenceId(1), "RDB$SECURITY_CLASS"),
    (SequenceId(2), "SQL$DEFAULT"),
    (SequenceId(3), "RDB$PROCEDURES"),
    (SequenceId(4), "RDB$EXCEPTIONS"),
    (SequenceId(5), "RDB$CONSTRAINT_NAME"),
    (SequenceId(6), "RDB$FIELD_NAME"),
    (SequenceId(7), "RDB$INDEX_NAME"),
    (SequenceId(8), "RDB$TRIGGER_NAME"),
    (BACKUP_HISTORY, "RDB$BACKUP_HISTORY"),
    (SequenceId(10), "RDB$FUNCTIONS"),
    (SequenceId(11), "RDB$GENERATOR_NAME"),
];

/// Returns true for sequences owned by the engine.
#[must_use]
pub fn is_system(id: SequenceId) -> bool {
    SYSTEM_SEQUENCES.iter().any(|(system, _)| *system == id)
}

/// Returns true if changes of this sequence are replicated.
#[must_use]
pub fn is_replicable(id: SequenceId) -> bool {
    if id == SequenceId::SYSTEM {
        return false;
    }
    id == BACKUP_HISTORY || !is_system(id)
}

/// Metadata lookup consumed by the publisher.
pub trait MetadataCatalog: Send + Sync {
    /// Returns the external name of a sequence.
    fn sequence_name(&self, id: SequenceId) -> Option<String>;
}

/// Catalog backed by a fixed map; system sequences are always known.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    sequences: HashMap<SequenceId, String>,
}

impl StaticCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sequence name.
    #[must_use]
    pub fn with_sequence(mut self, id: SequenceId, name: impl Into<String>) -> Self {
        self.sequences.insert(id, name.into());
        self
    }
}

impl MetadataCatalog for StaticCatalog {
    fn sequence_name(&self, id: SequenceId) -> Option<String> {
        if let Some(name) = self.sequences.get(&id) {
            return Some(name.clone());
        }
        SYSTEM_SEQUENCES
            .iter()
            .find(|(system, _)| *system == id)
            .map(|(_, name)| (*name).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_sequences_are_not_replicable() {
        assert!(!is_replicable(SequenceId::SYSTEM));
        assert!(!is_replicable(SequenceId::new(1)));
        assert!(!is_replicable(SequenceId::new(11)));
    }

    #[test]
    fn backup_history_is_whitelisted() {
        assert!(is_system(BACKUP_HISTORY));
        assert!(is_replicable(BACKUP_HISTORY));
    }

    #[test]
    fn user_sequences_are_replicable() {
        assert!(is_replicable(SequenceId::new(12)));
        assert!(is_replicable(SequenceId::new(400)));
    }

    #[test]
    fn static_catalog_lookup() {
        let catalog = StaticCatalog::new().with_sequence(SequenceId::new(20), "GEN_ORDER_ID");
        assert_eq!(
            catalog.sequence_name(SequenceId::new(20)).as_deref(),
            Some("GEN_ORDER_ID")
        );
        assert_eq!(
            catalog.sequence_name(BACKUP_HISTORY).as_deref(),
            Some("RDB$BACKUP_HISTORY")
        );
        assert_eq!(catalog.sequence_name(SequenceId::new(21)), None);
    }
}
