//! Attachment (connection) state owned by the publisher.

use crate::filter::TableFilter;
use crate::session::{AttachmentInfo, ReplicatedSession, SessionSlot};
use crate::types::{AttachmentId, CharSetId, SequenceId};
use std::collections::HashMap;

/// Replication state of one database connection.
///
/// The replication session is created lazily by the first qualifying
/// change and disposed on detach or drop.
pub struct Attachment {
    id: AttachmentId,
    user_name: String,
    charset: CharSetId,
    system: bool,
    pub(crate) session: SessionSlot<dyn ReplicatedSession>,
    pub(crate) filter: Option<Box<dyn TableFilter>>,
    pub(crate) sequences: HashMap<SequenceId, String>,
}

impl Attachment {
    /// Creates a user attachment.
    pub fn new(id: AttachmentId, user_name: impl Into<String>) -> Self {
        Self {
            id,
            user_name: user_name.into(),
            charset: CharSetId::NONE,
            system: false,
            session: SessionSlot::empty(),
            filter: None,
            sequences: HashMap::new(),
        }
    }

    /// Sets the attachment character set.
    #[must_use]
    pub fn with_charset(mut self, charset: CharSetId) -> Self {
        self.charset = charset;
        self
    }

    /// Marks the attachment as an engine-internal one.
    #[must_use]
    pub fn system(mut self, value: bool) -> Self {
        self.system = value;
        self
    }

    /// Installs a table filter, replacing the one built at attach time.
    pub fn set_filter(&mut self, filter: Box<dyn TableFilter>) {
        self.filter = Some(filter);
    }

    /// Returns the attachment ID.
    #[must_use]
    pub fn id(&self) -> AttachmentId {
        self.id
    }

    /// Returns the user name.
    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Returns the character set.
    #[must_use]
    pub fn charset(&self) -> CharSetId {
        self.charset
    }

    /// Returns true for engine-internal attachments.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.system
    }

    /// Returns true if a replication session is active.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.is_active()
    }

    /// Returns true if a table filter is installed.
    #[must_use]
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Returns the cached name of a sequence.
    #[must_use]
    pub fn cached_sequence(&self, id: SequenceId) -> Option<&str> {
        self.sequences.get(&id).map(String::as_str)
    }

    /// Returns the details handed to a new replication session.
    #[must_use]
    pub fn info(&self) -> AttachmentInfo {
        AttachmentInfo {
            id: self.id,
            user_name: self.user_name.clone(),
            charset: self.charset,
        }
    }

    /// Returns true if `table_name` passes the table filter.
    ///
    /// With no filter installed every table passes.
    pub(crate) fn accepts_table(&self, table_name: &str) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |filter| filter.matches(table_name))
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("id", &self.id)
            .field("user_name", &self.user_name)
            .field("system", &self.system)
            .field("session", &self.session)
            .field("sequences", &self.sequences.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::TableMatcher;

    #[test]
    fn new_attachment() {
        let att = Attachment::new(AttachmentId::new(5), "ALICE").with_charset(CharSetId::UTF8);
        assert!(!att.is_system());
        assert!(!att.has_session());
        assert!(att.accepts_table("ANYTHING"));

        let info = att.info();
        assert_eq!(info.id, AttachmentId::new(5));
        assert_eq!(info.user_name, "ALICE");
        assert_eq!(info.charset, CharSetId::UTF8);
    }

    #[test]
    fn filter_applies() {
        let mut att = Attachment::new(AttachmentId::new(1), "BOB");
        att.set_filter(Box::new(TableMatcher::new("ORDERS", "").unwrap()));
        assert!(att.has_filter());
        assert!(att.accepts_table("orders"));
        assert!(!att.accepts_table("CUSTOMERS"));
    }
}
