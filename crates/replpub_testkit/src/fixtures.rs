//! Test fixtures: relations, records and a ready-to-capture environment.

use crate::log::MemoryLog;
use crate::recorder::Recorder;
use replpub_core::record::{DataType, FieldDesc, Format, Record, Value};
use replpub_core::{
    Attachment, AttachmentId, CaptureContext, CharSetId, FormatVersion, MetadataCatalog,
    PluginRegistry, Relation, RelationId, ReplicationConfig, ReplicationDatabase, SequenceId,
    StaticCatalog, Transaction, TransactionNumber, WorkerState,
};
use std::sync::Arc;

/// Name the recording replicator is registered under.
pub const PLUGIN_NAME: &str = "recorder";

/// Database file name used by [`TestEnv`].
pub const DATABASE_FILE: &str = "test.fdb";

/// User sequence known to the fixture catalog.
pub const ORDER_SEQUENCE: SequenceId = SequenceId(20);

/// Version 1 of the CUSTOMERS format: ID INTEGER, NAME VARCHAR(20).
pub fn customers_v1_format() -> Arc<Format> {
    Arc::new(Format::new(
        FormatVersion::new(1),
        vec![
            FieldDesc::new(DataType::Integer),
            FieldDesc::new(DataType::VarChar(20)).with_charset(CharSetId::UTF8),
        ],
    ))
}

/// Version 2 of the CUSTOMERS format: v1 plus EMAIL VARCHAR(40).
pub fn customers_v2_format() -> Arc<Format> {
    Arc::new(Format::new(
        FormatVersion::new(2),
        vec![
            FieldDesc::new(DataType::Integer),
            FieldDesc::new(DataType::VarChar(20)).with_charset(CharSetId::UTF8),
            FieldDesc::new(DataType::VarChar(40)).with_charset(CharSetId::UTF8),
        ],
    ))
}

/// The CUSTOMERS relation at format version 1.
pub fn customers() -> Relation {
    Relation::new(RelationId::new(128), "CUSTOMERS", customers_v1_format())
        .with_field_names(["ID", "NAME"])
}

/// The CUSTOMERS relation after EMAIL was added.
pub fn customers_v2() -> Relation {
    Relation::new(RelationId::new(128), "CUSTOMERS", customers_v2_format())
        .with_field_names(["ID", "NAME", "EMAIL"])
}

/// A system relation with a single INTEGER field.
pub fn system_relation() -> Relation {
    let format = Arc::new(Format::new(
        FormatVersion::new(1),
        vec![FieldDesc::new(DataType::Integer)],
    ));
    Relation::new(RelationId::new(6), "RDB$RELATIONS", format)
        .with_field_names(["RDB$RELATION_ID"])
        .system(true)
}

/// A CUSTOMERS row in `format` (first two fields set).
pub fn customer(format: &Arc<Format>, id: i64, name: &str) -> Record {
    let mut record = Record::new(Arc::clone(format));
    record.set(0, &Value::int(id)).expect("id fits");
    record.set(1, &Value::text(name)).expect("name fits");
    record
}

/// Database, attachment and worker wired to a [`Recorder`].
pub struct TestEnv {
    /// Database context.
    pub database: ReplicationDatabase,
    /// The single attachment.
    pub attachment: Attachment,
    /// Worker state of the calling thread.
    pub worker: WorkerState,
    /// Journal of the recording replicator.
    pub recorder: Recorder,
    /// Replication log.
    pub log: Arc<MemoryLog>,
}

impl TestEnv {
    /// Creates an environment replicating through the recording plugin.
    pub fn new(config: ReplicationConfig) -> Self {
        let recorder = Recorder::new();
        let plugins = PluginRegistry::new().with_plugin(PLUGIN_NAME, recorder.factory());
        Self::build(Some(config.plugin_name(PLUGIN_NAME)), plugins, recorder)
    }

    /// Creates an environment with the recording plugin and default policy.
    pub fn recording() -> Self {
        Self::new(ReplicationConfig::default())
    }

    /// Creates an environment using the built-in replicator.
    pub fn builtin(config: ReplicationConfig) -> Self {
        Self::build(
            Some(config.plugin_name("")),
            PluginRegistry::new(),
            Recorder::new(),
        )
    }

    /// Creates an environment with no replication configuration.
    pub fn unconfigured() -> Self {
        Self::build(None, PluginRegistry::new(), Recorder::new())
    }

    /// Creates an environment whose configuration names an uninstalled
    /// plugin.
    pub fn missing_plugin(name: &str) -> Self {
        Self::build(
            Some(ReplicationConfig::new().plugin_name(name)),
            PluginRegistry::new(),
            Recorder::new(),
        )
    }

    fn build(
        config: Option<ReplicationConfig>,
        plugins: PluginRegistry,
        recorder: Recorder,
    ) -> Self {
        let log = Arc::new(MemoryLog::new());
        let catalog = StaticCatalog::new().with_sequence(ORDER_SEQUENCE, "GEN_ORDER_ID");

        let mut database = ReplicationDatabase::new(DATABASE_FILE)
            .with_plugins(plugins)
            .with_catalog(Arc::new(catalog))
            .with_log(log.clone());
        if let Some(config) = config {
            database = database.with_config(config);
        }

        Self {
            database,
            attachment: Attachment::new(AttachmentId::new(1), "SYSDBA")
                .with_charset(CharSetId::UTF8),
            worker: WorkerState::new(),
            recorder,
            log,
        }
    }

    /// Replaces the metadata catalog.
    pub fn with_catalog(self, catalog: Arc<dyn MetadataCatalog>) -> Self {
        Self {
            database: self.database.with_catalog(catalog),
            ..self
        }
    }

    /// Returns a capture context over this environment.
    pub fn ctx(&mut self) -> CaptureContext<'_> {
        CaptureContext::new(&self.database, &mut self.attachment, &self.worker)
    }

    /// Creates a replicating user transaction of the attachment.
    pub fn transaction(&self, number: u64) -> Transaction {
        Transaction::new(TransactionNumber::new(number), self.attachment.id())
    }
}
