//! Database-level replication context.

use crate::config::ReplicationConfig;
use crate::log::{LogKind, ReplicationLog, TracingLog};
use crate::manager::ReplicationManager;
use crate::sequence::{MetadataCatalog, StaticCatalog};
use crate::session::PluginRegistry;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Replication state shared by every attachment of one database.
///
/// A database without a [`ReplicationConfig`] never replicates. The
/// replication manager is created on first use by a built-in session.
pub struct ReplicationDatabase {
    guid: Uuid,
    filename: String,
    config: Option<Arc<ReplicationConfig>>,
    publishing: AtomicBool,
    manager: Mutex<Option<Arc<ReplicationManager>>>,
    plugins: PluginRegistry,
    catalog: Arc<dyn MetadataCatalog>,
    log: Arc<dyn ReplicationLog>,
}

impl ReplicationDatabase {
    /// Creates an unconfigured database context for `filename`.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            guid: Uuid::new_v4(),
            filename: filename.into(),
            config: None,
            publishing: AtomicBool::new(true),
            manager: Mutex::new(None),
            plugins: PluginRegistry::new(),
            catalog: Arc::new(StaticCatalog::new()),
            log: Arc::new(TracingLog),
        }
    }

    /// Sets the replication configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReplicationConfig) -> Self {
        self.config = Some(Arc::new(config));
        self
    }

    /// Sets the database GUID.
    #[must_use]
    pub fn with_guid(mut self, guid: Uuid) -> Self {
        self.guid = guid;
        self
    }

    /// Sets the installed replicator plugins.
    #[must_use]
    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    /// Sets the metadata catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn MetadataCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Sets the replication log sink.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn ReplicationLog>) -> Self {
        self.log = log;
        self
    }

    /// Returns the database GUID.
    #[must_use]
    pub fn guid(&self) -> Uuid {
        self.guid
    }

    /// Returns the database file name.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Returns the replication configuration, if any.
    #[must_use]
    pub fn config(&self) -> Option<&ReplicationConfig> {
        self.config.as_deref()
    }

    /// Returns true if changes of this database are published.
    #[must_use]
    pub fn is_replicating(&self) -> bool {
        self.config.is_some() && self.publishing.load(Ordering::Acquire)
    }

    /// Switches publishing on or off at runtime.
    pub fn set_publishing(&self, value: bool) {
        self.publishing.store(value, Ordering::Release);
        tracing::debug!(database = %self.filename, publishing = value, "publishing switched");
    }

    /// Returns the installed plugins.
    #[must_use]
    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Returns the metadata catalog.
    #[must_use]
    pub fn catalog(&self) -> &dyn MetadataCatalog {
        self.catalog.as_ref()
    }

    /// Returns the replication manager if one was created.
    #[must_use]
    pub fn replication_manager(&self) -> Option<Arc<ReplicationManager>> {
        self.manager.lock().clone()
    }

    /// Returns the replication manager, creating it on first use.
    pub fn ensure_replication_manager(&self) -> Arc<ReplicationManager> {
        let mut manager = self.manager.lock();
        let manager = manager.get_or_insert_with(|| {
            tracing::info!(database = %self.filename, guid = %self.guid, "replication manager started");
            Arc::new(ReplicationManager::new())
        });
        Arc::clone(manager)
    }

    /// Shuts the replication manager down, if one was created.
    pub fn shutdown(&self) {
        if let Some(manager) = self.manager.lock().take() {
            manager.shutdown();
        }
    }

    /// Writes a message to the replication log.
    pub fn log(&self, kind: LogKind, message: &str) {
        self.log.log(&self.filename, kind, message);
    }
}

impl std::fmt::Debug for ReplicationDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationDatabase")
            .field("guid", &self.guid)
            .field("filename", &self.filename)
            .field("config", &self.config)
            .field("publishing", &self.publishing.load(Ordering::Relaxed))
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}
