//! Database wrapper combining a row store and the registered schema.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::catalog::{Catalog, RelationGraph, SchemaBundle};
use crate::config::{Backend, DatabaseConfig};
use crate::error::{ConfigError, Error};
use crate::executor::CrudExecutor;
use crate::storage::{MemoryStore, RowStore, SledStore};

const FINGERPRINT_META: &str = "schema_fingerprint";
const SCHEMA_META: &str = "schema";

/// An opened store plus, once registered, its catalog and relation graph.
///
/// The schema is registered exactly once, at startup, before any CRUD call.
pub struct Database {
    store: Arc<dyn RowStore>,
    verify_fingerprint: bool,
    executor: Mutex<Option<CrudExecutor>>,
}

impl Database {
    /// Open the backend described by `config`.
    pub fn open(config: DatabaseConfig) -> Result<Self, Error> {
        let store: Arc<dyn RowStore> = match config.backend {
            Backend::Sled => Arc::new(SledStore::open(&config.storage)?),
            Backend::Memory => {
                info!("opened in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self {
            store,
            verify_fingerprint: config.verify_schema_fingerprint,
            executor: Mutex::new(None),
        })
    }

    /// Wrap an already opened store.
    pub fn with_store(store: Arc<dyn RowStore>) -> Self {
        Self {
            store,
            verify_fingerprint: true,
            executor: Mutex::new(None),
        }
    }

    /// Register the schema and return the executor bound to it.
    ///
    /// Fails with `CatalogSealed` on a second call, and with a config error
    /// when the schema is invalid or differs from the one the store was
    /// created with.
    pub fn register(&self, schema: SchemaBundle) -> Result<CrudExecutor, Error> {
        let mut slot = self.executor.lock();
        if slot.is_some() {
            warn!("schema registration rejected: catalog already sealed");
            return Err(Error::CatalogSealed);
        }

        let catalog = Catalog::build(&schema.entities)?;
        let graph = RelationGraph::build(&catalog, &schema.relations)?;
        let fingerprint = schema.fingerprint()?;

        if let Some(stored) = self.store.load_meta(FINGERPRINT_META)? {
            let stored = String::from_utf8_lossy(&stored).into_owned();
            if stored != fingerprint {
                if self.verify_fingerprint {
                    return Err(ConfigError::FingerprintMismatch {
                        stored,
                        registered: fingerprint,
                    }
                    .into());
                }
                warn!(stored = %stored, registered = %fingerprint, "schema fingerprint changed");
            }
        }
        self.store.store_meta(FINGERPRINT_META, fingerprint.as_bytes())?;
        self.store.store_meta(SCHEMA_META, &schema.to_bytes()?)?;

        info!(
            entities = catalog.len(),
            relations = graph.relations().len(),
            fingerprint = %fingerprint,
            "registered schema"
        );

        let executor = CrudExecutor::new(self.store.clone(), Arc::new(catalog), Arc::new(graph));
        *slot = Some(executor.clone());
        Ok(executor)
    }

    /// The executor for the registered schema.
    pub fn executor(&self) -> Result<CrudExecutor, Error> {
        self.executor.lock().clone().ok_or(Error::CatalogNotRegistered)
    }

    /// The schema this store was last registered with, if any.
    pub fn stored_schema(&self) -> Result<Option<SchemaBundle>, Error> {
        self.store
            .load_meta(SCHEMA_META)?
            .map(|bytes| SchemaBundle::from_bytes(&bytes))
            .transpose()
    }

    /// Whether a schema has been registered.
    pub fn is_registered(&self) -> bool {
        self.executor.lock().is_some()
    }

    /// Get an Arc reference to the row store.
    pub fn store(&self) -> Arc<dyn RowStore> {
        self.store.clone()
    }

    /// Flush buffered writes to durable storage.
    pub fn flush(&self) -> Result<(), Error> {
        self.store.flush()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("registered", &self.is_registered())
            .field("verify_fingerprint", &self.verify_fingerprint)
            .finish()
    }
}
