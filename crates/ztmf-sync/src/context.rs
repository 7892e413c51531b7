//! Per-invocation resources and dispatch.

use crate::cancel::guard;
use crate::cfacts::WarehouseView;
use crate::config::{Config, DatabaseConfig};
use crate::error::{Result, SyncError};
use crate::event::Invocation;
use crate::export::PgExtractor;
use crate::load::target::LoadTarget;
use crate::load::{PgTarget, RelationalLoader, WarehouseLoader};
use crate::storage::{ObjectStore, Storage};
use crate::sync::{CfactsFileSync, CfactsWarehouseSync, SyncResult, TableSync};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const RELATIONAL_STORE: &str = "relational store";
pub const WAREHOUSE_STORE: &str = "warehouse";

/// Opens a pool and checks one connection out of it.
///
/// Connection failures never carry the password from `config.url`.
pub async fn connect_pool(
    store: &'static str,
    config: &DatabaseConfig,
    cancel: &CancellationToken,
) -> Result<PgPool> {
    let options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout());

    let pool = guard(cancel, "connect", async {
        options.connect(&config.url).await.map_err(|e| SyncError::Connect {
            store,
            reason: scrub(&e.to_string(), &config.url),
        })
    })
    .await?;

    info!(store, max_connections = config.max_connections, "Connection pool created");
    Ok(pool)
}

/// Replaces the URL's password wherever it appears in `message`.
fn scrub(message: &str, url: &str) -> String {
    let password = url::Url::parse(url)
        .ok()
        .and_then(|u| u.password().map(str::to_string))
        .filter(|p| !p.is_empty());
    let Some(password) = password else {
        return message.to_string();
    };
    let mut scrubbed = message.replace(&password, "***");
    // Drivers may echo the password decoded rather than as written in the URL.
    if let Some(decoded) = urlencoding::decode(&password)
        .ok()
        .filter(|d| d.as_ref() != password.as_str())
    {
        scrubbed = scrubbed.replace(decoded.as_ref(), "***");
    }
    scrubbed
}

/// The pools and clients one invocation needs, opened once and shared by every
/// table in it.
pub struct SyncContext {
    relational: PgPool,
    warehouse: Option<PgPool>,
    storage: Option<Arc<dyn ObjectStore>>,
}

impl SyncContext {
    /// Connects only what `invocation` uses.
    pub async fn connect(config: &Config, invocation: &Invocation, cancel: &CancellationToken) -> Result<Self> {
        let warehouse_config = match invocation {
            Invocation::Tables(_) => Some(config.require_warehouse("table sync")?),
            Invocation::Warehouse(_) => Some(config.require_warehouse("the CFACTS warehouse sync")?),
            Invocation::File(_) => None,
        };

        let relational = connect_pool(RELATIONAL_STORE, &config.database, cancel).await?;

        let warehouse = match warehouse_config {
            Some(w) => match connect_pool(WAREHOUSE_STORE, &w.database, cancel).await {
                Ok(pool) => Some(pool),
                Err(e) => {
                    relational.close().await;
                    return Err(e);
                },
            },
            None => None,
        };

        let storage: Option<Arc<dyn ObjectStore>> = match invocation {
            Invocation::File(_) => match Storage::new(&config.storage).await {
                Ok(storage) => Some(Arc::new(storage)),
                Err(e) => {
                    relational.close().await;
                    return Err(SyncError::Storage(format!("{e:#}")));
                },
            },
            _ => None,
        };

        Ok(Self {
            relational,
            warehouse,
            storage,
        })
    }

    /// Builds every sync the open pools support.
    pub fn dispatcher(&self, config: &Config) -> Result<Dispatcher> {
        let settings = config.sync;
        let relational_target: Arc<dyn LoadTarget> =
            Arc::new(PgTarget::new(RELATIONAL_STORE, self.relational.clone()));
        let mut dispatcher = Dispatcher::default();

        if let Some(storage) = &self.storage {
            let loader = RelationalLoader::new(relational_target.clone(), settings.relational_batch_size);
            dispatcher = dispatcher.with_file(CfactsFileSync::new(Arc::clone(storage), loader));
        }

        if let Some(warehouse) = &self.warehouse {
            let warehouse_target = Arc::new(PgTarget::new(WAREHOUSE_STORE, warehouse.clone()));
            dispatcher = dispatcher.with_tables(TableSync::new(
                Arc::new(PgExtractor::new(self.relational.clone())),
                WarehouseLoader::new(warehouse_target, settings.warehouse_batch_size),
            ));

            let view_name = &config.require_warehouse("the CFACTS warehouse sync")?.cfacts_view;
            let view = WarehouseView::new(warehouse.clone(), view_name.as_str())?;
            let loader = RelationalLoader::new(relational_target, settings.relational_batch_size);
            dispatcher = dispatcher.with_warehouse(CfactsWarehouseSync::new(Arc::new(view), loader));
        }

        Ok(dispatcher)
    }

    /// Closes every pool. Call on success and failure alike.
    pub async fn close(self) {
        self.relational.close().await;
        if let Some(warehouse) = self.warehouse {
            warehouse.close().await;
        }
        debug!("Connection pools closed");
    }
}

/// Routes an [`Invocation`] to the sync that handles it.
#[derive(Default)]
pub struct Dispatcher {
    tables: Option<TableSync>,
    file: Option<CfactsFileSync>,
    warehouse: Option<CfactsWarehouseSync>,
}

impl Dispatcher {
    pub fn with_tables(mut self, sync: TableSync) -> Self {
        self.tables = Some(sync);
        self
    }

    pub fn with_file(mut self, sync: CfactsFileSync) -> Self {
        self.file = Some(sync);
        self
    }

    pub fn with_warehouse(mut self, sync: CfactsWarehouseSync) -> Self {
        self.warehouse = Some(sync);
        self
    }

    pub async fn dispatch(&self, invocation: &Invocation, cancel: &CancellationToken) -> Result<SyncResult> {
        let unavailable = |path: &str| SyncError::Config(format!("{path} sync is not configured"));
        match invocation {
            Invocation::Tables(request) => {
                self.tables.as_ref().ok_or_else(|| unavailable("table"))?.run(request, cancel).await
            },
            Invocation::File(request) => {
                self.file.as_ref().ok_or_else(|| unavailable("CFACTS file"))?.run(request, cancel).await
            },
            Invocation::Warehouse(request) => {
                self.warehouse
                    .as_ref()
                    .ok_or_else(|| unavailable("CFACTS warehouse"))?
                    .run(request, cancel)
                    .await
            },
        }
    }
}
