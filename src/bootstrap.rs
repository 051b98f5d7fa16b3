//! Entry points shared by the `libreria-app` and `libreria-cli` binaries.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use libreria_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules::{
    self,
    books::{self, BookStore, BooksState, InMemoryBookStore, MongoBookStore},
};

/// Backing store selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// The configured MongoDB collection.
    Mongo,
    /// Process memory; contents are lost on exit.
    InMemory,
}

/// Build the book store for `kind`.
pub async fn open_store(settings: &Settings, kind: StoreKind) -> anyhow::Result<Arc<dyn BookStore>> {
    match kind {
        StoreKind::Mongo => {
            let database = libreria_db::connect(&settings.database).await?;
            Ok(Arc::new(MongoBookStore::new(
                database,
                &settings.database.collection,
            )))
        }
        StoreKind::InMemory => {
            tracing::warn!("serving from an in-memory store; data is not persisted");
            Ok(Arc::new(InMemoryBookStore::new()))
        }
    }
}

/// Run the HTTP service until a shutdown signal arrives.
pub async fn serve(settings: &Settings, kind: StoreKind) -> anyhow::Result<()> {
    let store = open_store(settings, kind).await?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, BooksState::new(store, settings));

    let ctx = InitCtx { settings };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    let served = libreria_http::start_server(&registry, settings).await;

    registry.stop_modules().await?;
    served
}

/// Bulk load a CSV file into the configured collection, returning the number
/// of inserted rows. `csv_path` overrides `ingest.csv_path`.
pub async fn load(settings: &Settings, csv_path: Option<&Path>) -> anyhow::Result<usize> {
    let store = open_store(settings, StoreKind::Mongo).await?;
    let path = csv_path.unwrap_or(settings.ingest.csv_path.as_path());

    let inserted = books::ingest::load_file(store.as_ref(), path)
        .await
        .with_context(|| {
            format!(
                "failed to load {} into collection '{}'",
                path.display(),
                settings.database.collection
            )
        })?;

    tracing::info!(inserted, path = %path.display(), "csv loaded");
    Ok(inserted)
}

/// Check the configured datastore answers a ping.
pub async fn ping(settings: &Settings) -> anyhow::Result<()> {
    let store = open_store(settings, StoreKind::Mongo).await?;
    store
        .ping()
        .await
        .with_context(|| format!("failed to reach {}", settings.database.uri))?;
    Ok(())
}
