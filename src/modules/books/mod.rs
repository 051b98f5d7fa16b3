//! Book catalogue: bulk CSV load, canned queries and CRUD over one collection.

pub mod ingest;
pub mod memory;
pub mod models;
pub mod mongo;
mod routes;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::{routing::get, Router};
use libreria_kernel::{settings::Settings, InitCtx, Module};
use libreria_telemetry::{QueryObserver, TracingObserver};

pub use memory::InMemoryBookStore;
pub use mongo::MongoBookStore;
pub use store::{BookStore, StoreError};

/// Dependencies shared by every books handler.
#[derive(Clone)]
pub struct BooksState {
    pub store: Arc<dyn BookStore>,
    pub observer: Arc<dyn QueryObserver>,
    /// CSV file read by `GET /carga`.
    pub csv_path: Arc<PathBuf>,
    /// Collection name reported back to clients.
    pub collection: Arc<str>,
}

impl BooksState {
    /// State wired from settings, timing queries through `tracing`.
    pub fn new(store: Arc<dyn BookStore>, settings: &Settings) -> Self {
        Self {
            store,
            observer: Arc::new(TracingObserver),
            csv_path: Arc::new(settings.ingest.csv_path.clone()),
            collection: Arc::from(settings.database.collection.as_str()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn QueryObserver>) -> Self {
        self.observer = observer;
        self
    }
}

pub struct BooksModule {
    state: BooksState,
}

impl BooksModule {
    pub fn new(state: BooksState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.state
            .store
            .ping()
            .await
            .context("book store is unreachable")?;

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            collection = %self.state.collection,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        router(self.state.clone())
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Every books route, with `state` attached.
pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/carga", get(routes::load_books))
        .route(
            "/libros",
            get(routes::list_books).post(routes::create_book),
        )
        .route("/libros/categoria/{categoria}", get(routes::books_by_category))
        .route("/libros/autor/{autor}", get(routes::books_by_author))
        .route("/libros/calificacion", get(routes::books_by_rating))
        .route("/libros/precio-inferior", get(routes::cheap_books))
        .route("/libros/buscar/{clave}", get(routes::search_books))
        .route("/libros/stock/{titulo}", get(routes::stock_by_title))
        .route("/libros/precio-promedio", get(routes::average_price))
        .route(
            "/libros/{id}",
            get(routes::get_book)
                .put(routes::update_book)
                .delete(routes::delete_book),
        )
        .route("/autores", get(routes::top_authors))
        .route("/categorias", get(routes::categories))
        .with_state(state)
}

/// Create a new instance of the books module
pub fn create_module(state: BooksState) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(state))
}
