use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use libreria_http::error::AppError;
use libreria_telemetry::timed;
use mongodb::bson::{oid::ObjectId, Document};
use serde_json::{json, Map, Value};

use super::ingest::{self, IngestError};
use super::models::{
    bson_label, document_to_json, fields, AuthorTotal, AveragePrice, BookQuery, CategoryCatalog,
    Created, Loaded, Message, StockLevel, CHEAP_PRICE_LIMIT, NOT_FOUND_MESSAGE, TOP_AUTHORS_LIMIT,
};
use super::store::StoreError;
use super::BooksState;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

fn ingest_error(err: IngestError, collection: &str) -> AppError {
    let message = format!(
        "Error al cargar datos en la colección '{}': {}",
        collection, err
    );
    match err {
        IngestError::MissingColumn { column } => {
            AppError::validation(vec![json!({ "column": column })], message)
        }
        IngestError::InvalidPrice { row, value } => AppError::validation(
            vec![json!({ "row": row, "column": fields::PRICE, "value": value })],
            message,
        ),
        IngestError::Csv(_) => AppError::validation(Vec::new(), message),
        IngestError::Open { .. } | IngestError::Store { .. } => {
            AppError::Internal(anyhow::anyhow!(message))
        }
    }
}

fn parse_id(raw: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw)
        .map_err(|_| AppError::bad_request(format!("'{}' no es un identificador válido", raw)))
}

/// Convert a JSON request body into a document. `_id` is dropped since
/// identity is assigned by the store.
fn body_document(
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Document, AppError> {
    let Json(body) = body?;
    let mut document = mongodb::bson::to_document(&body)
        .map_err(|err| AppError::bad_request(format!("cuerpo no válido: {}", err)))?;
    document.remove(fields::ID);
    Ok(document)
}

/// GET /carga
pub(super) async fn load_books(State(state): State<BooksState>) -> Result<Json<Loaded>, AppError> {
    let inserted = timed(
        state.observer.as_ref(),
        "load_csv",
        ingest::load_file(state.store.as_ref(), &state.csv_path),
    )
    .await
    .map_err(|err| ingest_error(err, &state.collection))?;

    tracing::info!(inserted, path = %state.csv_path.display(), "csv loaded");

    Ok(Json(Loaded {
        message: format!(
            "Datos cargados en la colección '{}' con éxito.",
            state.collection
        ),
        inserted,
    }))
}

async fn run_listing(state: &BooksState, query: BookQuery) -> Result<Json<Vec<Value>>, AppError> {
    let books = timed(state.observer.as_ref(), query.label(), state.store.list(&query)).await?;
    Ok(Json(books.into_iter().map(document_to_json).collect()))
}

/// GET /libros
pub(super) async fn list_books(
    State(state): State<BooksState>,
) -> Result<Json<Vec<Value>>, AppError> {
    run_listing(&state, BookQuery::All).await
}

/// GET /libros/categoria/{categoria}
pub(super) async fn books_by_category(
    State(state): State<BooksState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    run_listing(&state, BookQuery::Category(category)).await
}

/// GET /libros/autor/{autor}
pub(super) async fn books_by_author(
    State(state): State<BooksState>,
    Path(author): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    run_listing(&state, BookQuery::Author(author)).await
}

/// GET /libros/calificacion
pub(super) async fn books_by_rating(
    State(state): State<BooksState>,
) -> Result<Json<Vec<Value>>, AppError> {
    run_listing(&state, BookQuery::ByRatingDesc).await
}

/// GET /libros/precio-inferior
pub(super) async fn cheap_books(
    State(state): State<BooksState>,
) -> Result<Json<Vec<Value>>, AppError> {
    run_listing(&state, BookQuery::PriceBelow(CHEAP_PRICE_LIMIT)).await
}

/// GET /libros/buscar/{clave}
pub(super) async fn search_books(
    State(state): State<BooksState>,
    Path(key): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    run_listing(&state, BookQuery::Keyword(key)).await
}

/// GET /autores
pub(super) async fn top_authors(
    State(state): State<BooksState>,
) -> Result<Json<Vec<AuthorTotal>>, AppError> {
    let authors = timed(
        state.observer.as_ref(),
        "top_authors",
        state.store.top_authors(TOP_AUTHORS_LIMIT),
    )
    .await?;
    Ok(Json(authors))
}

/// GET /libros/stock/{titulo}
pub(super) async fn stock_by_title(
    State(state): State<BooksState>,
    Path(title): Path<String>,
) -> Result<Json<StockLevel>, AppError> {
    let book = timed(
        state.observer.as_ref(),
        "stock_by_title",
        state.store.find_by_title(&title),
    )
    .await?
    .ok_or_else(|| AppError::not_found(NOT_FOUND_MESSAGE))?;

    let stock = book.get(fields::STOCK).cloned().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "book '{}' has no {} field",
            title,
            fields::STOCK
        ))
    })?;
    Ok(Json(StockLevel {
        stock: stock.into_relaxed_extjson(),
    }))
}

/// GET /libros/precio-promedio
pub(super) async fn average_price(
    State(state): State<BooksState>,
) -> Result<Json<AveragePrice>, AppError> {
    let mean = timed(
        state.observer.as_ref(),
        "average_price",
        state.store.average_price(),
    )
    .await?;
    Ok(Json(AveragePrice::from_mean(mean)))
}

/// GET /categorias
///
/// One distinct lookup, then one listing per category, in sequence.
pub(super) async fn categories(
    State(state): State<BooksState>,
) -> Result<Json<CategoryCatalog>, AppError> {
    let catalog = timed(state.observer.as_ref(), "categories", async {
        let mut catalog = CategoryCatalog::default();
        for category in state.store.categories().await? {
            let books = state.store.category_listing(&category).await?;
            // Distinct values may share a label ("1" and 1); merge them.
            catalog
                .categories
                .entry(bson_label(&category))
                .or_default()
                .extend(books.into_iter().map(document_to_json));
        }
        Ok::<_, StoreError>(catalog)
    })
    .await?;
    Ok(Json(catalog))
}

/// POST /libros
pub(super) async fn create_book(
    State(state): State<BooksState>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    let document = body_document(body)?;
    let id = timed(state.observer.as_ref(), "create_book", state.store.insert(document)).await?;

    Ok((
        StatusCode::CREATED,
        Json(Created {
            message: "Libro creado con éxito".to_string(),
            id: id.to_hex(),
        }),
    ))
}

/// GET /libros/{id}
pub(super) async fn get_book(
    State(state): State<BooksState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id)?;
    let book = timed(state.observer.as_ref(), "get_book", state.store.get(id))
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND_MESSAGE))?;
    Ok(Json(document_to_json(book)))
}

/// PUT /libros/{id}
pub(super) async fn update_book(
    State(state): State<BooksState>,
    Path(id): Path<String>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<Message>, AppError> {
    let id = parse_id(&id)?;
    let changes = body_document(body)?;
    if changes.is_empty() {
        return Err(AppError::bad_request("no hay campos para actualizar"));
    }

    let matched = timed(
        state.observer.as_ref(),
        "update_book",
        state.store.update(id, changes),
    )
    .await?;
    if !matched {
        return Err(AppError::not_found(NOT_FOUND_MESSAGE));
    }
    Ok(Json(Message::new("Libro actualizado con éxito")))
}

/// DELETE /libros/{id}
pub(super) async fn delete_book(
    State(state): State<BooksState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, AppError> {
    let id = parse_id(&id)?;
    let deleted = timed(state.observer.as_ref(), "delete_book", state.store.delete(id)).await?;
    if !deleted {
        return Err(AppError::not_found(NOT_FOUND_MESSAGE));
    }
    Ok(Json(Message::new("Libro eliminado con éxito")))
}
