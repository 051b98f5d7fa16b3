use std::collections::BTreeMap;

use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// Stored field names of a book document.
pub mod fields {
    pub const ID: &str = "_id";
    pub const TITLE: &str = "Titulo";
    pub const AUTHOR: &str = "Autor";
    pub const DESCRIPTION: &str = "Descripcion";
    pub const PUBLICATION_DATE: &str = "FechaDePublicacion";
    pub const CATEGORY: &str = "Categoria";
    pub const RATING: &str = "Calificacion";
    pub const STOCK: &str = "Stock";
    pub const PRICE: &str = "Precio";

    /// Columns a bulk-load CSV must provide.
    pub const CSV_COLUMNS: [&str; 8] = [
        TITLE,
        AUTHOR,
        DESCRIPTION,
        PUBLICATION_DATE,
        CATEGORY,
        RATING,
        STOCK,
        PRICE,
    ];

    /// Fields listed per book by the categories view.
    pub const CATEGORY_LISTING: [&str; 7] = [
        TITLE,
        AUTHOR,
        DESCRIPTION,
        PUBLICATION_DATE,
        RATING,
        STOCK,
        PRICE,
    ];
}

/// Upper bound (exclusive) of the cheap-books listing.
pub const CHEAP_PRICE_LIMIT: f64 = 20.0;

/// Number of entries returned by the top authors aggregation.
pub const TOP_AUTHORS_LIMIT: i64 = 10;

/// Message returned by every lookup that misses.
pub const NOT_FOUND_MESSAGE: &str = "Libro no encontrado";

/// Canned listing queries over the collection.
#[derive(Debug, Clone, PartialEq)]
pub enum BookQuery {
    All,
    Category(String),
    Author(String),
    /// Every book, highest rating first.
    ByRatingDesc,
    PriceBelow(f64),
    /// Case-insensitive literal substring of title or description.
    Keyword(String),
}

impl BookQuery {
    /// Short name used when timing the query.
    pub fn label(&self) -> &'static str {
        match self {
            BookQuery::All => "list_books",
            BookQuery::Category(_) => "books_by_category",
            BookQuery::Author(_) => "books_by_author",
            BookQuery::ByRatingDesc => "books_by_rating",
            BookQuery::PriceBelow(_) => "books_below_price",
            BookQuery::Keyword(_) => "books_by_keyword",
        }
    }
}

/// One row of the top authors aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorTotal {
    #[serde(rename = "Autor")]
    pub author: Option<String>,
    #[serde(rename = "TotalPrecio")]
    pub total_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragePrice {
    #[serde(rename = "PrecioPromedio")]
    pub average_price: f64,
}

impl AveragePrice {
    /// Round the raw mean to two decimals; an empty collection averages 0.
    pub fn from_mean(mean: Option<f64>) -> Self {
        let average_price = mean.map(|m| (m * 100.0).round() / 100.0).unwrap_or(0.0);
        Self { average_price }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockLevel {
    #[serde(rename = "Stock")]
    pub stock: serde_json::Value,
}

/// Books grouped under each distinct category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryCatalog {
    #[serde(rename = "Categorias")]
    pub categories: BTreeMap<String, Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Created {
    pub message: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loaded {
    pub message: String,
    pub inserted: usize,
}

/// Render a stored document as plain JSON.
pub fn document_to_json(document: Document) -> serde_json::Value {
    Bson::Document(document).into_relaxed_extjson()
}

/// Numeric value of a BSON field, if it holds one.
pub fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

/// Display form of a category or author value that is not a plain string.
pub fn bson_label(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}
