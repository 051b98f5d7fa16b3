use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use thiserror::Error;

use super::models::{AuthorTotal, BookQuery};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("datastore error: {0}")]
    Datastore(#[from] mongodb::error::Error),

    #[error("unexpected document shape: {0}")]
    Shape(String),
}

/// Access to the book collection.
///
/// Returned documents never carry `_id`; identity only leaves the store as
/// the value returned by [`BookStore::insert`].
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Check the backing datastore is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Insert `document` under a freshly assigned identifier.
    async fn insert(&self, document: Document) -> Result<ObjectId, StoreError>;

    async fn list(&self, query: &BookQuery) -> Result<Vec<Document>, StoreError>;

    /// Authors ordered by the summed price of their books, descending; ties
    /// by author ascending.
    async fn top_authors(&self, limit: i64) -> Result<Vec<AuthorTotal>, StoreError>;

    /// Mean of every numeric price, `None` when there is none.
    async fn average_price(&self) -> Result<Option<f64>, StoreError>;

    /// Distinct category values, ascending.
    async fn categories(&self) -> Result<Vec<Bson>, StoreError>;

    /// Books in `category` reduced to the category listing fields.
    async fn category_listing(&self, category: &Bson) -> Result<Vec<Document>, StoreError>;

    async fn find_by_title(&self, title: &str) -> Result<Option<Document>, StoreError>;

    async fn get(&self, id: ObjectId) -> Result<Option<Document>, StoreError>;

    /// Set each field of `fields` on the matching document. Returns whether a
    /// document matched.
    async fn update(&self, id: ObjectId, fields: Document) -> Result<bool, StoreError>;

    /// Returns whether a document was removed.
    async fn delete(&self, id: ObjectId) -> Result<bool, StoreError>;
}
