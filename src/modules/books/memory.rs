use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use regex::RegexBuilder;
use tokio::sync::RwLock;

use super::models::{as_number, bson_label, fields, AuthorTotal, BookQuery};
use super::store::{BookStore, StoreError};

/// [`BookStore`] held in process memory, in insertion order.
///
/// Evaluates the same queries as the MongoDB store. Used by tests and by
/// the in-memory serve mode.
#[derive(Default)]
pub struct InMemoryBookStore {
    books: RwLock<Vec<(ObjectId, Document)>>,
}

impl InMemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.books.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.books.read().await.is_empty()
    }
}

/// Rank of a BSON type in the datastore's cross-type sort order.
fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) => 0,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => 1,
        Some(Bson::String(_)) => 2,
        Some(_) => 3,
    }
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let by_type = type_rank(a).cmp(&type_rank(b));
    if by_type != Ordering::Equal {
        return by_type;
    }
    match (a, b) {
        (Some(Bson::String(x)), Some(Bson::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => match (as_number(x), as_number(y)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}

fn string_field<'a>(book: &'a Document, field: &str) -> Option<&'a str> {
    book.get_str(field).ok()
}

fn price(book: &Document) -> Option<f64> {
    book.get(fields::PRICE).and_then(as_number)
}

fn matches(query: &BookQuery, book: &Document, keyword: Option<&regex::Regex>) -> bool {
    match query {
        BookQuery::All | BookQuery::ByRatingDesc => true,
        BookQuery::Category(category) => {
            string_field(book, fields::CATEGORY) == Some(category.as_str())
        }
        BookQuery::Author(author) => string_field(book, fields::AUTHOR) == Some(author.as_str()),
        BookQuery::PriceBelow(limit) => price(book).is_some_and(|p| p < *limit),
        BookQuery::Keyword(_) => keyword.is_some_and(|re| {
            [fields::TITLE, fields::DESCRIPTION]
                .iter()
                .filter_map(|field| string_field(book, field))
                .any(|text| re.is_match(text))
        }),
    }
}

fn keyword_regex(query: &BookQuery) -> Result<Option<regex::Regex>, StoreError> {
    match query {
        BookQuery::Keyword(key) => RegexBuilder::new(&regex::escape(key))
            .case_insensitive(true)
            .build()
            .map(Some)
            .map_err(|err| StoreError::Shape(err.to_string())),
        _ => Ok(None),
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert(&self, mut document: Document) -> Result<ObjectId, StoreError> {
        let id = ObjectId::new();
        document.remove(fields::ID);
        self.books.write().await.push((id, document));
        Ok(id)
    }

    async fn list(&self, query: &BookQuery) -> Result<Vec<Document>, StoreError> {
        let keyword = keyword_regex(query)?;
        let books = self.books.read().await;
        let mut found: Vec<Document> = books
            .iter()
            .map(|(_, book)| book)
            .filter(|book| matches(query, book, keyword.as_ref()))
            .cloned()
            .collect();

        if *query == BookQuery::ByRatingDesc {
            found.sort_by(|a, b| compare_values(b.get(fields::RATING), a.get(fields::RATING)));
        }
        Ok(found)
    }

    async fn top_authors(&self, limit: i64) -> Result<Vec<AuthorTotal>, StoreError> {
        let books = self.books.read().await;
        let mut totals: BTreeMap<Option<String>, f64> = BTreeMap::new();
        for (_, book) in books.iter() {
            let author = match book.get(fields::AUTHOR) {
                None | Some(Bson::Null) => None,
                Some(value) => Some(bson_label(value)),
            };
            *totals.entry(author).or_insert(0.0) += price(book).unwrap_or(0.0);
        }

        // BTreeMap iteration is author-ascending; the stable sort keeps it for ties.
        let mut rows: Vec<AuthorTotal> = totals
            .into_iter()
            .map(|(author, total_price)| AuthorTotal {
                author,
                total_price,
            })
            .collect();
        rows.sort_by(|a, b| b.total_price.total_cmp(&a.total_price));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn average_price(&self) -> Result<Option<f64>, StoreError> {
        let books = self.books.read().await;
        let prices: Vec<f64> = books.iter().filter_map(|(_, book)| price(book)).collect();
        if prices.is_empty() {
            return Ok(None);
        }
        Ok(Some(prices.iter().sum::<f64>() / prices.len() as f64))
    }

    async fn categories(&self) -> Result<Vec<Bson>, StoreError> {
        let books = self.books.read().await;
        let mut categories: Vec<Bson> = Vec::new();
        for (_, book) in books.iter() {
            if let Some(category) = book.get(fields::CATEGORY) {
                if !categories.contains(category) {
                    categories.push(category.clone());
                }
            }
        }
        categories.sort_by_key(bson_label);
        Ok(categories)
    }

    async fn category_listing(&self, category: &Bson) -> Result<Vec<Document>, StoreError> {
        let books = self.books.read().await;
        let listing = books
            .iter()
            .filter(|(_, book)| book.get(fields::CATEGORY) == Some(category))
            .map(|(_, book)| {
                let mut entry = Document::new();
                for field in fields::CATEGORY_LISTING {
                    if let Some(value) = book.get(field) {
                        entry.insert(field, value.clone());
                    }
                }
                entry
            })
            .collect();
        Ok(listing)
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Document>, StoreError> {
        let books = self.books.read().await;
        Ok(books
            .iter()
            .find(|(_, book)| string_field(book, fields::TITLE) == Some(title))
            .map(|(_, book)| book.clone()))
    }

    async fn get(&self, id: ObjectId) -> Result<Option<Document>, StoreError> {
        let books = self.books.read().await;
        Ok(books
            .iter()
            .find(|(book_id, _)| *book_id == id)
            .map(|(_, book)| book.clone()))
    }

    async fn update(&self, id: ObjectId, fields: Document) -> Result<bool, StoreError> {
        let mut books = self.books.write().await;
        let Some((_, book)) = books.iter_mut().find(|(book_id, _)| *book_id == id) else {
            return Ok(false);
        };
        for (key, value) in fields {
            book.insert(key, value);
        }
        Ok(true)
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, StoreError> {
        let mut books = self.books.write().await;
        let before = books.len();
        books.retain(|(book_id, _)| *book_id != id);
        Ok(books.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn book(title: &str, author: &str, category: &str, rating: &str, price: f64) -> Document {
        doc! {
            "Titulo": title,
            "Autor": author,
            "Descripcion": format!("Descripción de {}", title),
            "FechaDePublicacion": "2001-01-01",
            "Categoria": category,
            "Calificacion": rating,
            "Stock": "4",
            "Precio": price
        }
    }

    async fn seeded() -> InMemoryBookStore {
        let store = InMemoryBookStore::new();
        store
            .insert(book("Ficciones", "Borges", "Cuento", "4.8", 18.0))
            .await
            .unwrap();
        store
            .insert(book("Rayuela", "Cortázar", "Novela", "4.5", 25.0))
            .await
            .unwrap();
        store
            .insert(book("El Aleph", "Borges", "Cuento", "4.9", 12.0))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn category_filter_is_exact() {
        let store = seeded().await;
        let cuentos = store
            .list(&BookQuery::Category("Cuento".to_string()))
            .await
            .unwrap();
        assert_eq!(cuentos.len(), 2);
        assert!(cuentos
            .iter()
            .all(|b| b.get_str("Categoria").unwrap() == "Cuento"));

        let none = store
            .list(&BookQuery::Category("cuento".to_string()))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn rating_sort_is_descending() {
        let store = seeded().await;
        let books = store.list(&BookQuery::ByRatingDesc).await.unwrap();
        let titles: Vec<&str> = books.iter().map(|b| b.get_str("Titulo").unwrap()).collect();
        assert_eq!(titles, vec!["El Aleph", "Ficciones", "Rayuela"]);
    }

    #[tokio::test]
    async fn missing_rating_sorts_last() {
        let store = seeded().await;
        store
            .insert(doc! { "Titulo": "Sin nota", "Precio": 1.0 })
            .await
            .unwrap();
        let books = store.list(&BookQuery::ByRatingDesc).await.unwrap();
        assert_eq!(books.last().unwrap().get_str("Titulo").unwrap(), "Sin nota");
    }

    #[tokio::test]
    async fn keyword_matches_title_or_description_ignoring_case() {
        let store = seeded().await;
        let found = store
            .list(&BookQuery::Keyword("ALEPH".to_string()))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let by_description = store
            .list(&BookQuery::Keyword("descripción de ray".to_string()))
            .await
            .unwrap();
        assert_eq!(by_description.len(), 1);

        let literal = store
            .list(&BookQuery::Keyword(".*".to_string()))
            .await
            .unwrap();
        assert!(literal.is_empty());
    }

    #[tokio::test]
    async fn top_authors_sum_prices() {
        let store = seeded().await;
        let rows = store.top_authors(10).await.unwrap();
        assert_eq!(
            rows,
            vec![
                AuthorTotal {
                    author: Some("Borges".to_string()),
                    total_price: 30.0
                },
                AuthorTotal {
                    author: Some("Cortázar".to_string()),
                    total_price: 25.0
                },
            ]
        );
        assert_eq!(store.top_authors(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn top_author_ties_keep_name_order() {
        let store = InMemoryBookStore::new();
        for author in ["Vallejo", "Onetti", "Allende"] {
            store
                .insert(book("Libro", author, "Ensayo", "3.0", 10.0))
                .await
                .unwrap();
        }
        let authors: Vec<Option<String>> = store
            .top_authors(10)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.author)
            .collect();
        assert_eq!(
            authors,
            vec![
                Some("Allende".to_string()),
                Some("Onetti".to_string()),
                Some("Vallejo".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = seeded().await;
        let id = store
            .insert(book("Pedro Páramo", "Rulfo", "Novela", "4.7", 14.0))
            .await
            .unwrap();

        assert!(store.update(id, doc! { "Stock": 5 }).await.unwrap());
        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.get_i32("Stock").unwrap(), 5);
        assert_eq!(stored.get_str("Autor").unwrap(), "Rulfo");

        assert!(!store.update(ObjectId::new(), doc! { "Stock": 1 }).await.unwrap());
    }

    #[tokio::test]
    async fn delete_reports_removal() {
        let store = seeded().await;
        let id = store.insert(doc! { "Titulo": "Efímero" }).await.unwrap();
        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn category_listing_projects_fields() {
        let store = seeded().await;
        assert_eq!(
            store.categories().await.unwrap(),
            vec![Bson::String("Cuento".into()), Bson::String("Novela".into())]
        );
        let listing = store
            .category_listing(&Bson::String("Novela".into()))
            .await
            .unwrap();
        assert_eq!(listing.len(), 1);
        assert!(!listing[0].contains_key("Categoria"));
        assert_eq!(listing[0].len(), 7);
    }
}
