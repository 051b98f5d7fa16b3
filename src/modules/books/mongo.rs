use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    Collection, Database,
};

use super::models::{as_number, bson_label, fields, AuthorTotal, BookQuery};
use super::store::{BookStore, StoreError};

/// [`BookStore`] over a MongoDB collection. Every operation is a single
/// driver call or aggregation pipeline.
#[derive(Clone)]
pub struct MongoBookStore {
    database: Database,
    collection: Collection<Document>,
}

impl MongoBookStore {
    pub fn new(database: Database, collection: &str) -> Self {
        let collection = database.collection::<Document>(collection);
        Self {
            database,
            collection,
        }
    }
}

fn field_eq(field: &str, value: impl Into<Bson>) -> Document {
    let mut filter = Document::new();
    filter.insert(field, value);
    filter
}

fn field_ref(field: &str) -> String {
    format!("${}", field)
}

fn without_id() -> Document {
    doc! { "_id": 0 }
}

fn category_listing_projection() -> Document {
    let mut projection = without_id();
    for field in fields::CATEGORY_LISTING {
        projection.insert(field, 1);
    }
    projection
}

/// Filter and optional sort for a canned listing.
fn listing_parts(query: &BookQuery) -> (Document, Option<Document>) {
    match query {
        BookQuery::All => (Document::new(), None),
        BookQuery::Category(category) => (field_eq(fields::CATEGORY, category.as_str()), None),
        BookQuery::Author(author) => (field_eq(fields::AUTHOR, author.as_str()), None),
        BookQuery::ByRatingDesc => (Document::new(), Some(field_eq(fields::RATING, -1))),
        BookQuery::PriceBelow(limit) => (field_eq(fields::PRICE, doc! { "$lt": *limit }), None),
        BookQuery::Keyword(key) => {
            let pattern = doc! { "$regex": regex::escape(key), "$options": "i" };
            let filter = doc! {
                "$or": [
                    field_eq(fields::TITLE, pattern.clone()),
                    field_eq(fields::DESCRIPTION, pattern)
                ]
            };
            (filter, None)
        }
    }
}

fn top_authors_pipeline(limit: i64) -> Vec<Document> {
    vec![
        doc! {
            "$group": {
                "_id": field_ref(fields::AUTHOR),
                "TotalPrecio": { "$sum": field_ref(fields::PRICE) }
            }
        },
        doc! { "$sort": { "TotalPrecio": -1, "_id": 1 } },
        doc! { "$limit": limit },
    ]
}

fn average_price_pipeline() -> Vec<Document> {
    vec![doc! {
        "$group": {
            "_id": Bson::Null,
            "PrecioPromedio": { "$avg": field_ref(fields::PRICE) }
        }
    }]
}

fn author_total(row: &Document) -> Result<AuthorTotal, StoreError> {
    let author = match row.get("_id") {
        None | Some(Bson::Null) => None,
        Some(value) => Some(bson_label(value)),
    };
    let total_price = row
        .get("TotalPrecio")
        .and_then(as_number)
        .ok_or_else(|| StoreError::Shape(format!("non-numeric TotalPrecio in {}", row)))?;
    Ok(AuthorTotal {
        author,
        total_price,
    })
}

#[async_trait]
impl BookStore for MongoBookStore {
    async fn ping(&self) -> Result<(), StoreError> {
        libreria_db::ping(&self.database).await?;
        Ok(())
    }

    async fn insert(&self, document: Document) -> Result<ObjectId, StoreError> {
        let result = self.collection.insert_one(document).await?;
        result.inserted_id.as_object_id().ok_or_else(|| {
            StoreError::Shape(format!(
                "inserted id {} is not an ObjectId",
                result.inserted_id
            ))
        })
    }

    async fn list(&self, query: &BookQuery) -> Result<Vec<Document>, StoreError> {
        let (filter, sort) = listing_parts(query);
        let mut find = self.collection.find(filter).projection(without_id());
        if let Some(sort) = sort {
            find = find.sort(sort);
        }
        let books = find.await?.try_collect().await?;
        Ok(books)
    }

    async fn top_authors(&self, limit: i64) -> Result<Vec<AuthorTotal>, StoreError> {
        let rows: Vec<Document> = self
            .collection
            .aggregate(top_authors_pipeline(limit))
            .await?
            .try_collect()
            .await?;
        rows.iter().map(author_total).collect()
    }

    async fn average_price(&self) -> Result<Option<f64>, StoreError> {
        let rows: Vec<Document> = self
            .collection
            .aggregate(average_price_pipeline())
            .await?
            .try_collect()
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("PrecioPromedio"))
            .and_then(as_number))
    }

    async fn categories(&self) -> Result<Vec<Bson>, StoreError> {
        let mut categories = self
            .collection
            .distinct(fields::CATEGORY, Document::new())
            .await?;
        categories.sort_by_key(bson_label);
        Ok(categories)
    }

    async fn category_listing(&self, category: &Bson) -> Result<Vec<Document>, StoreError> {
        let books = self
            .collection
            .find(field_eq(fields::CATEGORY, category.clone()))
            .projection(category_listing_projection())
            .await?
            .try_collect()
            .await?;
        Ok(books)
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Document>, StoreError> {
        let book = self
            .collection
            .find_one(field_eq(fields::TITLE, title))
            .projection(without_id())
            .await?;
        Ok(book)
    }

    async fn get(&self, id: ObjectId) -> Result<Option<Document>, StoreError> {
        let book = self
            .collection
            .find_one(doc! { "_id": id })
            .projection(without_id())
            .await?;
        Ok(book)
    }

    async fn update(&self, id: ObjectId, fields: Document) -> Result<bool, StoreError> {
        let result = self
            .collection
            .update_one(doc! { "_id": id }, doc! { "$set": fields })
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, StoreError> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_filter_is_escaped_and_case_insensitive() {
        let (filter, sort) = listing_parts(&BookQuery::Keyword("c++ (2e)".to_string()));
        assert!(sort.is_none());

        let branches = filter.get_array("$or").unwrap();
        assert_eq!(branches.len(), 2);
        let title = branches[0].as_document().unwrap().get_document("Titulo").unwrap();
        assert_eq!(title.get_str("$regex").unwrap(), r"c\+\+ \(2e\)");
        assert_eq!(title.get_str("$options").unwrap(), "i");
        assert!(branches[1]
            .as_document()
            .unwrap()
            .contains_key("Descripcion"));
    }

    #[test]
    fn rating_listing_sorts_descending() {
        let (filter, sort) = listing_parts(&BookQuery::ByRatingDesc);
        assert!(filter.is_empty());
        assert_eq!(sort.unwrap(), doc! { "Calificacion": -1 });
    }

    #[test]
    fn cheap_listing_filters_on_price() {
        let (filter, _) = listing_parts(&BookQuery::PriceBelow(20.0));
        assert_eq!(filter, doc! { "Precio": { "$lt": 20.0 } });
    }

    #[test]
    fn top_authors_pipeline_groups_sorts_and_limits() {
        let pipeline = top_authors_pipeline(10);
        assert_eq!(
            pipeline[0],
            doc! { "$group": { "_id": "$Autor", "TotalPrecio": { "$sum": "$Precio" } } }
        );
        assert_eq!(pipeline[1], doc! { "$sort": { "TotalPrecio": -1, "_id": 1 } });
        assert_eq!(pipeline[2], doc! { "$limit": 10_i64 });
    }

    #[test]
    fn category_projection_drops_id_and_category() {
        let projection = category_listing_projection();
        assert_eq!(projection.get_i32("_id").unwrap(), 0);
        assert!(!projection.contains_key("Categoria"));
        assert_eq!(projection.len(), 8);
    }

    #[test]
    fn author_total_reads_group_key() {
        let row = doc! { "_id": "Borges", "TotalPrecio": 30.5 };
        let total = author_total(&row).unwrap();
        assert_eq!(total.author.as_deref(), Some("Borges"));
        assert_eq!(total.total_price, 30.5);

        let missing = doc! { "_id": Bson::Null, "TotalPrecio": 0 };
        assert_eq!(author_total(&missing).unwrap().author, None);
    }
}
