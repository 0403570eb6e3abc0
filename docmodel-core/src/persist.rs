//! Entity-facing persistence methods.
//!
//! [`Persistable`] puts the [`Repository`](crate::gateway::Repository) operations on the entity
//! type itself, so that callers can write `Person::find_by(&gateway, ...)` and
//! `person.save(&gateway)`. It is implemented for every [`Entity`].
//!
//! ```ignore
//! use docmodel::prelude::*;
//!
//! let mut ann = Person::new("Ann", 30);
//! ann.save(&gateway).await?;
//!
//! let count = Person::count_by(&gateway, "byName", &[Bson::from("Ann")]).await?;
//! assert_eq!(count, 1);
//! ```

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};

use crate::{
    backend::StoreBackend,
    cursor::{AggregateCursor, FindCursor},
    entity::Entity,
    error::ModelResult,
    gateway::Gateway,
    query::{CountOptions, SortSpec},
};

#[async_trait]
pub trait Persistable: Entity + Sized {
    async fn count<B: StoreBackend>(gateway: &Gateway<B>) -> ModelResult<u64> {
        gateway.repository::<Self>().count().await
    }

    async fn count_by<B: StoreBackend>(
        gateway: &Gateway<B>,
        descriptor: &str,
        values: &[Bson],
    ) -> ModelResult<u64> {
        gateway
            .repository::<Self>()
            .count_by(descriptor, values)
            .await
    }

    async fn count_filter<B: StoreBackend, F: Into<Document> + Send>(
        gateway: &Gateway<B>,
        filter: F,
    ) -> ModelResult<u64> {
        gateway
            .repository::<Self>()
            .count_filter(filter)
            .await
    }

    async fn count_with<B: StoreBackend, F: Into<Document> + Send>(
        gateway: &Gateway<B>,
        filter: F,
        options: CountOptions,
    ) -> ModelResult<u64> {
        gateway
            .repository::<Self>()
            .count_with(filter, options)
            .await
    }

    fn find<B: StoreBackend>(
        gateway: &Gateway<B>,
        filter: impl Into<Document>,
        sort: Option<SortSpec>,
    ) -> FindCursor<'_, B, Self> {
        gateway.repository::<Self>().find(filter, sort)
    }

    fn find_by<'g, B: StoreBackend>(
        gateway: &'g Gateway<B>,
        descriptor: &str,
        values: &[Bson],
    ) -> ModelResult<FindCursor<'g, B, Self>> {
        gateway
            .repository::<Self>()
            .find_by(descriptor, values)
    }

    fn find_all<B: StoreBackend>(gateway: &Gateway<B>) -> FindCursor<'_, B, Self> {
        gateway.repository::<Self>().find_all()
    }

    fn aggregate<B: StoreBackend>(
        gateway: &Gateway<B>,
        pipeline: Vec<Document>,
    ) -> AggregateCursor<'_, B, Self> {
        gateway.repository::<Self>().aggregate(pipeline)
    }

    async fn delete_by<B: StoreBackend>(
        gateway: &Gateway<B>,
        descriptor: &str,
        values: &[Bson],
    ) -> ModelResult<u64> {
        gateway
            .repository::<Self>()
            .delete_by(descriptor, values)
            .await
    }

    async fn delete_all<B: StoreBackend>(gateway: &Gateway<B>) -> ModelResult<u64> {
        gateway.repository::<Self>().delete_all().await
    }

    async fn index<B: StoreBackend>(gateway: &Gateway<B>, order: &str) -> ModelResult<String> {
        gateway.repository::<Self>().index(order).await
    }

    async fn drop_index<B: StoreBackend>(gateway: &Gateway<B>, order: &str) -> ModelResult<()> {
        gateway.repository::<Self>().drop_index(order).await
    }

    async fn drop_indexes<B: StoreBackend>(gateway: &Gateway<B>) -> ModelResult<()> {
        gateway.repository::<Self>().drop_indexes().await
    }

    async fn list_index_names<B: StoreBackend>(gateway: &Gateway<B>) -> ModelResult<Vec<String>> {
        gateway
            .repository::<Self>()
            .list_index_names()
            .await
    }

    /// Inserts or fully replaces this entity; see [`Repository::save`](crate::gateway::Repository::save).
    async fn save<B: StoreBackend>(&mut self, gateway: &Gateway<B>) -> ModelResult<ObjectId> {
        gateway.repository::<Self>().save(self).await
    }

    /// Deletes this entity by identity; see [`Repository::delete`](crate::gateway::Repository::delete).
    async fn delete<B: StoreBackend>(&self, gateway: &Gateway<B>) -> ModelResult<u64> {
        gateway.repository::<Self>().delete(self).await
    }
}

impl<E: Entity> Persistable for E {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entity::tests::Person,
        descriptor::compile_sort,
        testing::{Call, RecordingBackend},
    };
    use bson::doc;

    #[tokio::test]
    async fn test_save_then_delete_through_entity() {
        let gateway = Gateway::new(RecordingBackend::new().with_deleted(1));
        let mut ann = Person::new("Ann", 30);

        let id = ann.save(&gateway).await.unwrap();
        assert_eq!(ann.id, Some(id));

        assert_eq!(ann.delete(&gateway).await.unwrap(), 1);
        assert_eq!(
            gateway.backend().last_call(),
            Some(Call::DeleteOne("person".to_string(), doc! { "_id": id }))
        );
    }

    #[tokio::test]
    async fn test_static_operations_use_entity_collection() {
        let gateway = Gateway::new(RecordingBackend::new().with_count(2));

        assert_eq!(Person::count(&gateway).await.unwrap(), 2);
        assert_eq!(Person::delete_all(&gateway).await.unwrap(), 2);
        let cursor = Person::find_by(&gateway, "byAge", &[Bson::from(30)]).unwrap();
        assert_eq!(cursor.collection(), "person");
        assert_eq!(cursor.query().filter, doc! { "age": 30 });
        assert_eq!(Person::list_index_names(&gateway).await.unwrap(), vec!["_id_"]);
    }

    #[tokio::test]
    async fn test_structured_filters_through_entity() {
        let gateway = Gateway::new(RecordingBackend::new().with_count(5));
        let filter = doc! { "age": { "$gte": 18 } };

        assert_eq!(Person::count_filter(&gateway, filter.clone()).await.unwrap(), 5);
        assert_eq!(
            Person::count_with(&gateway, filter.clone(), CountOptions::new().with_skip(1).with_limit(2))
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            gateway.backend().last_call(),
            Some(Call::Count(
                "person".to_string(),
                filter.clone(),
                CountOptions::new().with_skip(1).with_limit(2)
            ))
        );

        let sort = compile_sort("-age").unwrap();
        let cursor = Person::find(&gateway, filter.clone(), Some(sort.clone()));
        assert_eq!(cursor.collection(), "person");
        assert_eq!(cursor.query().filter, filter);
        assert_eq!(cursor.query().sort, Some(sort));
    }
}
