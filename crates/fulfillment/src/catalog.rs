//! Staff-only catalog maintenance.

use common::{CategoryId, Identity, ProductId};
use domain::{Category, CategoryUpdate, NewCategory, NewProduct, Product, ProductUpdate};
use store::{ProductFilter, Store, StoreTx};

use crate::error::{FulfillmentError, Result};
use crate::hooks::{Mutation, PostCommitHooks};
use crate::ensure_staff;

/// Creates, edits and retires categories and products.
pub struct CatalogService<S: Store> {
    store: S,
    hooks: PostCommitHooks,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S, hooks: PostCommitHooks) -> Self {
        Self { store, hooks }
    }

    #[tracing::instrument(skip(self, category), fields(user_id = %identity.user_id, name = %category.name))]
    pub async fn create_category(&self, identity: Identity, category: NewCategory) -> Result<Category> {
        ensure_staff(&identity)?;

        let mut tx = self.store.begin().await?;
        let created = tx.insert_category(category).await?;
        tx.commit().await?;

        tracing::info!(category_id = %created.id, "category created");
        self.hooks.run(&[Mutation::Category(created.id)]).await;
        Ok(created)
    }

    #[tracing::instrument(skip(self, update), fields(user_id = %identity.user_id, category_id = %id))]
    pub async fn update_category(
        &self,
        identity: Identity,
        id: CategoryId,
        update: CategoryUpdate,
    ) -> Result<Category> {
        ensure_staff(&identity)?;

        let mut tx = self.store.begin().await?;
        let mut category = tx
            .lock_category(id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("category", id))?;
        category.apply(update)?;
        let updated = tx.update_category(&category).await?;
        tx.commit().await?;

        self.category_changed(id).await;
        Ok(updated)
    }

    /// Deactivates a category, or removes it when `hard` is set.
    ///
    /// A hard delete is refused while any product references the category.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id, category_id = %id))]
    pub async fn delete_category(&self, identity: Identity, id: CategoryId, hard: bool) -> Result<()> {
        ensure_staff(&identity)?;

        let mut tx = self.store.begin().await?;
        let mut category = tx
            .lock_category(id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("category", id))?;

        if hard {
            let products = tx.count_products_in_category(id).await?;
            if products > 0 {
                return Err(FulfillmentError::CategoryInUse { id, products });
            }
            tx.delete_category(id).await?;
            tx.commit().await?;
            tracing::info!("category deleted");
        } else {
            if !category.deactivate() {
                return Ok(());
            }
            tx.update_category(&category).await?;
            tx.commit().await?;
            tracing::info!("category deactivated");
        }

        self.category_changed(id).await;
        Ok(())
    }

    #[tracing::instrument(skip(self, product), fields(user_id = %identity.user_id, category_id = %product.category_id))]
    pub async fn create_product(&self, identity: Identity, product: NewProduct) -> Result<Product> {
        ensure_staff(&identity)?;
        let product = product.validate()?;

        let mut tx = self.store.begin().await?;
        lock_existing_category(&mut tx, product.category_id).await?;
        let created = tx.insert_product(product).await?;
        tx.commit().await?;

        tracing::info!(product_id = %created.id, "product created");
        self.hooks.run(&[Mutation::Product(created.id)]).await;
        Ok(created)
    }

    #[tracing::instrument(skip(self, update), fields(user_id = %identity.user_id, product_id = %id))]
    pub async fn update_product(
        &self,
        identity: Identity,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product> {
        ensure_staff(&identity)?;

        let mut tx = self.store.begin().await?;
        if let Some(category_id) = update.category_id {
            lock_existing_category(&mut tx, category_id).await?;
        }
        let mut product = tx
            .lock_product(id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("product", id))?;
        product.apply(update)?;
        let updated = tx.update_product(&product).await?;
        tx.commit().await?;

        self.product_changed(id).await;
        Ok(updated)
    }

    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id, product_id = %id))]
    pub async fn deactivate_product(&self, identity: Identity, id: ProductId) -> Result<Product> {
        ensure_staff(&identity)?;

        let mut tx = self.store.begin().await?;
        let mut product = tx
            .lock_product(id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("product", id))?;
        if !product.deactivate() {
            return Ok(product);
        }
        let updated = tx.update_product(&product).await?;
        tx.commit().await?;

        self.product_changed(id).await;
        Ok(updated)
    }

    /// Order details embed product names, so every order holding a line for
    /// the product is invalidated along with it.
    async fn product_changed(&self, id: ProductId) {
        let mut mutations = vec![Mutation::Product(id)];
        match self.store.orders_with_product(id).await {
            Ok(orders) => mutations.extend(orders.iter().map(|order| Mutation::Order {
                order_id: order.id(),
                user_id: order.user_id(),
            })),
            Err(e) => {
                tracing::warn!(product_id = %id, error = %e, "could not list orders of changed product");
            }
        }
        self.hooks.run(&mutations).await;
    }

    /// Product details embed their category, so its products are
    /// invalidated along with it.
    async fn category_changed(&self, id: CategoryId) {
        let mut mutations = vec![Mutation::Category(id)];
        let filter = ProductFilter {
            category_id: Some(id),
            ..Default::default()
        };
        match self.store.list_products(&filter).await {
            Ok(products) => mutations.extend(products.iter().map(|p| Mutation::Product(p.id))),
            Err(e) => {
                tracing::warn!(category_id = %id, error = %e, "could not list products of changed category");
            }
        }
        self.hooks.run(&mutations).await;
    }
}

async fn lock_existing_category<T: StoreTx>(tx: &mut T, id: CategoryId) -> Result<Category> {
    tx.lock_category(id)
        .await?
        .ok_or_else(|| FulfillmentError::not_found("category", id))
}

#[cfg(test)]
mod tests {
    use common::UserId;
    use domain::Money;
    use store::InMemoryStore;

    use super::*;

    fn staff() -> Identity {
        Identity::staff(UserId::new(1))
    }

    fn service(store: &InMemoryStore) -> CatalogService<InMemoryStore> {
        CatalogService::new(store.clone(), PostCommitHooks::new())
    }

    fn laptop(category_id: CategoryId) -> NewProduct {
        NewProduct {
            name: "  Laptop ".into(),
            description: String::new(),
            price: Money::from_major(500),
            stock: 3,
            category_id,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_customers_cannot_edit_catalog() {
        let store = InMemoryStore::new();
        let err = service(&store)
            .create_category(
                Identity::customer(UserId::new(2)),
                NewCategory::new("Books", None).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::PermissionDenied));
    }

    #[tokio::test]
    async fn test_hard_delete_refused_while_in_use() {
        let store = InMemoryStore::new();
        let service = service(&store);
        let category = service
            .create_category(staff(), NewCategory::new("Electronics", None).unwrap())
            .await
            .unwrap();
        service
            .create_product(staff(), laptop(category.id))
            .await
            .unwrap();

        let err = service
            .delete_category(staff(), category.id, true)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FulfillmentError::CategoryInUse { products: 1, .. }
        ));
        assert!(store.get_category(category.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_hard_delete_of_unused_inactive_category() {
        let store = InMemoryStore::new();
        let service = service(&store);
        let category = service
            .create_category(staff(), NewCategory::new("Archive", None).unwrap())
            .await
            .unwrap();

        service
            .delete_category(staff(), category.id, false)
            .await
            .unwrap();
        assert!(!store.get_category(category.id).await.unwrap().unwrap().is_active);

        service
            .delete_category(staff(), category.id, true)
            .await
            .unwrap();
        assert!(store.get_category(category.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_a_conflict() {
        let store = InMemoryStore::new();
        let service = service(&store);
        service
            .create_category(staff(), NewCategory::new("Books", None).unwrap())
            .await
            .unwrap();

        let err = service
            .create_category(staff(), NewCategory::new("Books", Some("books-2")).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, FulfillmentError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_product_lifecycle() {
        let store = InMemoryStore::new();
        let service = service(&store);
        let category = service
            .create_category(staff(), NewCategory::new("Electronics", None).unwrap())
            .await
            .unwrap();

        let product = service
            .create_product(staff(), laptop(category.id))
            .await
            .unwrap();
        assert_eq!(product.name, "Laptop");

        let updated = service
            .update_product(
                staff(),
                product.id,
                ProductUpdate {
                    price: Some(Money::from_major(450)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, Money::from_major(450));

        let retired = service.deactivate_product(staff(), product.id).await.unwrap();
        assert!(!retired.is_active);
    }

    #[tokio::test]
    async fn test_product_needs_existing_category() {
        let store = InMemoryStore::new();
        let err = service(&store)
            .create_product(staff(), laptop(CategoryId::new(9)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FulfillmentError::NotFound {
                entity: "category",
                id: 9
            }
        ));
    }
}
