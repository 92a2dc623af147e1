//! Catalog reads.

use std::collections::HashMap;

use cache::{
    Cached, DetailResource, EntityDetailCache, ListResource, QueryParams, VersionedListCache,
};
use common::{CategoryId, Identity, ProductId};
use store::Store;

use crate::error::{QueryError, Result};
use crate::params::{self, CATEGORY_LIST_PARAMS, PRODUCT_LIST_PARAMS};
use crate::views::{CategorySummary, CategoryView, ProductSummary, ProductView};

/// Cached reads of categories and products.
///
/// Only active entities are cached. Staff may read inactive ones, which
/// always come straight from the store.
pub struct CatalogQueries<S: Store> {
    store: S,
    lists: VersionedListCache,
    details: EntityDetailCache,
}

impl<S: Store> CatalogQueries<S> {
    pub fn new(store: S, lists: VersionedListCache, details: EntityDetailCache) -> Self {
        Self {
            store,
            lists,
            details,
        }
    }

    #[tracing::instrument(skip(self, pairs))]
    pub async fn list_categories<K, V>(
        &self,
        pairs: &[(K, V)],
    ) -> Result<Cached<Vec<CategorySummary>>>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params =
            QueryParams::normalize(pairs.iter().map(|(k, v)| (k, v)), CATEGORY_LIST_PARAMS);
        self.lists
            .get_or_load(ListResource::Categories, &params, || async {
                let categories = self
                    .store
                    .list_categories(&params::category_filter(&params))
                    .await?;
                Ok::<_, QueryError>(categories.iter().map(CategorySummary::from).collect())
            })
            .await
    }

    /// `viewer` is `None` for anonymous requests.
    #[tracing::instrument(skip(self, viewer), fields(category_id = %id))]
    pub async fn get_category(
        &self,
        viewer: Option<Identity>,
        id: CategoryId,
    ) -> Result<Cached<CategoryView>> {
        let cached = self
            .details
            .get_or_load(DetailResource::Category, id.get(), || async {
                let category = self.store.get_category(id).await?;
                Ok::<_, QueryError>(
                    category
                        .filter(|c| c.is_active)
                        .as_ref()
                        .map(CategoryView::from),
                )
            })
            .await?;
        if let Some(view) = cached {
            return Ok(view);
        }

        if is_staff(viewer)
            && let Some(category) = self.store.get_category(id).await?
        {
            return Ok(Cached::miss(CategoryView::from(&category)));
        }
        Err(QueryError::not_found("category", id))
    }

    #[tracing::instrument(skip(self, pairs))]
    pub async fn list_products<K, V>(
        &self,
        pairs: &[(K, V)],
    ) -> Result<Cached<Vec<ProductSummary>>>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params =
            QueryParams::normalize(pairs.iter().map(|(k, v)| (k, v)), PRODUCT_LIST_PARAMS);
        self.lists
            .get_or_load(ListResource::Products, &params, || async {
                let products = self
                    .store
                    .list_products(&params::product_filter(&params))
                    .await?;
                self.summarize(&products).await
            })
            .await
    }

    #[tracing::instrument(skip(self, viewer), fields(product_id = %id))]
    pub async fn get_product(
        &self,
        viewer: Option<Identity>,
        id: ProductId,
    ) -> Result<Cached<ProductView>> {
        let cached = self
            .details
            .get_or_load(DetailResource::Product, id.get(), || async {
                self.product_view(id, false).await
            })
            .await?;
        if let Some(view) = cached {
            return Ok(view);
        }

        if is_staff(viewer)
            && let Some(view) = self.product_view(id, true).await?
        {
            return Ok(Cached::miss(view));
        }
        Err(QueryError::not_found("product", id))
    }

    async fn product_view(
        &self,
        id: ProductId,
        include_inactive: bool,
    ) -> Result<Option<ProductView>> {
        let Some(product) = self.store.get_product(id).await? else {
            return Ok(None);
        };
        if !product.is_active && !include_inactive {
            return Ok(None);
        }
        let Some(category) = self.store.get_category(product.category_id).await? else {
            return Ok(None);
        };
        Ok(Some(ProductView::new(&product, &category)))
    }

    async fn summarize(&self, products: &[domain::Product]) -> Result<Vec<ProductSummary>> {
        let mut ids: Vec<CategoryId> = products.iter().map(|p| p.category_id).collect();
        ids.sort();
        ids.dedup();
        let names: HashMap<CategoryId, String> = self
            .store
            .get_categories(&ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        Ok(products
            .iter()
            .map(|p| {
                let name = names.get(&p.category_id).map_or("", String::as_str);
                ProductSummary::new(p, name)
            })
            .collect())
    }
}

fn is_staff(viewer: Option<Identity>) -> bool {
    viewer.is_some_and(|v| v.is_staff)
}
