//! Order reads.

use std::collections::HashMap;

use cache::{
    Cached, DetailResource, EntityDetailCache, ListResource, QueryParams, VersionedListCache,
};
use common::{Identity, OrderId, ProductId};
use store::Store;

use crate::error::{QueryError, Result};
use crate::params::{
    ADMIN_ORDER_LIST_PARAMS, OrderListParams, OrderScope, USER_ORDER_LIST_PARAMS,
};
use crate::views::{OrderPage, OrderSummary, OrderView};

/// Cached reads of orders.
pub struct OrderQueries<S: Store> {
    store: S,
    lists: VersionedListCache,
    details: EntityDetailCache,
}

impl<S: Store> OrderQueries<S> {
    pub fn new(store: S, lists: VersionedListCache, details: EntityDetailCache) -> Self {
        Self {
            store,
            lists,
            details,
        }
    }

    /// The caller's own orders.
    #[tracing::instrument(skip(self, identity, pairs), fields(user_id = %identity.user_id))]
    pub async fn list_user_orders<K, V>(
        &self,
        identity: Identity,
        pairs: &[(K, V)],
    ) -> Result<Cached<OrderPage>>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params =
            QueryParams::normalize(pairs.iter().map(|(k, v)| (k, v)), USER_ORDER_LIST_PARAMS);
        let parsed = OrderListParams::parse(OrderScope::User(identity.user_id), &params);
        self.lists
            .get_or_load(ListResource::UserOrders(identity.user_id), &params, || {
                self.load_page(parsed)
            })
            .await
    }

    /// Every order, with the staff filters.
    #[tracing::instrument(skip(self, identity, pairs), fields(user_id = %identity.user_id))]
    pub async fn list_admin_orders<K, V>(
        &self,
        identity: Identity,
        pairs: &[(K, V)],
    ) -> Result<Cached<OrderPage>>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if !identity.is_staff {
            return Err(QueryError::PermissionDenied);
        }
        let params =
            QueryParams::normalize(pairs.iter().map(|(k, v)| (k, v)), ADMIN_ORDER_LIST_PARAMS);
        let parsed = OrderListParams::parse(OrderScope::Admin, &params);
        self.lists
            .get_or_load(ListResource::AdminOrders, &params, || self.load_page(parsed))
            .await
    }

    /// An order with its lines. Readable by its owner and by staff.
    ///
    /// Ownership is checked on every read, cached or not.
    #[tracing::instrument(skip(self, identity), fields(user_id = %identity.user_id, order_id = %id))]
    pub async fn get_order(&self, identity: Identity, id: OrderId) -> Result<Cached<OrderView>> {
        let view = self
            .details
            .get_or_load(DetailResource::Order, id.get(), || self.load_order(id))
            .await?
            .ok_or_else(|| QueryError::not_found("order", id))?;

        if !identity.can_access(view.value.user) {
            metrics::counter!("order_reads_denied_total").increment(1);
            tracing::warn!(owner = %view.value.user, "order read denied");
            return Err(QueryError::PermissionDenied);
        }
        Ok(view)
    }

    async fn load_page(&self, params: OrderListParams) -> Result<OrderPage> {
        let listing = self.store.list_orders(&params.filter).await?;
        Ok(OrderPage {
            count: listing.total,
            page: params.page,
            page_size: params.page_size,
            results: listing.orders.iter().map(OrderSummary::from).collect(),
        })
    }

    async fn load_order(&self, id: OrderId) -> Result<Option<OrderView>> {
        let Some(order) = self.store.get_order(id).await? else {
            return Ok(None);
        };
        let items = self.store.get_order_items(id).await?;

        let product_ids: Vec<ProductId> = items.iter().map(|item| item.product_id()).collect();
        let names: HashMap<ProductId, String> = self
            .store
            .get_products(&product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        Ok(Some(OrderView::new(&order, &items, &names)))
    }
}
