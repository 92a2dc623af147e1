use common::UserId;

/// A list endpoint with its own generation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListResource {
    Categories,
    Products,
    /// One customer's order list.
    UserOrders(UserId),
    /// The staff order list.
    AdminOrders,
}

impl ListResource {
    /// Key namespace of the resource.
    pub fn prefix(&self) -> String {
        match self {
            ListResource::Categories => "categories".to_string(),
            ListResource::Products => "products".to_string(),
            ListResource::UserOrders(user_id) => format!("orders:user:{user_id}"),
            ListResource::AdminOrders => "orders:admin".to_string(),
        }
    }

    /// Key holding the generation counter.
    pub fn version_key(&self) -> String {
        format!("{}:list:version", self.prefix())
    }

    /// Low-cardinality name for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ListResource::Categories => "categories",
            ListResource::Products => "products",
            ListResource::UserOrders(_) => "user_orders",
            ListResource::AdminOrders => "admin_orders",
        }
    }
}

/// An entity with a cached detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailResource {
    Category,
    Product,
    Order,
}

impl DetailResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailResource::Category => "category",
            DetailResource::Product => "product",
            DetailResource::Order => "order",
        }
    }

    pub fn key(&self, id: i64) -> String {
        format!("{}:{id}", self.as_str())
    }
}
