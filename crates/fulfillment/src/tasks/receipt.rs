//! Order receipts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{OrderId, ProductId};
use domain::{Order, OrderError, OrderItem};
use store::Store;

use super::TaskError;

/// Relative path of an order's receipt.
pub fn receipt_path(order_id: OrderId) -> String {
    format!("order_receipts/order_{order_id}.txt")
}

/// Where generated documents are written.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes `contents` at `path`, replacing any previous document.
    async fn put(&self, path: &str, contents: &[u8]) -> Result<(), TaskError>;
}

/// Documents on the local filesystem under a media root.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn put(&self, path: &str, contents: &[u8]) -> Result<(), TaskError> {
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TaskError::Transient(format!("create {}: {e}", parent.display())))?;
        }

        // write then rename so readers never see a partial receipt
        let staging = target.with_extension("tmp");
        tokio::fs::write(&staging, contents)
            .await
            .map_err(|e| TaskError::Transient(format!("write {}: {e}", staging.display())))?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|e| TaskError::Transient(format!("rename {}: {e}", target.display())))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryDocumentState {
    documents: HashMap<String, Vec<u8>>,
    writes: usize,
    failures_left: u32,
}

/// In-memory document store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<InMemoryDocumentState>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `n` writes with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.write_state().failures_left = n;
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.read_state()
            .documents
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn document_count(&self) -> usize {
        self.read_state().documents.len()
    }

    /// Successful writes, overwrites included.
    pub fn write_count(&self) -> usize {
        self.read_state().writes
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, InMemoryDocumentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryDocumentState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put(&self, path: &str, contents: &[u8]) -> Result<(), TaskError> {
        let mut state = self.write_state();
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(TaskError::Transient("document store unavailable".into()));
        }
        state.documents.insert(path.to_string(), contents.to_vec());
        state.writes += 1;
        Ok(())
    }
}

/// Renders the plain-text receipt.
///
/// `names` maps product ids to display names; unknown products render as
/// `Product #<id>`.
pub fn render_receipt(
    order: &Order,
    items: &[OrderItem],
    names: &HashMap<ProductId, String>,
) -> Result<String, OrderError> {
    let mut lines = vec![
        format!("Order #{}", order.id()),
        format!("User ID: {}", order.user_id()),
        format!("Status: {}", order.status()),
        format!("Created: {}", order.created_at().format("%Y-%m-%d %H:%M:%S UTC")),
        format!("Total: {}", order.total_price()),
        String::new(),
        "Items:".to_string(),
    ];
    for item in items {
        let name = names
            .get(&item.product_id())
            .cloned()
            .unwrap_or_else(|| format!("Product #{}", item.product_id()));
        lines.push(format!(
            "- {name} x{} @ {} = {}",
            item.quantity(),
            item.price_at_purchase(),
            item.line_total()?
        ));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

/// Loads an order, renders its receipt and stores it. Returns the path.
///
/// A missing order fails permanently; store and storage errors are transient.
#[tracing::instrument(skip(store, documents), fields(order_id = %order_id))]
pub async fn generate_receipt<S: Store>(
    store: &S,
    documents: &dyn DocumentStore,
    order_id: OrderId,
) -> Result<String, TaskError> {
    let order = store
        .get_order(order_id)
        .await
        .map_err(|e| TaskError::Transient(e.to_string()))?
        .ok_or_else(|| TaskError::Permanent(format!("order {order_id} not found")))?;
    let items = store
        .get_order_items(order_id)
        .await
        .map_err(|e| TaskError::Transient(e.to_string()))?;

    let ids: Vec<ProductId> = items.iter().map(OrderItem::product_id).collect();
    let names: HashMap<ProductId, String> = store
        .get_products(&ids)
        .await
        .map_err(|e| TaskError::Transient(e.to_string()))?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();

    let text = render_receipt(&order, &items, &names)
        .map_err(|e| TaskError::Permanent(e.to_string()))?;
    let path = receipt_path(order_id);
    documents.put(&path, text.as_bytes()).await?;

    tracing::info!(user_id = %order.user_id(), path = %path, "receipt generated, user notified");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::{OrderItemId, UserId};
    use domain::{Money, OrderStatus};

    use super::*;

    fn order() -> (Order, Vec<OrderItem>) {
        let now = Utc::now();
        let order = Order::from_parts(
            OrderId::new(12),
            UserId::new(3),
            OrderStatus::Pending,
            Money::from_major(1060),
            now,
            now,
        );
        let items = vec![
            OrderItem::from_parts(
                OrderItemId::new(1),
                OrderId::new(12),
                ProductId::new(1),
                2,
                Money::from_major(500),
                now,
            ),
            OrderItem::from_parts(
                OrderItemId::new(2),
                OrderId::new(12),
                ProductId::new(2),
                3,
                Money::from_major(20),
                now,
            ),
        ];
        (order, items)
    }

    #[test]
    fn test_render_lists_every_line() {
        let (order, items) = order();
        let names = HashMap::from([(ProductId::new(1), "Laptop".to_string())]);

        let text = render_receipt(&order, &items, &names).unwrap();

        assert!(text.starts_with("Order #12\nUser ID: 3\nStatus: pending\n"));
        assert!(text.contains("Total: 1060.00"));
        assert!(text.contains("- Laptop x2 @ 500.00 = 1000.00"));
        assert!(text.contains("- Product #2 x3 @ 20.00 = 60.00"));
    }

    #[test]
    fn test_render_ends_each_line() {
        let (order, items) = order();
        let text = render_receipt(&order, &items, &HashMap::new()).unwrap();

        assert!(text.ends_with("= 60.00\n"));
        assert_eq!(text.lines().count(), 9);
        assert!(text.contains("\n\nItems:\n"));
    }

    #[test]
    fn test_render_rejects_overflowing_line() {
        let (order, _) = order();
        let huge = OrderItem::from_parts(
            OrderItemId::new(1),
            OrderId::new(12),
            ProductId::new(1),
            2,
            Money::parse("79228162514264337593543950335").unwrap(),
            Utc::now(),
        );

        let err = render_receipt(&order, &[huge], &HashMap::new()).unwrap_err();
        assert!(matches!(err, OrderError::TotalOverflow { .. }));
    }

    #[test]
    fn test_receipt_path() {
        assert_eq!(receipt_path(OrderId::new(7)), "order_receipts/order_7.txt");
    }

    #[tokio::test]
    async fn test_fs_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let documents = FsDocumentStore::new(dir.path());

        documents.put("order_receipts/order_1.txt", b"first").await.unwrap();
        documents.put("order_receipts/order_1.txt", b"second").await.unwrap();

        let written = tokio::fs::read_to_string(dir.path().join("order_receipts/order_1.txt"))
            .await
            .unwrap();
        assert_eq!(written, "second");
        assert!(!dir.path().join("order_receipts/order_1.tmp").exists());
    }

    #[tokio::test]
    async fn test_in_memory_store_scripted_failures() {
        let documents = InMemoryDocumentStore::new();
        documents.fail_next(1);

        assert!(documents.put("a", b"x").await.unwrap_err().is_transient());
        documents.put("a", b"x").await.unwrap();
        assert_eq!(documents.get("a").as_deref(), Some("x"));
        assert_eq!(documents.write_count(), 1);
    }
}
