//! Order fulfillment for the online store.
//!
//! Every mutation runs in one store transaction, then reports what it
//! changed to its post-commit hooks and schedules deferred tasks:
//!
//! - [`ReservationTransactor`]: creates orders while reserving stock
//! - [`OrderStateMachine`]: persisted status transitions
//! - [`LineItemService`]: adds, changes and removes lines of open orders
//! - [`CatalogService`]: staff-only category and product maintenance

pub mod catalog;
pub mod error;
pub mod hooks;
pub mod items;
pub mod reservation;
pub mod status;
pub mod tasks;

pub use catalog::CatalogService;
pub use error::{FulfillmentError, Result};
pub use hooks::{CacheInvalidationHook, InvalidationPlan, Mutation, PostCommitHook, PostCommitHooks};
pub use items::LineItemService;
pub use reservation::ReservationTransactor;
pub use status::OrderStateMachine;
pub use tasks::{Task, TaskQueue};

use common::{Identity, UserId};

fn ensure_can_access(identity: &Identity, owner: UserId) -> Result<()> {
    if !identity.can_access(owner) {
        return Err(FulfillmentError::PermissionDenied);
    }
    Ok(())
}

fn ensure_staff(identity: &Identity) -> Result<()> {
    if !identity.is_staff {
        return Err(FulfillmentError::PermissionDenied);
    }
    Ok(())
}
