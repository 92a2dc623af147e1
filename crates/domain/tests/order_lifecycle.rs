//! Integration tests for the order lifecycle rules.

use chrono::Utc;
use common::{OrderId, OrderItemId, ProductId, UserId};
use domain::{Money, Order, OrderError, OrderItem, OrderStatus, Transition};

fn new_order() -> Order {
    let now = Utc::now();
    Order::from_parts(
        OrderId::new(42),
        UserId::new(1),
        OrderStatus::Pending,
        Money::zero(),
        now,
        now,
    )
}

mod transitions {
    use super::*;

    #[test]
    fn full_happy_path() {
        let mut order = new_order();

        for target in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let before = order.status();
            assert_eq!(
                order.transition_to(target).unwrap(),
                Transition::Changed {
                    from: before,
                    to: target
                }
            );
        }

        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(order.status().is_terminal());
    }

    #[test]
    fn table_is_exhaustive() {
        let allowed = [
            (OrderStatus::Pending, OrderStatus::Processing),
            (OrderStatus::Pending, OrderStatus::Cancelled),
            (OrderStatus::Processing, OrderStatus::Shipped),
            (OrderStatus::Processing, OrderStatus::Cancelled),
            (OrderStatus::Shipped, OrderStatus::Delivered),
        ];

        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{from} -> {to} should be {expected}"
                );
            }
        }
    }

    #[test]
    fn cancelled_order_cannot_resume() {
        let mut order = new_order();
        order.transition_to(OrderStatus::Cancelled).unwrap();

        for target in [OrderStatus::Pending, OrderStatus::Processing] {
            assert!(matches!(
                order.transition_to(target),
                Err(OrderError::InvalidTransition { .. })
            ));
        }
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(order.ensure_items_mutable().is_err());
    }
}

mod totals {
    use super::*;

    #[test]
    fn total_matches_sum_of_lines() {
        let mut order = new_order();
        let now = Utc::now();
        let items = vec![
            OrderItem::from_parts(
                OrderItemId::new(1),
                order.id(),
                ProductId::new(10),
                2,
                Money::from_major(500),
                now,
            ),
            OrderItem::from_parts(
                OrderItemId::new(2),
                order.id(),
                ProductId::new(11),
                3,
                Money::from_major(20),
                now,
            ),
        ];

        order.recalc_total(&items).unwrap();

        assert_eq!(order.total_price(), Money::from_major(1060));
        assert_eq!(order.total_price().to_string(), "1060.00");
    }

    #[test]
    fn empty_order_totals_zero() {
        let mut order = new_order();
        assert_eq!(order.recalc_total(&[]).unwrap(), Money::zero());
    }
}
