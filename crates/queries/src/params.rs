//! Query-string parsing for the list endpoints.
//!
//! Parsing is permissive: a value that does not parse is ignored and the
//! default applies. The raw pairs are also normalized into [`QueryParams`]
//! for the cache key.

use cache::QueryParams;
use chrono::NaiveDate;
use common::{CategoryId, UserId};
use domain::{Money, OrderStatus};
use store::{CategoryFilter, OrderFilter, OrderSort, OrderSortField, ProductFilter};

pub const CATEGORY_LIST_PARAMS: &[&str] = &["search"];

pub const PRODUCT_LIST_PARAMS: &[&str] = &[
    "search",
    "category",
    "category_slug",
    "price_min",
    "price_max",
];

pub const USER_ORDER_LIST_PARAMS: &[&str] = &["ordering", "page", "page_size"];

pub const ADMIN_ORDER_LIST_PARAMS: &[&str] = &[
    "ordering",
    "page",
    "page_size",
    "status",
    "user",
    "date_from",
    "date_to",
];

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Largest row offset a store is asked for; bigger pages are simply empty.
pub const MAX_OFFSET: usize = i64::MAX as usize;

/// Active categories whose name contains `search`.
pub fn category_filter(params: &QueryParams) -> CategoryFilter {
    CategoryFilter {
        active_only: true,
        search: params.get("search").map(str::to_string),
    }
}

pub fn product_filter(params: &QueryParams) -> ProductFilter {
    ProductFilter {
        active_only: true,
        search: params.get("search").map(str::to_string),
        category_id: params.get("category").and_then(|v| v.parse::<CategoryId>().ok()),
        category_slug: params.get("category_slug").map(str::to_string),
        price_min: params.get("price_min").and_then(Money::parse),
        price_max: params.get("price_max").and_then(Money::parse),
    }
}

/// Which order list is being parsed. The admin list accepts more filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    User(UserId),
    Admin,
}

impl OrderScope {
    fn sort_fields(&self) -> &'static [OrderSortField] {
        match self {
            OrderScope::User(_) => &[
                OrderSortField::CreatedAt,
                OrderSortField::TotalPrice,
                OrderSortField::Status,
            ],
            OrderScope::Admin => &[
                OrderSortField::CreatedAt,
                OrderSortField::TotalPrice,
                OrderSortField::Status,
                OrderSortField::UserId,
            ],
        }
    }
}

/// A parsed order list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderListParams {
    pub filter: OrderFilter,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl OrderListParams {
    pub fn parse(scope: OrderScope, params: &QueryParams) -> Self {
        let page = params
            .get("page")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let page_size = params
            .get("page_size")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|s| *s >= 1)
            .map_or(DEFAULT_PAGE_SIZE, |s| s.min(MAX_PAGE_SIZE));

        let mut filter = OrderFilter {
            sort: parse_ordering(params.get("ordering"), scope.sort_fields()),
            limit: page_size,
            offset: (page - 1).saturating_mul(page_size).min(MAX_OFFSET),
            ..Default::default()
        };

        match scope {
            OrderScope::User(user_id) => filter.user_id = Some(user_id),
            OrderScope::Admin => {
                filter.user_id = params.get("user").and_then(|v| v.parse::<UserId>().ok());
                filter.status = params
                    .get("status")
                    .and_then(|v| v.parse::<OrderStatus>().ok());
                filter.date_from = params.get("date_from").and_then(parse_date);
                filter.date_to = params.get("date_to").and_then(parse_date);
            }
        }

        Self {
            filter,
            page,
            page_size,
        }
    }
}

/// First recognised field of a comma-separated `ordering`, `-` for descending.
fn parse_ordering(raw: Option<&str>, allowed: &[OrderSortField]) -> OrderSort {
    raw.into_iter()
        .flat_map(|v| v.split(','))
        .find_map(|term| {
            let term = term.trim();
            let (descending, name) = match term.strip_prefix('-') {
                Some(name) => (true, name),
                None => (false, term),
            };
            allowed
                .iter()
                .find(|field| field.column() == name)
                .map(|field| OrderSort {
                    field: *field,
                    descending,
                })
        })
        .unwrap_or_default()
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(pairs: &[(&str, &str)]) -> OrderListParams {
        OrderListParams::parse(
            OrderScope::Admin,
            &QueryParams::normalize(pairs.iter().copied(), ADMIN_ORDER_LIST_PARAMS),
        )
    }

    fn user(pairs: &[(&str, &str)]) -> OrderListParams {
        OrderListParams::parse(
            OrderScope::User(UserId::new(7)),
            &QueryParams::normalize(pairs.iter().copied(), USER_ORDER_LIST_PARAMS),
        )
    }

    #[test]
    fn defaults() {
        let parsed = user(&[]);
        assert_eq!(parsed.page, 1);
        assert_eq!(parsed.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(parsed.filter.sort, OrderSort::default());
        assert_eq!(parsed.filter.user_id, Some(UserId::new(7)));
        assert_eq!(parsed.filter.offset, 0);
    }

    #[test]
    fn page_size_is_capped_and_offsets_follow() {
        let parsed = user(&[("page", "3"), ("page_size", "500")]);
        assert_eq!(parsed.page_size, MAX_PAGE_SIZE);
        assert_eq!(parsed.filter.limit, MAX_PAGE_SIZE);
        assert_eq!(parsed.filter.offset, 200);
    }

    #[test]
    fn huge_page_stays_within_sql_range() {
        let parsed = user(&[("page", "1000000000000000000"), ("page_size", "100")]);
        assert_eq!(parsed.page, 1_000_000_000_000_000_000);
        assert_eq!(parsed.filter.offset, MAX_OFFSET);
        assert!(i64::try_from(parsed.filter.offset).is_ok());
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let parsed = admin(&[
            ("page", "zero"),
            ("page_size", "0"),
            ("status", "lost"),
            ("user", "me"),
            ("date_from", "yesterday"),
            ("ordering", "price"),
        ]);
        assert_eq!(parsed.page, 1);
        assert_eq!(parsed.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(parsed.filter.status, None);
        assert_eq!(parsed.filter.user_id, None);
        assert_eq!(parsed.filter.date_from, None);
        assert_eq!(parsed.filter.sort, OrderSort::default());
    }

    #[test]
    fn ordering_takes_first_known_field() {
        let parsed = admin(&[("ordering", "bogus,-total_price,status")]);
        assert_eq!(
            parsed.filter.sort,
            OrderSort {
                field: OrderSortField::TotalPrice,
                descending: true
            }
        );

        let parsed = admin(&[("ordering", "user_id")]);
        assert_eq!(parsed.filter.sort.field, OrderSortField::UserId);
        assert!(!parsed.filter.sort.descending);
    }

    #[test]
    fn customers_cannot_sort_by_user() {
        let parsed = user(&[("ordering", "user_id")]);
        assert_eq!(parsed.filter.sort, OrderSort::default());
    }

    #[test]
    fn admin_filters() {
        let parsed = admin(&[
            ("status", "Shipped"),
            ("user", "4"),
            ("date_from", "2024-01-01"),
            ("date_to", "2024-01-31"),
        ]);
        assert_eq!(parsed.filter.status, Some(OrderStatus::Shipped));
        assert_eq!(parsed.filter.user_id, Some(UserId::new(4)));
        assert_eq!(parsed.filter.date_from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(parsed.filter.date_to, NaiveDate::from_ymd_opt(2024, 1, 31));
    }

    #[test]
    fn product_filter_ignores_bad_numbers() {
        let params = QueryParams::normalize(
            [
                ("search", " Phone "),
                ("category", "x"),
                ("category_slug", "Electronics"),
                ("price_min", "10.5"),
                ("price_max", "cheap"),
            ],
            PRODUCT_LIST_PARAMS,
        );
        let filter = product_filter(&params);
        assert!(filter.active_only);
        assert_eq!(filter.search.as_deref(), Some("phone"));
        assert_eq!(filter.category_id, None);
        assert_eq!(filter.category_slug.as_deref(), Some("electronics"));
        assert_eq!(filter.price_min, Some(Money::from_cents(1050)));
        assert_eq!(filter.price_max, None);
    }
}
