use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: i64,
    pub quantity: i32,
    pub shipped_so_far: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub order_id: i64,
    pub shipped_so_far: i32,
    pub remaining: i32,
    pub is_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentLine {
    pub product_id: String,
    pub shipped_quantity: i32,
    pub shipment_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_id: String,
    pub product_name: String,
    pub total_order: i64,
    pub total_shipped: i64,
    pub pending: i64,
    pub monthly_shipped: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("product id must not be blank")]
    BlankProductId,
    #[error("product name must not be blank")]
    BlankProductName,
    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,
}

pub fn validate_identity(product_id: &str, product_name: &str) -> Result<(), ValidationError> {
    if product_id.is_empty() {
        return Err(ValidationError::BlankProductId);
    }
    if product_name.is_empty() {
        return Err(ValidationError::BlankProductName);
    }
    Ok(())
}

pub fn validate_quantity(quantity: i32) -> Result<(), ValidationError> {
    if quantity <= 0 {
        return Err(ValidationError::NonPositiveQuantity);
    }
    Ok(())
}

/// Distributes a shipment across outstanding orders, oldest first.
///
/// `outstanding` must already be sorted by `(order_date, id)`. Returns one
/// update per order the shipment touched; orders past the point where the
/// quantity runs out are not emitted. Quantity left over after every
/// outstanding order is satisfied is not attributed to any order.
pub fn allocate(outstanding: &[OrderSnapshot], shipped_quantity: i32) -> Vec<OrderUpdate> {
    let mut remaining_to_allocate = shipped_quantity;
    let mut updates = Vec::new();

    for order in outstanding {
        if remaining_to_allocate == 0 {
            break;
        }
        let still_needed = order.quantity - order.shipped_so_far;
        if still_needed <= 0 {
            // stale row that slipped past the completed filter
            continue;
        }
        let allocated = remaining_to_allocate.min(still_needed);
        let shipped_so_far = order.shipped_so_far + allocated;
        let remaining = order.quantity - shipped_so_far;
        updates.push(OrderUpdate {
            order_id: order.order_id,
            shipped_so_far,
            remaining,
            is_completed: remaining == 0,
        });
        remaining_to_allocate -= allocated;
    }

    updates
}

/// Per-product unmet demand, clamped to zero. Products without orders do not
/// appear even if they have shipments.
pub fn shortfall_map(orders: &[OrderLine], shipments: &[ShipmentLine]) -> BTreeMap<String, i64> {
    let mut shipped: BTreeMap<&str, i64> = BTreeMap::new();
    for shipment in shipments {
        *shipped.entry(shipment.product_id.as_str()).or_default() += i64::from(shipment.shipped_quantity);
    }

    let mut ordered: BTreeMap<&str, i64> = BTreeMap::new();
    for order in orders {
        *ordered.entry(order.product_id.as_str()).or_default() += i64::from(order.quantity);
    }

    ordered
        .into_iter()
        .map(|(product_id, total_ordered)| {
            let total_shipped = shipped.get(product_id).copied().unwrap_or(0);
            (product_id.to_owned(), (total_ordered - total_shipped).max(0))
        })
        .collect()
}

/// Per-product totals for the summary page, sorted by product id. `pending`
/// is left unclamped and goes negative on over-shipment, unlike the
/// shortfall view. `monthly_shipped` counts shipments dated in the given
/// calendar month.
pub fn summarize(
    orders: &[OrderLine],
    shipments: &[ShipmentLine],
    year: i32,
    month: u32,
) -> Vec<ProductSummary> {
    struct OrderTotals<'a> {
        product_name: &'a str,
        total_order: i64,
    }

    let mut per_product: BTreeMap<&str, OrderTotals> = BTreeMap::new();
    for order in orders {
        let entry = per_product.entry(order.product_id.as_str()).or_insert(OrderTotals {
            product_name: &order.product_name,
            total_order: 0,
        });
        entry.total_order += i64::from(order.quantity);
        // the most recent order's denormalized name wins when names drift
        entry.product_name = &order.product_name;
    }

    let mut shipped: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for shipment in shipments {
        let entry = shipped.entry(shipment.product_id.as_str()).or_default();
        entry.0 += i64::from(shipment.shipped_quantity);
        if shipment.shipment_date.year() == year && shipment.shipment_date.month() == month {
            entry.1 += i64::from(shipment.shipped_quantity);
        }
    }

    per_product
        .into_iter()
        .map(|(product_id, totals)| {
            let (total_shipped, monthly_shipped) = shipped.get(product_id).copied().unwrap_or((0, 0));
            ProductSummary {
                product_id: product_id.to_owned(),
                product_name: totals.product_name.to_owned(),
                total_order: totals.total_order,
                total_shipped,
                pending: totals.total_order - total_shipped,
                monthly_shipped,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot(order_id: i64, quantity: i32, shipped_so_far: i32) -> OrderSnapshot {
        OrderSnapshot {
            order_id,
            quantity,
            shipped_so_far,
        }
    }

    fn order_line(product_id: &str, product_name: &str, quantity: i32) -> OrderLine {
        OrderLine {
            product_id: product_id.to_owned(),
            product_name: product_name.to_owned(),
            quantity,
        }
    }

    fn shipment_line(product_id: &str, shipped_quantity: i32, date: &str) -> ShipmentLine {
        ShipmentLine {
            product_id: product_id.to_owned(),
            shipped_quantity,
            shipment_date: date.parse().unwrap(),
        }
    }

    #[test]
    fn partial_shipment_leaves_order_open() {
        // Order for 10, shipment of 4
        let updates = allocate(&[snapshot(1, 10, 0)], 4);
        assert_eq!(
            updates,
            vec![OrderUpdate {
                order_id: 1,
                shipped_so_far: 4,
                remaining: 6,
                is_completed: false,
            }]
        );
    }

    #[test]
    fn followup_shipment_completes_order() {
        // Continues from the partial state above with a shipment of 6
        let updates = allocate(&[snapshot(1, 10, 4)], 6);
        assert_eq!(
            updates,
            vec![OrderUpdate {
                order_id: 1,
                shipped_so_far: 10,
                remaining: 0,
                is_completed: true,
            }]
        );
    }

    #[test]
    fn shipment_spills_into_next_oldest_order() {
        let outstanding = [snapshot(1, 5, 0), snapshot(2, 5, 0)];
        let updates = allocate(&outstanding, 8);
        assert_eq!(
            updates,
            vec![
                OrderUpdate {
                    order_id: 1,
                    shipped_so_far: 5,
                    remaining: 0,
                    is_completed: true,
                },
                OrderUpdate {
                    order_id: 2,
                    shipped_so_far: 3,
                    remaining: 2,
                    is_completed: false,
                },
            ]
        );
    }

    #[test]
    fn small_shipment_never_touches_later_orders() {
        let outstanding = [snapshot(1, 10, 0), snapshot(2, 10, 0)];
        let updates = allocate(&outstanding, 3);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].order_id, 1);
        assert_eq!(updates[0].shipped_so_far, 3);
    }

    #[test]
    fn surplus_with_no_outstanding_orders_is_dropped() {
        let updates = allocate(&[], 3);
        assert!(updates.is_empty());
    }

    #[test]
    fn stale_completed_row_is_skipped() {
        let outstanding = [snapshot(1, 5, 5), snapshot(2, 4, 0)];
        let updates = allocate(&outstanding, 4);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].order_id, 2);
        assert!(updates[0].is_completed);
    }

    #[test]
    fn surplus_beyond_demand_is_not_attributed() {
        let updates = allocate(&[snapshot(1, 5, 0)], 9);
        assert_eq!(
            updates,
            vec![OrderUpdate {
                order_id: 1,
                shipped_so_far: 5,
                remaining: 0,
                is_completed: true,
            }]
        );
    }

    proptest! {
        #[test]
        fn updates_respect_order_bounds(
            rows in prop::collection::vec((1..200i32, 0..200i32), 0..12),
            shipped_quantity in 1..500i32,
        ) {
            let outstanding: Vec<OrderSnapshot> = rows
                .iter()
                .enumerate()
                .map(|(idx, &(quantity, shipped))| snapshot(idx as i64 + 1, quantity, shipped.min(quantity)))
                .collect();

            let updates = allocate(&outstanding, shipped_quantity);

            for update in &updates {
                let prior = outstanding
                    .iter()
                    .find(|o| o.order_id == update.order_id)
                    .unwrap();
                prop_assert!(update.shipped_so_far > prior.shipped_so_far);
                prop_assert!(update.shipped_so_far <= prior.quantity);
                prop_assert_eq!(update.remaining, prior.quantity - update.shipped_so_far);
                prop_assert_eq!(update.is_completed, update.remaining == 0);
            }
        }

        #[test]
        fn allocation_conserves_quantity(
            rows in prop::collection::vec((1..200i32, 0..200i32), 0..12),
            shipped_quantity in 1..500i32,
        ) {
            let outstanding: Vec<OrderSnapshot> = rows
                .iter()
                .enumerate()
                .map(|(idx, &(quantity, shipped))| snapshot(idx as i64 + 1, quantity, shipped.min(quantity)))
                .collect();

            let total_needed: i32 = outstanding
                .iter()
                .map(|o| o.quantity - o.shipped_so_far)
                .sum();

            let updates = allocate(&outstanding, shipped_quantity);

            let consumed: i32 = updates
                .iter()
                .map(|u| {
                    let prior = outstanding.iter().find(|o| o.order_id == u.order_id).unwrap();
                    u.shipped_so_far - prior.shipped_so_far
                })
                .sum();

            prop_assert_eq!(consumed, shipped_quantity.min(total_needed));
        }

        #[test]
        fn every_touched_order_but_the_last_is_completed(
            rows in prop::collection::vec((1..200i32, 0..200i32), 0..12),
            shipped_quantity in 1..500i32,
        ) {
            let outstanding: Vec<OrderSnapshot> = rows
                .iter()
                .enumerate()
                .map(|(idx, &(quantity, shipped))| snapshot(idx as i64 + 1, quantity, shipped.min(quantity)))
                .collect();

            let updates = allocate(&outstanding, shipped_quantity);

            for update in updates.iter().rev().skip(1) {
                prop_assert!(update.is_completed);
            }

            // emitted in the same order as the outstanding sequence
            let positions: Vec<usize> = updates
                .iter()
                .map(|u| outstanding.iter().position(|o| o.order_id == u.order_id).unwrap())
                .collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn shortfall_is_clamped_while_pending_is_not() {
        let orders = [order_line("P-1", "Widget", 10)];
        let shipments = [shipment_line("P-1", 12, "2025-03-05")];

        let shortfalls = shortfall_map(&orders, &shipments);
        assert_eq!(shortfalls.get("P-1"), Some(&0));

        let summary = summarize(&orders, &shipments, 2025, 3);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].total_order, 10);
        assert_eq!(summary[0].total_shipped, 12);
        assert_eq!(summary[0].pending, -2);
        assert_eq!(summary[0].monthly_shipped, 12);
    }

    #[test]
    fn monthly_shipped_only_counts_the_requested_month() {
        let orders = [order_line("P-1", "Widget", 20)];
        let shipments = [
            shipment_line("P-1", 5, "2025-02-28"),
            shipment_line("P-1", 7, "2025-03-01"),
            shipment_line("P-1", 2, "2026-03-15"),
        ];

        let summary = summarize(&orders, &shipments, 2025, 3);
        assert_eq!(summary[0].total_shipped, 14);
        assert_eq!(summary[0].monthly_shipped, 7);
        assert_eq!(summary[0].pending, 6);
    }

    #[test]
    fn products_without_orders_are_absent_from_both_views() {
        let orders = [order_line("P-1", "Widget", 4)];
        let shipments = [
            shipment_line("P-1", 1, "2025-03-05"),
            shipment_line("P-9", 6, "2025-03-05"),
        ];

        let shortfalls = shortfall_map(&orders, &shipments);
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls.get("P-1"), Some(&3));

        let summary = summarize(&orders, &shipments, 2025, 3);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].product_id, "P-1");
    }

    #[test]
    fn summary_rows_are_sorted_and_use_latest_order_name() {
        let orders = [
            order_line("P-2", "Gadget", 3),
            order_line("P-1", "Widget", 5),
            order_line("P-1", "Widget Mk2", 2),
        ];
        let summary = summarize(&orders, &[], 2025, 3);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].product_id, "P-1");
        assert_eq!(summary[0].product_name, "Widget Mk2");
        assert_eq!(summary[0].total_order, 7);
        assert_eq!(summary[1].product_id, "P-2");
    }

    #[test]
    fn reporting_views_are_idempotent() {
        let orders = [order_line("P-1", "Widget", 10), order_line("P-2", "Gadget", 4)];
        let shipments = [shipment_line("P-1", 3, "2025-03-05")];

        assert_eq!(
            shortfall_map(&orders, &shipments),
            shortfall_map(&orders, &shipments)
        );
        assert_eq!(
            summarize(&orders, &shipments, 2025, 3),
            summarize(&orders, &shipments, 2025, 3)
        );
    }

    #[test]
    fn blank_fields_and_nonpositive_quantities_are_rejected() {
        assert_eq!(validate_identity("", "Widget"), Err(ValidationError::BlankProductId));
        assert_eq!(validate_identity("P-1", ""), Err(ValidationError::BlankProductName));
        assert_eq!(validate_identity("P-1", "Widget"), Ok(()));
        assert_eq!(validate_quantity(0), Err(ValidationError::NonPositiveQuantity));
        assert_eq!(validate_quantity(-3), Err(ValidationError::NonPositiveQuantity));
        assert_eq!(validate_quantity(1), Ok(()));
    }
}
