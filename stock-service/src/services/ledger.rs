//! Sufficiency checking for stock decrements.
//!
//! The checks are pure so the Postgres store and test doubles share them. Items
//! are evaluated in request order and the first violation is reported. A
//! product listed twice is checked against what the earlier line left over.

use crate::models::BalanceDecrement;
use crate::services::StockError;
use std::collections::HashMap;
use uuid::Uuid;

/// Reject malformed lines before any balance is read.
pub fn validate_request(items: &[BalanceDecrement]) -> Result<(), StockError> {
    for item in items {
        if item.product_id.trim().is_empty() {
            return Err(StockError::Validation("product_id is required".to_string()));
        }
        if item.quantity < 1 {
            return Err(StockError::Validation(format!(
                "quantity must be at least 1 for product {}",
                item.product_id
            )));
        }
    }
    Ok(())
}

/// Distinct, parseable product ids of a request, sorted. Locking rows in this
/// order keeps concurrent decrements from deadlocking.
pub fn lock_order(items: &[BalanceDecrement]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = items
        .iter()
        .filter_map(|item| Uuid::parse_str(&item.product_id).ok())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Check every line against `balances` and return the total to subtract per
/// product, in first-seen order. Nothing is returned unless every line passes.
pub fn plan_decrements(
    items: &[BalanceDecrement],
    balances: &HashMap<Uuid, i32>,
) -> Result<Vec<(Uuid, i32)>, StockError> {
    let mut remaining: HashMap<Uuid, i32> = HashMap::new();
    let mut order: Vec<Uuid> = Vec::new();

    for item in items {
        let (product_id, current) = Uuid::parse_str(&item.product_id)
            .ok()
            .and_then(|id| balances.get(&id).map(|balance| (id, *balance)))
            .ok_or_else(|| StockError::ProductNotFound(item.product_id.clone()))?;

        let available = *remaining.entry(product_id).or_insert_with(|| {
            order.push(product_id);
            current
        });

        if available < item.quantity {
            return Err(StockError::InsufficientStock {
                product_id: item.product_id.clone(),
                requested: item.quantity,
                available,
            });
        }

        remaining.insert(product_id, available - item.quantity);
    }

    Ok(order
        .into_iter()
        .map(|id| (id, balances[&id] - remaining[&id]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balances(entries: &[(Uuid, i32)]) -> HashMap<Uuid, i32> {
        entries.iter().copied().collect()
    }

    #[test]
    fn plans_each_product_once() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let items = vec![
            BalanceDecrement::new(a.to_string(), 2),
            BalanceDecrement::new(b.to_string(), 1),
        ];

        let plan = plan_decrements(&items, &balances(&[(a, 5), (b, 1)])).unwrap();
        assert_eq!(plan, vec![(a, 2), (b, 1)]);
    }

    #[test]
    fn repeated_product_is_checked_cumulatively() {
        let a = Uuid::new_v4();
        let items = vec![
            BalanceDecrement::new(a.to_string(), 3),
            BalanceDecrement::new(a.to_string(), 3),
        ];

        let err = plan_decrements(&items, &balances(&[(a, 5)])).unwrap_err();
        match err {
            StockError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let plan = plan_decrements(&items, &balances(&[(a, 6)])).unwrap();
        assert_eq!(plan, vec![(a, 6)]);
    }

    #[test]
    fn first_violation_in_request_order_is_reported() {
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let items: Vec<_> = ids
            .iter()
            .map(|id| BalanceDecrement::new(id.to_string(), 1))
            .collect();
        // Item 3 has nothing left, item 5 does not exist.
        let stock = balances(&[(ids[0], 1), (ids[1], 1), (ids[2], 0), (ids[3], 1)]);

        let err = plan_decrements(&items, &stock).unwrap_err();
        assert_eq!(err.product_id(), Some(ids[2].to_string().as_str()));
        assert!(matches!(err, StockError::InsufficientStock { .. }));
    }

    #[test]
    fn unknown_or_malformed_ids_are_not_found() {
        let items = vec![BalanceDecrement::new("not-a-uuid", 1)];
        let err = plan_decrements(&items, &HashMap::new()).unwrap_err();
        assert!(matches!(err, StockError::ProductNotFound(ref id) if id == "not-a-uuid"));
    }

    #[test]
    fn validation_rejects_non_positive_quantity_and_blank_id() {
        assert!(matches!(
            validate_request(&[BalanceDecrement::new("p1", 0)]),
            Err(StockError::Validation(_))
        ));
        assert!(matches!(
            validate_request(&[BalanceDecrement::new(" ", 1)]),
            Err(StockError::Validation(_))
        ));
        assert!(validate_request(&[BalanceDecrement::new("p1", 1)]).is_ok());
    }

    #[test]
    fn lock_order_is_sorted_and_distinct() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let items = vec![
            BalanceDecrement::new(b.to_string(), 1),
            BalanceDecrement::new("junk", 1),
            BalanceDecrement::new(a.to_string(), 1),
            BalanceDecrement::new(b.to_string(), 1),
        ];
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(lock_order(&items), expected);
    }
}
