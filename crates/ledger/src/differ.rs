//! Child-set differ.
//!
//! Turns the persisted orders of a customer and the desired in-memory orders
//! into the deletes, updates and inserts that make the store match memory.
//! Pure computation: no I/O, no mutation of its inputs.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use customer_ledger_core::OrderId;

use crate::models::Order;

/// Operations needed to turn a persisted order set into a desired one.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct OrderDiff<'a> {
    /// Persisted orders whose identity is absent from the desired set.
    pub to_delete: Vec<&'a Order>,
    /// Desired orders whose identity matches a persisted order.
    ///
    /// Matched orders are always rewritten, even when unchanged.
    pub to_update: Vec<&'a Order>,
    /// Desired orders to insert, with their position in the desired slice.
    pub to_insert: Vec<(usize, &'a Order)>,
    /// Positions of desired orders left out because a later order shares
    /// their identity. No statement is issued for them.
    pub dropped: Vec<usize>,
}

impl OrderDiff<'_> {
    /// Whether applying this diff would issue no statements.
    ///
    /// Dropped duplicates do not count.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_update.is_empty() && self.to_insert.is_empty()
    }
}

/// Compute the operations that reconcile `persisted` with `desired`.
///
/// - Pending orders (no identity, or a non-positive one) are always inserted,
///   never matched.
/// - An order whose positive identity is unknown to the store is inserted
///   and will receive a fresh identity.
/// - When several desired orders share a positive identity, the last one
///   wins; the positions of earlier ones are reported in `dropped`.
#[must_use]
pub fn diff_orders<'a>(persisted: &'a [Order], desired: &'a [Order]) -> OrderDiff<'a> {
    let persisted_ids: HashSet<OrderId> = persisted.iter().filter_map(Order::persisted_id).collect();

    let mut last_position: HashMap<OrderId, usize> = HashMap::new();
    for (position, order) in desired.iter().enumerate() {
        if let Some(id) = order.persisted_id() {
            last_position.insert(id, position);
        }
    }

    let mut diff = OrderDiff::default();

    for order in persisted {
        if let Some(id) = order.persisted_id()
            && !last_position.contains_key(&id)
        {
            diff.to_delete.push(order);
        }
    }

    for (position, order) in desired.iter().enumerate() {
        match order.persisted_id() {
            None => diff.to_insert.push((position, order)),
            Some(id) if last_position.get(&id) != Some(&position) => {
                warn!(order_id = %id, position, "duplicate order identity, keeping the last one");
                diff.dropped.push(position);
            }
            Some(id) if persisted_ids.contains(&id) => diff.to_update.push(order),
            Some(_) => diff.to_insert.push((position, order)),
        }
    }

    diff
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use customer_ledger_core::ProductId;

    use super::*;

    fn persisted(id: i32, product: i32, quantity: i32) -> Order {
        Order {
            id: Some(OrderId::new(id)),
            ..Order::new(ProductId::new(product), quantity)
        }
    }

    fn pending(product: i32, quantity: i32) -> Order {
        Order::new(ProductId::new(product), quantity)
    }

    fn ids(orders: &[&Order]) -> Vec<i32> {
        orders
            .iter()
            .map(|o| o.persisted_id().unwrap().as_i32())
            .collect()
    }

    #[test]
    fn test_empty_inputs() {
        assert!(diff_orders(&[], &[]).is_empty());
    }

    #[test]
    fn test_all_pending_are_inserted() {
        let desired: Vec<Order> = (1..=4).map(|p| pending(p, 100)).collect();
        let diff = diff_orders(&[], &desired);

        assert!(diff.to_delete.is_empty());
        assert!(diff.to_update.is_empty());
        let positions: Vec<usize> = diff.to_insert.iter().map(|(pos, _)| *pos).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_desired_deletes_everything() {
        let stored = vec![persisted(1, 1, 100), persisted(2, 2, 100)];
        let diff = diff_orders(&stored, &[]);

        assert_eq!(ids(&diff.to_delete), vec![1, 2]);
        assert!(diff.to_update.is_empty());
        assert!(diff.to_insert.is_empty());
    }

    #[test]
    fn test_mixed_plan() {
        let stored = vec![persisted(1, 1, 100), persisted(2, 2, 100), persisted(3, 3, 100)];
        let desired = vec![persisted(2, 2, 1000), pending(4, 100), persisted(3, 3, 100)];
        let diff = diff_orders(&stored, &desired);

        assert_eq!(ids(&diff.to_delete), vec![1]);
        assert_eq!(ids(&diff.to_update), vec![2, 3]);
        assert_eq!(diff.to_update[0].quantity, 1000);
        assert_eq!(diff.to_insert.len(), 1);
        assert_eq!(diff.to_insert[0].0, 1);
    }

    #[test]
    fn test_unchanged_matches_are_still_updated() {
        let stored = vec![persisted(5, 1, 10)];
        let desired = stored.clone();
        let diff = diff_orders(&stored, &desired);

        assert_eq!(ids(&diff.to_update), vec![5]);
    }

    #[test]
    fn test_zero_identity_is_never_matched() {
        let stored = vec![persisted(1, 1, 10)];
        let mut zero = pending(1, 10);
        zero.id = Some(OrderId::new(0));
        let desired = [zero];
        let diff = diff_orders(&stored, &desired);

        assert_eq!(ids(&diff.to_delete), vec![1]);
        assert_eq!(diff.to_insert.len(), 1);
    }

    #[test]
    fn test_unknown_identity_is_inserted() {
        let stored = vec![persisted(1, 1, 10)];
        let desired = vec![persisted(1, 1, 10), persisted(42, 2, 10)];
        let diff = diff_orders(&stored, &desired);

        assert!(diff.to_delete.is_empty());
        assert_eq!(ids(&diff.to_update), vec![1]);
        assert_eq!(diff.to_insert.len(), 1);
        assert_eq!(diff.to_insert[0].0, 1);
    }

    #[test]
    fn test_duplicate_identity_last_wins() {
        let stored = vec![persisted(7, 1, 10)];
        let desired = vec![persisted(7, 1, 11), pending(2, 5), persisted(7, 1, 12)];
        let diff = diff_orders(&stored, &desired);

        assert!(diff.to_delete.is_empty());
        assert_eq!(diff.to_update.len(), 1);
        assert_eq!(diff.to_update[0].quantity, 12);
        assert_eq!(diff.to_insert.len(), 1);
        assert_eq!(diff.to_insert[0].0, 1);
        assert_eq!(diff.dropped, vec![0]);
    }

    #[test]
    fn test_duplicate_unknown_identity_inserts_once() {
        let desired = vec![persisted(42, 1, 1), persisted(42, 2, 2), persisted(42, 3, 3)];
        let diff = diff_orders(&[], &desired);

        assert!(diff.to_update.is_empty());
        assert_eq!(diff.to_insert.len(), 1);
        assert_eq!(diff.to_insert[0].0, 2);
        assert_eq!(diff.dropped, vec![0, 1]);
    }

    #[test]
    fn test_outputs_are_disjoint_and_counts_add_up() {
        let stored: Vec<Order> = (1..=6).map(|id| persisted(id, 1, 1)).collect();
        let desired = vec![
            persisted(2, 1, 2),
            pending(1, 1),
            persisted(4, 1, 2),
            persisted(9, 1, 1),
            pending(3, 3),
            persisted(6, 1, 2),
        ];
        let diff = diff_orders(&stored, &desired);

        let deleted: HashSet<i32> = ids(&diff.to_delete).into_iter().collect();
        let updated: HashSet<i32> = ids(&diff.to_update).into_iter().collect();
        assert!(deleted.is_disjoint(&updated));
        for (_, order) in &diff.to_insert {
            if let Some(id) = order.persisted_id() {
                assert!(!deleted.contains(&id.as_i32()));
                assert!(!updated.contains(&id.as_i32()));
            }
        }

        let matched = updated.len();
        assert_eq!(
            diff.to_delete.len() + diff.to_update.len() + diff.to_insert.len(),
            desired.len() + (stored.len() - matched)
        );
        assert_eq!(deleted, HashSet::from([1, 3, 5]));
        assert_eq!(updated, HashSet::from([2, 4, 6]));
        assert_eq!(diff.to_insert.len(), 3);
    }
}
