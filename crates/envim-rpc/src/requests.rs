//! Table of in-flight requests keyed by their msgpack-RPC id.

use std::collections::BTreeMap;
use std::collections::btree_map::{self, Entry};

use crate::error::RequestError;

/// In-flight requests awaiting a response.
///
/// Ids start at zero and increase by one per allocation. They are `u64`, so
/// running out would take 2^64 calls on one session; the counter wraps
/// rather than panicking if that ever happens.
#[derive(Debug)]
pub struct RequestTable<T> {
    next_id: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> Default for RequestTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestTable<T> {
    /// Creates an empty table whose first id is zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Hands out the next request id.
    pub const fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Records a request as pending.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Duplicate`] if `id` is already pending; the
    /// existing entry is left in place.
    pub fn register(&mut self, id: u64, entry: T) -> Result<(), RequestError> {
        match self.pending.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
            Entry::Occupied(_) => Err(RequestError::Duplicate { id }),
        }
    }

    /// Removes and returns the request with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::NotFound`] if no such request is pending,
    /// including when it was already resolved.
    pub fn resolve(&mut self, id: u64) -> Result<T, RequestError> {
        self.pending.remove(&id).ok_or(RequestError::NotFound { id })
    }

    /// Whether a request with `id` is pending.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of pending requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes every pending request, yielding them in id order.
    pub fn drain(&mut self) -> btree_map::IntoIter<u64, T> {
        std::mem::take(&mut self.pending).into_iter()
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn table() -> RequestTable<&'static str> {
        RequestTable::new()
    }

    #[rstest]
    fn ids_start_at_zero_and_increase(mut table: RequestTable<&'static str>) {
        let ids: Vec<u64> = (0..4).map(|_| table.allocate_id()).collect();

        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[rstest]
    fn ids_are_not_reused_after_resolution(mut table: RequestTable<&'static str>) {
        let first = table.allocate_id();
        table.register(first, "first").expect("register");
        table.resolve(first).expect("resolve");

        assert_ne!(table.allocate_id(), first);
    }

    #[rstest]
    fn resolve_removes_exactly_once(mut table: RequestTable<&'static str>) {
        let id = table.allocate_id();
        table.register(id, "call").expect("register");

        assert_eq!(table.resolve(id), Ok("call"));
        assert_eq!(table.resolve(id), Err(RequestError::NotFound { id }));
        assert!(table.is_empty());
    }

    #[rstest]
    fn duplicate_registration_keeps_original(mut table: RequestTable<&'static str>) {
        table.register(4, "original").expect("register");

        assert_eq!(
            table.register(4, "replacement"),
            Err(RequestError::Duplicate { id: 4 })
        );
        assert_eq!(table.resolve(4), Ok("original"));
    }

    #[rstest]
    fn unknown_id_leaves_table_unchanged(mut table: RequestTable<&'static str>) {
        table.register(0, "a").expect("register");
        table.register(1, "b").expect("register");

        assert!(table.resolve(9).is_err());
        assert_eq!(table.len(), 2);
        assert!(table.contains(0));
        assert!(table.contains(1));
    }

    #[rstest]
    fn drain_yields_in_id_order(mut table: RequestTable<&'static str>) {
        table.register(2, "c").expect("register");
        table.register(0, "a").expect("register");
        table.register(1, "b").expect("register");

        let drained: Vec<_> = table.drain().collect();

        assert_eq!(drained, vec![(0, "a"), (1, "b"), (2, "c")]);
        assert!(table.is_empty());
    }

    #[rstest]
    fn counter_wraps_instead_of_panicking(mut table: RequestTable<&'static str>) {
        table.next_id = u64::MAX;

        assert_eq!(table.allocate_id(), u64::MAX);
        assert_eq!(table.allocate_id(), 0);
    }
}
