use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::models::TaskId;

/// Hands out task identities. Implementations must never return the same
/// id twice and must not derive ids from the store's current contents.
pub trait IdAllocator: Send + Sync {
    fn next_id(&self) -> TaskId;
}

/// Time-ordered UUIDv7 identities.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Allocator;

impl IdAllocator for UuidV7Allocator {
    fn next_id(&self) -> TaskId {
        TaskId::from_uuid(Uuid::now_v7())
    }
}

/// Deterministic counter-backed identities, mostly for tests and fixtures.
#[derive(Debug)]
pub struct SequentialAllocator {
    next: AtomicU64,
}

impl SequentialAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator for SequentialAllocator {
    fn next_id(&self) -> TaskId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        TaskId::from_uuid(Uuid::from_u128(u128::from(n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_ids_are_unique_and_ordered() {
        let ids = SequentialAllocator::starting_at(10);
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(a < b);
        assert_eq!(a.as_uuid(), Uuid::from_u128(10));
    }

    #[test]
    fn test_uuid_v7_ids_are_unique() {
        let ids = UuidV7Allocator;
        let seen: HashSet<TaskId> = (0..1000).map(|_| ids.next_id()).collect();
        assert_eq!(seen.len(), 1000);
    }
}
