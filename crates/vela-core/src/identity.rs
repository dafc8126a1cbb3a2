//! Instance identity allocation.
//!
//! Identities come from an allocator owned by the host and handed to each
//! harness at construction, so tests can supply their own sequence.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identity of a harness instance, unique within its allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Creates an identity from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of instance identities.
pub trait IdentityAllocator: Send + Sync + fmt::Debug {
    /// Returns the next identity. Never returns the same value twice.
    fn allocate(&self) -> InstanceId;
}

/// Monotonic counter starting at 1.
#[derive(Debug, Default)]
pub struct SequentialAllocator {
    issued: AtomicU64,
}

impl SequentialAllocator {
    /// Creates an allocator whose first identity is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
        }
    }

    /// Returns how many identities have been issued.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

impl IdentityAllocator for SequentialAllocator {
    fn allocate(&self) -> InstanceId {
        InstanceId(self.issued.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
