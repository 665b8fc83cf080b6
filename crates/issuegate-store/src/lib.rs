//! issuegate Store
//!
//! Persistence collaborators consumed by the gate:
//!
//! - [`IssueStore`]: load/save/delete issues
//! - [`SpamLogStore`]: record flagged submissions and flip their verified
//!   flag with a compare-and-set
//! - [`MembershipStore`]: project role and administrator lookups
//!
//! [`MemoryStore`] implements all three on `DashMap` tables and backs the
//! CLI and the test suites.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod memory;
mod traits;

pub use memory::MemoryStore;
pub use traits::{IssueStore, MembershipStore, SpamLogStore, StoreResult};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
