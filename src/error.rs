//! Error type shared by construction and insertion.

use core::fmt;
use thiserror::Error;

/// One of the four capabilities a map is parameterized over.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Capability {
    Hash,
    Equals,
    DestroyKey,
    DestroyValue,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Hash => "hash",
            Capability::Equals => "equals",
            Capability::DestroyKey => "destroy_key",
            Capability::DestroyValue => "destroy_value",
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum Error {
    /// A capability was not supplied; no table was created.
    #[error("missing `{0}` capability")]
    MissingCapability(Capability),
    /// The doubled bucket array could not be reserved. The table keeps its
    /// previous bucket array and capacity.
    #[error("failed to allocate a bucket array of {requested} buckets")]
    AllocationFailed { requested: usize },
}
