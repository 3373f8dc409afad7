//! Location-transparent actor addresses.

use std::fmt;
use std::sync::Arc;

/// A process identifier: system address plus a process id.
///
/// A `Pid` is a pure value — it never owns or caches the process behind it.
/// Resolution happens in the system's registry on every send, so a stale
/// `Pid` simply routes to dead letters.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Pid {
    address: Arc<str>,
    id: u64,
}

impl Pid {
    pub(crate) fn new(address: Arc<str>, id: u64) -> Self {
        Self { address, id }
    }

    /// The owning system's address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The process id within that system.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pid({}/{})", self.address, self.id)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.id)
    }
}
