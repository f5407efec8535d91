// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Unique identifier for actors in the system.
///
/// # Uniqueness
/// Uses UUID v4 for globally unique identifiers with excellent collision
/// resistance. Identifiers are never reused within the lifetime of a system.
///
/// # Example
/// ```rust
/// use herald_rt::util::ActorId;
///
/// let id1 = ActorId::new();
/// let id2 = ActorId::new();
/// assert_ne!(id1, id2); // Globally unique
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Generate a new random ActorId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create ActorId from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for message envelopes.
///
/// # Example
/// ```rust
/// use herald_rt::util::MessageId;
///
/// let id = MessageId::new();
/// println!("Message ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a new random MessageId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create MessageId from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process identifier for message routing.
///
/// A `Pid` names one actor. The identifier itself is opaque and globally
/// unique within a system; the optional `address` tags the system that owns
/// the actor. A `Pid` with no address names a local actor, a non-empty
/// address names a remote actor reachable through a transport adapter.
///
/// # Example
/// ```rust
/// use herald_rt::util::Pid;
///
/// let local = Pid::local();
/// assert!(local.is_local());
///
/// let remote = Pid::remote("node-2:7101");
/// assert_eq!(remote.address(), Some("node-2:7101"));
/// assert!(!remote.is_local());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pid {
    id: ActorId,
    address: Option<String>,
}

impl Pid {
    /// Create a fresh local process identifier.
    pub fn local() -> Self {
        Self {
            id: ActorId::new(),
            address: None,
        }
    }

    /// Create a fresh process identifier tagged with a remote address.
    pub fn remote(address: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(),
            address: Some(address.into()),
        }
    }

    /// Rebuild a process identifier from its parts (wire decoding).
    pub fn from_parts(id: ActorId, address: Option<String>) -> Self {
        Self { id, address }
    }

    /// Get the actor identifier.
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// Get the remote address, if any.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// A pid with no address names a local actor.
    pub fn is_local(&self) -> bool {
        self.address.is_none()
    }

    /// Return a copy of this pid re-tagged with the given address.
    ///
    /// Used when an envelope crosses systems: the sender pid is rewritten to
    /// carry the local system's address so replies route back.
    pub fn with_address(&self, address: impl Into<String>) -> Self {
        Self {
            id: self.id,
            address: Some(address.into()),
        }
    }

    /// Cache key used by the delivery pipeline: `id@address`, with an empty
    /// address part for local pids.
    pub fn cache_key(&self) -> String {
        match &self.address {
            Some(addr) => format!("{}@{addr}", self.id),
            None => format!("{}@", self.id),
        }
    }
}

impl Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            Some(addr) => write!(f, "{}@{addr}", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}
