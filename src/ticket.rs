//! Lamport tickets: the logical clock that totally orders every edit.

use std::cmp::Ordering;
use std::fmt;

/// Identifies one editing actor. 12 opaque bytes, compared lexicographically.
///
/// Rendered as lower-hex everywhere an actor crosses a wire or a log line.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ActorId([u8; 12]);

impl ActorId {
    pub const INITIAL: ActorId = ActorId([0; 12]);
    pub const MAX: ActorId = ActorId([u8::MAX; 12]);

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        ActorId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        use fmt::Write;
        let mut out = String::with_capacity(24);
        for b in self.0 {
            write!(out, "{:02x}", b).unwrap();
        }
        out
    }

    pub fn from_hex(hex: &str) -> Option<ActorId> {
        if hex.len() != 24 {
            return None;
        }
        let mut bytes = [0u8; 12];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let s = std::str::from_utf8(chunk).ok()?;
            bytes[i] = u8::from_str_radix(s, 16).ok()?;
        }
        Some(ActorId(bytes))
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({})", self)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ActorId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ActorId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ActorId::from_hex(&hex)
            .ok_or_else(|| serde::de::Error::custom("actor id must be 24 hex characters"))
    }
}

/// A Lamport timestamp plus the actor that produced it.
///
/// Tickets give a total order over every edit in the system: `lamport` first,
/// then `actor`, then `delimiter` (which separates multiple tickets minted
/// inside a single change). The engine never mints tickets; callers do.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ticket {
    lamport: u64,
    delimiter: u32,
    actor: ActorId,
}

impl Ticket {
    /// Smaller than every ticket a real actor can produce. Used as the ID of
    /// the head sentinel and as the conservative causal bound for actors
    /// absent from a max-created-at map.
    pub const INITIAL: Ticket = Ticket {
        lamport: 0,
        delimiter: 0,
        actor: ActorId::INITIAL,
    };

    /// Saturated ticket; orders after everything. The causal bound used for
    /// locally-executed edits, which delete unconditionally.
    pub const MAX: Ticket = Ticket {
        lamport: u64::MAX,
        delimiter: u32::MAX,
        actor: ActorId::MAX,
    };

    pub const fn new(lamport: u64, delimiter: u32, actor: ActorId) -> Self {
        Ticket {
            lamport,
            delimiter,
            actor,
        }
    }

    pub fn lamport(&self) -> u64 {
        self.lamport
    }

    pub fn delimiter(&self) -> u32 {
        self.delimiter
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Strictly after `other` in the total order.
    pub fn after(&self, other: &Ticket) -> bool {
        self > other
    }
}

impl Ord for Ticket {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lamport
            .cmp(&other.lamport)
            .then_with(|| self.actor.cmp(&other.actor))
            .then_with(|| self.delimiter.cmp(&other.delimiter))
    }
}

impl PartialOrd for Ticket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.lamport, self.delimiter, self.actor)
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticket({})", self)
    }
}
