//! A plain-text CRDT for collaborative documents.
//!
//! The core data structure is an RGA list with splittable nodes: every insert
//! becomes a node identified by the Lamport ticket of the edit that created
//! it, and range deletes fragment existing nodes in place instead of copying
//! content. Two side indices keep edits fast - a splay tree for visible-offset
//! lookup and an LLRB tree for identifier lookup.

pub mod text;
pub mod ticket;

mod error;
mod ost;

pub use error::TextError;
pub use text::{NodeRecord, NodeView, Nodes, Text, TextNodeId, TextNodePos};
pub use ticket::{ActorId, Ticket};
