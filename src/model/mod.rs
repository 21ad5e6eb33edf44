//! Data models for sourced entities.
//!
//! - [`RawItem`] / [`NaturalKey`]: one remote entity instance as returned by the source
//! - [`Node`]: the locally materialized, content-addressed form of a raw item

pub mod item;
pub mod node;

pub use item::{NaturalKey, RawItem};
pub use node::{Node, NodeInternal};
