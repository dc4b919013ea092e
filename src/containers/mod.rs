//! Containers: units that own and drive children.
//!
//! - [`Sequence`] ordered; one child at a time, halts on first failure
//! - [`Group`] unordered; all children at once, mostly a namespace
//!
//! Both adopt children by attaching a completion listener that reports the
//! child's index over the container's own notice channel. A single driver
//! task per container consumes those notices, so child outcomes are applied
//! serially.

mod group;
mod sequence;

pub use group::Group;
pub use sequence::Sequence;
