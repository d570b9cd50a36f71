//! Shared type definitions for the runbook scenario engine.
//!
//! The engine, the host CLI, and command catalogs all exchange the generic
//! document tree ([`Node`]) and raw [`Step`] records defined here.

pub mod node;
pub mod step;

pub use node::{Mapping, Node, Scalar};
pub use step::{SectionName, Step};
