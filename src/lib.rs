//! Dependency-aware tracking of blueprint work items.
//!
//! A blueprint is a set of definitions, lemmas and theorems with
//! dependency edges between them. [`blueprint::Blueprint`] keeps the graph
//! acyclic, picks the next eligible item, enforces the status lifecycle and
//! splits stuck items into chains of smaller steps. [`store::BlueprintStore`]
//! adds persistence to a Markdown document and serializes mutations.

pub mod audit;
pub mod blueprint;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod store;
pub mod ui;

pub use blueprint::{Advance, Attempts, Blueprint, Kind, Status, SubItemSpec, WorkItem};
pub use error::{BlueprintError, Result};
pub use store::{BlueprintStore, StoreOptions};
