//! Pool generation.
//!
//! A pool is one executable program per language implementing every
//! manifold of that language. Pools call each other through the boundary
//! convention `call.<lang> MID ARG... [UID]`, which is also how the nexus
//! reaches them.

mod builder;

pub use builder::PoolBuilder;
