//! Core traits and types for cellsim.
//!
//! This crate defines the shared abstractions that solvers and simulations
//! build on:
//!
//! - [`Model`]: the contract a compiled model fulfils (sizes, initialisation,
//!   rate evaluation, optional algebraic constraints)
//! - [`Observer`]: receives solver events and optionally returns control actions
//! - [`SolverProperties`] and the property schema ([`PropertySpec`],
//!   [`PropertyKind`], [`Limit`]) used to configure solvers by name
//! - [`SolverError`] and [`ConfigError`]: the failure taxonomy shared by every
//!   solver

mod error;
mod model;
mod observer;
mod properties;
mod schema;

pub use error::{ConfigError, Convergence, Fault, SolverError};
pub use model::{Model, ModelError, Sizes};
pub use observer::Observer;
pub use properties::{PropertyValue, ResolvedProperties, SolverConfig, SolverProperties};
pub use schema::{Limit, PropertyKind, PropertySpec, SolverInfo, SolverKind};
