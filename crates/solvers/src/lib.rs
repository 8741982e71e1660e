//! Solvers that advance cellsim models.
//!
//! A simulation drives exactly one [`Solver`], chosen by name from the
//! [`registry`] when the simulation starts:
//!
//! - [`Solver::Ode`]: an [`OdeSolver`] integrates the states
//! - [`Solver::Dae`]: an [`OdeSolver`] whose rate evaluations first solve the
//!   model's algebraic unknowns with an [`NlaSolver`]
//! - [`Solver::None`]: for models without states, time simply advances
//!
//! Every solver follows the same lifecycle: [`Solver::initialize`] once at the
//! start time, [`Solver::solve`] repeatedly towards increasing targets, and
//! [`Solver::finalize`] to release its workspace.

mod dae;
mod linalg;
mod solver;
mod system;

pub mod nla;
pub mod ode;
pub mod registry;

#[cfg(test)]
mod test_utils;

pub use dae::{Constraints, DaeSolver};
pub use nla::{NlaSolver, NonlinearSystem};
pub use ode::OdeSolver;
pub use solver::{NoSolver, Solver};
pub use system::RateSystem;
