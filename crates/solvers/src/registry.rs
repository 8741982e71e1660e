//! The solvers that can be selected by name.

use cellsim_core::{ConfigError, SolverInfo, SolverKind};

use crate::{
    nla::newton,
    ode::{bdf, fixed_step},
};

pub const FORWARD_EULER: &str = "Forward Euler";
pub const HEUN: &str = "Heun";
pub const SECOND_ORDER_RUNGE_KUTTA: &str = "Second-order Runge-Kutta";
pub const FOURTH_ORDER_RUNGE_KUTTA: &str = "Fourth-order Runge-Kutta";
pub const BDF: &str = "BDF";
pub const NEWTON: &str = "Newton";

static SOLVERS: [SolverInfo; 6] = [
    SolverInfo {
        name: FORWARD_EULER,
        kind: SolverKind::Ode,
        properties: &fixed_step::PROPERTIES,
    },
    SolverInfo {
        name: HEUN,
        kind: SolverKind::Ode,
        properties: &fixed_step::PROPERTIES,
    },
    SolverInfo {
        name: SECOND_ORDER_RUNGE_KUTTA,
        kind: SolverKind::Ode,
        properties: &fixed_step::PROPERTIES,
    },
    SolverInfo {
        name: FOURTH_ORDER_RUNGE_KUTTA,
        kind: SolverKind::Ode,
        properties: &fixed_step::PROPERTIES,
    },
    SolverInfo {
        name: BDF,
        kind: SolverKind::Ode,
        properties: &bdf::PROPERTIES,
    },
    SolverInfo {
        name: NEWTON,
        kind: SolverKind::Nla,
        properties: &newton::PROPERTIES,
    },
];

/// Returns every registered solver.
#[must_use]
pub fn solvers() -> &'static [SolverInfo] {
    &SOLVERS
}

/// Returns the registered solvers of `kind`.
pub fn solvers_of(kind: SolverKind) -> impl Iterator<Item = &'static SolverInfo> {
    SOLVERS.iter().filter(move |info| info.kind == kind)
}

/// Looks up the solver called `name`, which must be of `kind`.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownSolver`] if no solver has that name, or
/// [`ConfigError::WrongKind`] if it has a different kind.
pub fn find(name: &str, kind: SolverKind) -> Result<&'static SolverInfo, ConfigError> {
    let info = SOLVERS
        .iter()
        .find(|info| info.name == name)
        .ok_or_else(|| ConfigError::UnknownSolver(name.to_string()))?;

    if info.kind != kind {
        return Err(ConfigError::WrongKind {
            name: name.to_string(),
            expected: kind,
        });
    }

    Ok(info)
}
