//! Levenberg-Marquardt backend over the `levenberg-marquardt` crate.

use crate::error::CalibError;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use log::debug;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};

/// Non-linear least squares problem `min ½‖r(x)‖²`.
pub trait NllsProblem {
    fn num_params(&self) -> usize;
    fn num_residuals(&self) -> usize;
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64>;
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmOptions {
    /// Evaluation budget is `patience * (num_params + 1)`.
    pub patience: usize,
    /// Relative cost reduction below which the solve stops.
    pub ftol: f64,
    /// Relative step size below which the solve stops.
    pub xtol: f64,
    /// Cosine between residuals and Jacobian columns below which the solve stops.
    pub gtol: f64,
    /// Initial trust region bound, relative to the scaled parameter norm.
    pub stepbound: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            patience: 100,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
            stepbound: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ResidualsZero,
    Ftol,
    Xtol,
    Gtol,
    /// No further reduction possible at the requested tolerances.
    Stalled,
    MaxEvaluations,
}

#[derive(Debug, Clone)]
pub struct SolveReport {
    pub evaluations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub termination: Termination,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        !matches!(self.termination, Termination::MaxEvaluations)
    }
}

struct LmWrapper<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<f64>,
}

impl<P: NllsProblem> LeastSquaresProblem<f64, Dyn, Dyn> for LmWrapper<'_, P> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let r = self.problem.residuals(&self.params);
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let j = self.problem.jacobian(&self.params);
        j.iter().all(|v| v.is_finite()).then_some(j)
    }
}

fn cost(r: &DVector<f64>) -> f64 {
    0.5 * r.norm_squared()
}

fn termination_from(reason: TerminationReason) -> Result<Termination, CalibError> {
    match reason {
        TerminationReason::ResidualsZero => Ok(Termination::ResidualsZero),
        TerminationReason::Converged { ftol: true, .. } => Ok(Termination::Ftol),
        TerminationReason::Converged { .. } => Ok(Termination::Xtol),
        TerminationReason::Orthogonal => Ok(Termination::Gtol),
        TerminationReason::LostPatience => Ok(Termination::MaxEvaluations),
        TerminationReason::User(what) => Err(CalibError::SolverFailure(format!(
            "non-finite {what} during the solve"
        ))),
        TerminationReason::Numerical(what) => Err(CalibError::SolverFailure(format!(
            "numerical failure in {what}"
        ))),
        other => {
            debug!("lm stopped early: {other:?}");
            Ok(Termination::Stalled)
        }
    }
}

/// Minimise `problem` from `x0` (MINPACK-style trust region LM).
pub fn levenberg_marquardt<P: NllsProblem>(
    problem: &P,
    x0: DVector<f64>,
    opts: &LmOptions,
) -> Result<(DVector<f64>, SolveReport), CalibError> {
    debug_assert_eq!(x0.len(), problem.num_params());
    let r0 = problem.residuals(&x0);
    debug_assert_eq!(r0.len(), problem.num_residuals());
    if !r0.iter().all(|v| v.is_finite()) {
        return Err(CalibError::SolverFailure(
            "non-finite residuals at the initial guess".into(),
        ));
    }
    let initial_cost = cost(&r0);

    let lm = LevenbergMarquardt::new()
        .with_ftol(opts.ftol)
        .with_xtol(opts.xtol)
        .with_gtol(opts.gtol)
        .with_stepbound(opts.stepbound)
        .with_patience(opts.patience.max(1));

    let (wrapper, report) = lm.minimize(LmWrapper {
        problem,
        params: x0,
    });
    let termination = termination_from(report.termination)?;
    let x = wrapper.params();
    if !x.iter().all(|v| v.is_finite()) {
        return Err(CalibError::SolverFailure("non-finite parameters".into()));
    }
    let final_cost = cost(&problem.residuals(&x));

    debug!(
        "lm finished after {} evaluations ({termination:?}): cost {initial_cost:.6e} -> {final_cost:.6e}",
        report.number_of_evaluations
    );
    Ok((
        x,
        SolveReport {
            evaluations: report.number_of_evaluations,
            initial_cost,
            final_cost,
            termination,
        },
    ))
}
