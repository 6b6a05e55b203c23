/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! CBC-backed implementation of [`MilpBackend`] via `good_lp`.
//!
//! The backend stages the whole model in memory and lowers it to a fresh CBC
//! problem on every [`MilpBackend::optimize`] call.  Because pinned offsets
//! are plain equality rows and zeroed objective coefficients stay zero in the
//! staging area, re-solving the accumulated model is equivalent to the
//! incremental solve-and-pin flow of a persistent solver handle.
//!
//! Indicator rows are lowered to big-M rows; M is derived from the recorded
//! variable bounds, so it is exactly as large as the row requires and no
//! larger.  OR constraints are lowered to the standard three-row
//! linearization.

use good_lp::solvers::coin_cbc::coin_cbc;
use good_lp::{constraint, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable};
use tracing::debug;

use super::{
    ConstraintRecord, MilpBackend, Sense, SolveParams, SolveStatus, SolverError, VarId, VarKind,
    VarRecord,
};

/// MILP backend solving with CBC through `good_lp`.
#[derive(Debug, Default)]
pub struct CbcBackend {
    vars: Vec<VarRecord>,
    constraints: Vec<ConstraintRecord>,
    values: Vec<Option<i64>>,
}

impl CbcBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest value the linear expression can take under the current
    /// variable bounds.
    fn expr_min(&self, terms: &[(VarId, f64)]) -> f64 {
        terms
            .iter()
            .map(|&(v, c)| {
                if c >= 0.0 {
                    c * self.vars[v].lb as f64
                } else {
                    c * self.vars[v].ub as f64
                }
            })
            .sum()
    }

    /// Largest value the linear expression can take under the current
    /// variable bounds.
    fn expr_max(&self, terms: &[(VarId, f64)]) -> f64 {
        terms
            .iter()
            .map(|&(v, c)| {
                if c >= 0.0 {
                    c * self.vars[v].ub as f64
                } else {
                    c * self.vars[v].lb as f64
                }
            })
            .sum()
    }

    fn expression(terms: &[(VarId, f64)], handles: &[Variable]) -> Expression {
        let mut expr = Expression::from(0.0);
        for &(v, c) in terms {
            expr += c * handles[v];
        }
        expr
    }
}

impl MilpBackend for CbcBackend {
    fn add_var(&mut self, name: &str, kind: VarKind, lb: i64, ub: i64, obj: f64) -> VarId {
        self.vars.push(VarRecord {
            name: name.to_string(),
            kind,
            lb,
            ub,
            obj,
        });
        self.values.push(None);
        self.vars.len() - 1
    }

    fn add_linear(&mut self, name: &str, terms: &[(VarId, f64)], sense: Sense, rhs: i64) {
        self.constraints.push(ConstraintRecord::Linear {
            name: name.to_string(),
            terms: terms.to_vec(),
            sense,
            rhs,
        });
    }

    fn add_indicator(
        &mut self,
        name: &str,
        guard: VarId,
        terms: &[(VarId, f64)],
        sense: Sense,
        rhs: i64,
    ) {
        self.constraints.push(ConstraintRecord::Indicator {
            name: name.to_string(),
            guard,
            terms: terms.to_vec(),
            sense,
            rhs,
        });
    }

    fn add_or(&mut self, name: &str, target: VarId, operands: &[VarId]) {
        self.constraints.push(ConstraintRecord::Or {
            name: name.to_string(),
            target,
            operands: operands.to_vec(),
        });
    }

    fn set_bounds(&mut self, var: VarId, lb: i64, ub: i64) {
        self.vars[var].lb = lb;
        self.vars[var].ub = ub;
    }

    fn set_objective_coeff(&mut self, var: VarId, coeff: f64) {
        self.vars[var].obj = coeff;
    }

    fn optimize(&mut self, params: &SolveParams) -> Result<SolveStatus, SolverError> {
        let mut problem = ProblemVariables::new();
        let handles: Vec<Variable> = self
            .vars
            .iter()
            .map(|rec| {
                problem.add(
                    variable()
                        .integer()
                        .min(rec.lb as f64)
                        .max(rec.ub as f64),
                )
            })
            .collect();

        let mut objective = Expression::from(0.0);
        for (rec, handle) in self.vars.iter().zip(&handles) {
            if rec.obj != 0.0 {
                objective += rec.obj * *handle;
            }
        }

        let mut model = coin_cbc(problem.maximise(objective));
        model.set_parameter("logLevel", "0");
        model.set_parameter("ratioGap", &params.mip_gap.to_string());
        model.set_parameter("seconds", &params.time_limit.to_string());

        for record in &self.constraints {
            match record {
                ConstraintRecord::Linear {
                    terms, sense, rhs, ..
                } => {
                    let expr = Self::expression(terms, &handles);
                    let rhs = *rhs as f64;
                    model.add_constraint(match sense {
                        Sense::Geq => constraint!(expr >= rhs),
                        Sense::Leq => constraint!(expr <= rhs),
                        Sense::Eq => constraint!(expr == rhs),
                    });
                }
                ConstraintRecord::Indicator {
                    guard,
                    terms,
                    sense,
                    rhs,
                    ..
                } => {
                    let rhs = *rhs as f64;
                    match sense {
                        Sense::Geq => {
                            // expr >= rhs - M·(1 - guard)
                            let m = (rhs - self.expr_min(terms)).max(0.0);
                            let mut expr = Self::expression(terms, &handles);
                            expr += -m * handles[*guard];
                            model.add_constraint(constraint!(expr >= rhs - m));
                        }
                        Sense::Leq => {
                            // expr <= rhs + M·(1 - guard)
                            let m = (self.expr_max(terms) - rhs).max(0.0);
                            let mut expr = Self::expression(terms, &handles);
                            expr += m * handles[*guard];
                            model.add_constraint(constraint!(expr <= rhs + m));
                        }
                        Sense::Eq => {
                            let m_low = (rhs - self.expr_min(terms)).max(0.0);
                            let mut low = Self::expression(terms, &handles);
                            low += -m_low * handles[*guard];
                            model.add_constraint(constraint!(low >= rhs - m_low));

                            let m_high = (self.expr_max(terms) - rhs).max(0.0);
                            let mut high = Self::expression(terms, &handles);
                            high += m_high * handles[*guard];
                            model.add_constraint(constraint!(high <= rhs + m_high));
                        }
                    }
                }
                ConstraintRecord::Or {
                    target, operands, ..
                } => {
                    let target = handles[*target];
                    let mut sum = Expression::from(0.0);
                    for &op in operands {
                        let operand = handles[op];
                        sum += operand;
                        model.add_constraint(constraint!(target >= operand));
                    }
                    model.add_constraint(constraint!(target <= sum));
                }
            }
        }

        debug!(
            vars = self.vars.len(),
            constraints = self.constraints.len(),
            time_limit = params.time_limit,
            mip_gap = params.mip_gap,
            "invoking CBC"
        );

        match model.solve() {
            Ok(solution) => {
                for (ix, handle) in handles.iter().enumerate() {
                    self.values[ix] = Some(solution.value(*handle).round() as i64);
                }
                Ok(SolveStatus::Feasible)
            }
            Err(ResolutionError::Infeasible) => Ok(SolveStatus::NoIncumbent),
            Err(e) => Err(SolverError::Backend(e.to_string())),
        }
    }

    fn value(&self, var: VarId) -> Option<i64> {
        self.values[var]
    }

    fn num_vars(&self) -> usize {
        self.vars.len()
    }

    fn num_constraints(&self) -> usize {
        self.constraints.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
