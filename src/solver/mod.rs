/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Narrow MILP backend capability.
//!
//! The constraint model only ever needs a handful of operations: create an
//! integer or binary variable with bounds and an objective coefficient, add a
//! linear row, add a guarded (indicator) row, OR a set of binaries into a
//! target binary, rewrite bounds and objective coefficients, solve, and read
//! values back.  [`MilpBackend`] captures exactly that surface, so the
//! constraint model can be exercised against the in-memory
//! [`RecordingBackend`] in tests and against the CBC-backed
//! [`cbc::CbcBackend`] in production.

pub mod cbc;

use thiserror::Error;

/// Handle of a variable inside one backend.  Dense, allocation order.
pub type VarId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Integer,
    Binary,
}

/// Row sense of a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Geq,
    Leq,
    Eq,
}

/// Per-invocation solver parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveParams {
    /// Relative MIP gap at which the search stops (`0.0` = prove optimality).
    pub mip_gap: f64,
    /// Wall-clock limit for this invocation, in seconds.
    pub time_limit: f64,
}

/// Outcome of one solver invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// At least one incumbent is available; values can be read back.
    Feasible,
    /// The solver finished (or hit its limit) without any incumbent.
    NoIncumbent,
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("solver backend error: {0}")]
    Backend(String),
}

// ── Model records ─────────────────────────────────────────────────────────────

/// Recorded variable state.  Both backends keep these: the recording backend
/// as its whole world, the CBC backend as the staging area it lowers from on
/// every solve.
#[derive(Debug, Clone, PartialEq)]
pub struct VarRecord {
    pub name: String,
    pub kind: VarKind,
    pub lb: i64,
    pub ub: i64,
    pub obj: f64,
}

/// Recorded constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintRecord {
    Linear {
        name: String,
        terms: Vec<(VarId, f64)>,
        sense: Sense,
        rhs: i64,
    },
    /// Row that must hold whenever the binary `guard` is 1.
    Indicator {
        name: String,
        guard: VarId,
        terms: Vec<(VarId, f64)>,
        sense: Sense,
        rhs: i64,
    },
    /// `target = operands[0] ∨ operands[1] ∨ …` over binaries.
    Or {
        name: String,
        target: VarId,
        operands: Vec<VarId>,
    },
}

// ── Capability trait ──────────────────────────────────────────────────────────

pub trait MilpBackend {
    fn add_var(&mut self, name: &str, kind: VarKind, lb: i64, ub: i64, obj: f64) -> VarId;

    fn add_linear(&mut self, name: &str, terms: &[(VarId, f64)], sense: Sense, rhs: i64);

    fn add_indicator(
        &mut self,
        name: &str,
        guard: VarId,
        terms: &[(VarId, f64)],
        sense: Sense,
        rhs: i64,
    );

    fn add_or(&mut self, name: &str, target: VarId, operands: &[VarId]);

    fn set_bounds(&mut self, var: VarId, lb: i64, ub: i64);

    fn set_objective_coeff(&mut self, var: VarId, coeff: f64);

    /// Flush pending model edits.  A no-op for backends that lower lazily.
    fn update(&mut self) {}

    fn optimize(&mut self, params: &SolveParams) -> Result<SolveStatus, SolverError>;

    /// Value of `var` in the current incumbent, if any.
    fn value(&self, var: VarId) -> Option<i64>;

    fn num_vars(&self) -> usize;

    fn num_constraints(&self) -> usize;
}

// ── Recording backend ─────────────────────────────────────────────────────────

/// In-memory backend for constraint-model tests.
///
/// Records every variable and constraint verbatim.  `optimize()` reports each
/// variable at its lower bound (the model's earliest admissible value), or no
/// incumbent at all when [`RecordingBackend::refuse_incumbent`] is set.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub vars: Vec<VarRecord>,
    pub constraints: Vec<ConstraintRecord>,
    pub solves: Vec<SolveParams>,
    pub refuse_incumbent: bool,
    values: Vec<Option<i64>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded constraints of a given family, by name prefix.
    pub fn constraints_named(&self, prefix: &str) -> Vec<&ConstraintRecord> {
        self.constraints
            .iter()
            .filter(|c| {
                let name = match c {
                    ConstraintRecord::Linear { name, .. } => name,
                    ConstraintRecord::Indicator { name, .. } => name,
                    ConstraintRecord::Or { name, .. } => name,
                };
                name.starts_with(prefix)
            })
            .collect()
    }

    pub fn var_named(&self, name: &str) -> Option<(VarId, &VarRecord)> {
        self.vars
            .iter()
            .enumerate()
            .find(|(_, v)| v.name == name)
    }
}

impl MilpBackend for RecordingBackend {
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
        self.solves.push(*params);
        if self.refuse_incumbent {
            return Ok(SolveStatus::NoIncumbent);
        }
        for (ix, var) in self.vars.iter().enumerate() {
            self.values[ix] = Some(var.lb);
        }
        Ok(SolveStatus::Feasible)
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
