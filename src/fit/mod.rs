//! Per-feature model fitting: primitive, timeout adapter, candidate loop,
//! diagnostics and criterion-based selection.

pub mod adapter;
pub mod candidate;
pub mod diagnostics;
pub mod glm;
pub mod select;

pub use adapter::{fit_bounded, FitError, FitOptions, FitRecord, Retention};
pub use candidate::{fit_candidates, CandidateOutcome, CandidateSet};
pub use diagnostics::{residual_diagnostics, ResidualDiagnostics};
pub use glm::{attempt_fit, Deadline, FitFailure, FittedModel};
pub use select::{select_best, SelectionCriterion, SelectionResult};
