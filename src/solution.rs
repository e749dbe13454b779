//! The user solution contract and the engine-side solution handle.
//!
//! The user supplies two things: an [`Evaluator`] that maps a decision
//! vector to an evaluated [`Solution`], and the `Solution` itself, which
//! exposes fitness values, a validity flag, report fields, and an optional
//! convergence signal. There is no hierarchy — both are plain traits.
//!
//! Inside the engine, every evaluated solution is wrapped in a
//! [`SolutionHandle`] carrying the monotone solution index, the tag of the
//! generator that produced it, and the append-only rank history.

use core::cmp::Ordering;
use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::objective::Objective;

/// Opaque payload a user may attach to a predefined solution root; handed
/// back verbatim to [`Evaluator::create_new`].
pub type Extra = Arc<dyn Any + Send + Sync>;

/// An evaluated solution to a multi-objective optimization problem.
///
/// Implemented by the user. All value accessors must stay consistent with
/// the creation order of the decision variables.
pub trait Solution: Send + Sync {
    /// A unique, non-empty identifier for the solution.
    fn id(&self) -> String;

    /// The values of the discrete decision variables.
    fn disc_values(&self) -> &[i64];

    /// The values of the continuous decision variables.
    fn cont_values(&self) -> &[f64];

    /// Whether the solution was successfully created. Invalid solutions are
    /// discarded and do not count toward the solution limit.
    fn is_valid(&self) -> bool {
        true
    }

    /// Tab-separated report fields matching
    /// [`Evaluator::report_header`].
    fn report(&self) -> String {
        String::new()
    }

    /// The fitness value for the given objective index. May be NaN to mark
    /// the value as worse than any number.
    fn fitness(&self, objective: usize) -> f64;

    /// Custom comparison for objectives of kind
    /// [`Custom`](crate::objective::ObjectiveKind::Custom). `Greater` means
    /// this solution is fitter than `other`.
    fn compare_to(&self, objective: usize, other: &dyn Solution) -> Ordering {
        let _ = (objective, other);
        Ordering::Equal
    }

    /// Whether the optimization should stop because of this solution
    /// (e.g. a target was reached).
    fn converged(&self) -> bool {
        false
    }
}

/// The user-provided factory that evaluates decision vectors.
///
/// Called concurrently from the worker pool; implementations must be
/// thread-safe. A panicking evaluation is caught, logged, and discarded.
pub trait Evaluator: Send + Sync {
    /// Evaluates a decision vector and returns the resulting solution.
    ///
    /// `index` is a consecutive integer that may be used to build the
    /// solution id. `extra` carries the payload of a user-predefined root,
    /// if any.
    fn create_new(
        &self,
        index: u64,
        disc_values: &[i64],
        cont_values: &[f64],
        extra: Option<&Extra>,
    ) -> Box<dyn Solution>;

    /// Tab-separated header matching [`Solution::report`]. Used for the
    /// hall-of-fame log and the report tables.
    fn report_header(&self) -> String {
        String::new()
    }
}

/// Identifies what produced a solution root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GeneratorTag {
    /// Sampled uniformly at random during population seeding.
    Random,
    /// Injected by the user before the optimization started.
    Predefined,
    /// Produced by the ensemble generator with this index.
    Generator(usize),
}

/// An unevaluated candidate: a decision vector plus provenance.
#[derive(Clone)]
pub struct SolutionRoot {
    /// Values for the discrete decision variables.
    pub disc_values: Vec<i64>,
    /// Values for the continuous decision variables.
    pub cont_values: Vec<f64>,
    /// What produced this root.
    pub generator: GeneratorTag,
    /// Optional user label; replaces the generator id in reports.
    pub label: Option<String>,
    /// Optional user payload forwarded to the evaluator.
    pub extra: Option<Extra>,
}

impl SolutionRoot {
    /// Creates a root with the given decision vector and no provenance
    /// beyond the generator tag.
    #[must_use]
    pub fn new(disc_values: Vec<i64>, cont_values: Vec<f64>, generator: GeneratorTag) -> Self {
        Self {
            disc_values,
            cont_values,
            generator,
            label: None,
            extra: None,
        }
    }

    /// Creates a user-predefined root.
    #[must_use]
    pub fn predefined(disc_values: Vec<i64>, cont_values: Vec<f64>) -> Self {
        Self::new(disc_values, cont_values, GeneratorTag::Predefined)
    }

    /// Attaches a label identifying the resulting solution in reports.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attaches an opaque payload forwarded to the evaluator.
    #[must_use]
    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Engine-side wrapper around an evaluated solution.
///
/// The index is assigned once, when the root is offered for evaluation, and
/// never changes. The rank history receives one entry per population update
/// the solution took part in: its 1-based front rank, or -1 on eviction.
pub struct SolutionHandle {
    index: u64,
    solution: Box<dyn Solution>,
    generator: GeneratorTag,
    label: Option<String>,
    rank_history: Mutex<Vec<i32>>,
}

impl SolutionHandle {
    /// Wraps an evaluated solution.
    #[must_use]
    pub fn new(
        index: u64,
        solution: Box<dyn Solution>,
        generator: GeneratorTag,
        label: Option<String>,
    ) -> Self {
        Self {
            index,
            solution,
            generator,
            label,
            rank_history: Mutex::new(Vec::new()),
        }
    }

    /// The monotone solution index assigned on offer.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// The wrapped user solution.
    #[must_use]
    pub fn solution(&self) -> &dyn Solution {
        self.solution.as_ref()
    }

    /// What produced this solution.
    #[must_use]
    pub fn generator(&self) -> &GeneratorTag {
        &self.generator
    }

    /// The user label of the originating root, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The identifier of the wrapped solution.
    #[must_use]
    pub fn id(&self) -> String {
        self.solution.id()
    }

    /// The fitness value for the given objective index.
    #[must_use]
    pub fn fitness(&self, objective: usize) -> f64 {
        self.solution.fitness(objective)
    }

    /// The current rank: the last rank-history entry, or -1 if the solution
    /// never entered the population.
    #[must_use]
    pub fn rank(&self) -> i32 {
        self.rank_history.lock().last().copied().unwrap_or(-1)
    }

    /// A copy of the full rank history.
    #[must_use]
    pub fn rank_history(&self) -> Vec<i32> {
        self.rank_history.lock().clone()
    }

    pub(crate) fn push_rank(&self, rank: i32) {
        self.rank_history.lock().push(rank);
    }

    /// Pareto-dominance between two solutions under the given objectives.
    ///
    /// Returns a positive count of winning objectives if `self` dominates
    /// `other`, the negated count if `other` dominates `self`, and 0 when
    /// neither dominates.
    #[must_use]
    pub fn dominance(&self, other: &SolutionHandle, objectives: &[Objective]) -> i32 {
        let mut better = 0i32;
        let mut worse = 0i32;
        for objective in objectives {
            match objective.compare(self.solution(), other.solution()) {
                Ordering::Greater => better += 1,
                Ordering::Less => worse += 1,
                Ordering::Equal => {}
            }
            if better > 0 && worse > 0 {
                return 0;
            }
        }
        if better > 0 && worse > 0 {
            0
        } else if better > 0 {
            better
        } else {
            -worse
        }
    }
}
