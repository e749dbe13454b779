//! Candidate-solution generators and the ensemble that schedules them.
//!
//! A [`Generator`] turns the current population into a batch of unevaluated
//! [`SolutionRoot`](crate::solution::SolutionRoot)s. The built-in members
//! are a genetic algorithm ([`ga::GaGenerator`]) and a gradient-descent
//! kernel ([`gradient::GradientDescentGenerator`]); additional
//! metaheuristics plug in through the same trait. The
//! [`ensemble::Ensemble`] allocates each cycle's generation budget among
//! the registered generators according to their recent success.

pub mod ensemble;
pub mod ga;
pub mod gradient;

use std::sync::Arc;

use crate::population::Population;
use crate::solution::SolutionRoot;
use crate::variable::Problem;

/// A low-level optimization algorithm that proposes candidate solutions.
///
/// `generate` may be called concurrently from several workers, so
/// implementations keep their mutable state behind a lock. Generators must
/// not mutate population state beyond calling its selection methods, and
/// they signal failure by returning an empty batch — never by panicking.
pub trait Generator: Send + Sync {
    /// The identifier of the generator method.
    fn id(&self) -> &str;

    /// The short identifier used in solution tables.
    fn short_id(&self) -> &str;

    /// A one-line rendering of the generator's parameter values.
    fn param_summary(&self) -> String;

    /// Hands the generator the frozen problem definition. Called once when
    /// the optimization starts, before any `generate` call.
    fn set_problem(&self, problem: Arc<Problem>);

    /// Produces up to `count` candidate roots from the current population.
    ///
    /// An empty result means the generator cannot contribute this cycle
    /// (e.g. the population is too small or a solve failed); the ensemble
    /// compensates on the next cycle.
    fn generate(&self, population: &Population, count: usize) -> Vec<SolutionRoot>;
}
