//! MAESTRO-MO: a multi-algorithm ensemble for multi-objective global
//! optimization.
//!
//! Given a problem with mixed discrete and continuous decision variables
//! and two or more objectives, the optimizer searches for the Pareto-optimal
//! set. The user supplies the evaluation routine (the [`Evaluator`] /
//! [`Solution`] pair); the framework drives the search with a worker pool
//! that alternates among an ensemble of metaheuristic generators.
//!
//! The moving parts:
//!
//! - a **non-dominated [`Population`]** that merges newly evaluated
//!   candidates in groups, sorts them into Pareto fronts with fast
//!   non-dominated sorting, prunes by crowding distance, and offers
//!   rank-weighted selection;
//! - an **[`Ensemble`](gen::ensemble::Ensemble) scheduler** that allocates
//!   each cycle's generation budget among the registered generators (a
//!   genetic algorithm and a gradient-descent kernel by default) based on
//!   their recent contribution to the first front;
//! - an **evaluation worker pool** inside the [`Optimizer`] that pipelines
//!   generation, user evaluation, and population updates, with evaluation
//!   timeouts and cooperative termination.
//!
//! # Quick start
//!
//! Minimize the two Binh-and-Korn objectives over `x ∈ [0, 5]`,
//! `y ∈ [0, 3]`:
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use maestro_mo::{Evaluator, Extra, NopMonitor, Optimizer, Solution};
//!
//! struct BakSolution {
//!     id: String,
//!     cont: Vec<f64>,
//!     objectives: [f64; 2],
//! }
//!
//! impl Solution for BakSolution {
//!     fn id(&self) -> String {
//!         self.id.clone()
//!     }
//!     fn disc_values(&self) -> &[i64] {
//!         &[]
//!     }
//!     fn cont_values(&self) -> &[f64] {
//!         &self.cont
//!     }
//!     fn fitness(&self, objective: usize) -> f64 {
//!         self.objectives.get(objective).copied().unwrap_or(f64::NAN)
//!     }
//! }
//!
//! struct BakEvaluator;
//!
//! impl Evaluator for BakEvaluator {
//!     fn create_new(
//!         &self,
//!         index: u64,
//!         _disc: &[i64],
//!         cont: &[f64],
//!         _extra: Option<&Extra>,
//!     ) -> Box<dyn Solution> {
//!         let (x, y) = (cont[0], cont[1]);
//!         Box::new(BakSolution {
//!             id: format!("Solution {index}"),
//!             cont: cont.to_vec(),
//!             objectives: [
//!                 4.0 * x * x + 4.0 * y * y,
//!                 (x - 5.0).powi(2) + (y - 5.0).powi(2),
//!             ],
//!         })
//!     }
//! }
//!
//! let optimizer = Optimizer::new(
//!     "Binh and Korn function",
//!     1,
//!     Arc::new(BakEvaluator),
//!     Arc::new(NopMonitor),
//!     true,
//! );
//! optimizer.set_population_capacity(50);
//! optimizer.add_cont_var("x", 0.0, 5.0);
//! optimizer.add_cont_var("y", 0.0, 3.0);
//! optimizer.add_numeric_objective(0, "Objective 1", false);
//! optimizer.add_numeric_objective(1, "Objective 2", false);
//! optimizer.optimize(Duration::from_secs(5), 1000).unwrap();
//!
//! for solution in optimizer.first_front() {
//!     println!("{}: f1 = {}", solution.id(), solution.fitness(0));
//! }
//! ```
//!
//! # Custom generators
//!
//! Implement [`gen::Generator`] and register it with
//! [`Optimizer::add_generator`]; the ensemble will fold it into its budget
//! allocation alongside the built-in members.

mod error;
mod front;
mod monitor;
mod objective;
mod optimizer;
mod population;
mod solution;
mod stats;
mod variable;

pub mod gen;
pub mod report;

pub use error::{Error, Result};
pub use front::Front;
pub use gen::ensemble::{Ensemble, EnsembleConfig, GenerationRecord, GeneratorInfo};
pub use gen::ga::{GaGenerator, GaGeneratorBuilder, UniformMethod};
pub use gen::gradient::{GradientDescentGenerator, GradientDescentGeneratorBuilder};
pub use gen::Generator;
pub use monitor::{Monitor, NopMonitor};
pub use objective::{Objective, ObjectiveKind};
pub use optimizer::{Optimizer, MAX_TIMEOUT};
pub use population::{fast_non_dominated_sort, Population, PopulationConfig, DEFAULT_CAPACITY};
pub use report::{read_report, write_report, ReportOptions};
pub use solution::{Evaluator, Extra, GeneratorTag, Solution, SolutionHandle, SolutionRoot};
pub use variable::{ContVar, DiscVar, Problem};
