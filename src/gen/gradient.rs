//! Gradient-descent generator built on a vicinity of neighboring solutions.
//!
//! The kernel normalizes the continuous decision space to the unit cube,
//! picks a base solution plus up to *n* linearly independent neighbors
//! (*n* = number of continuous variables), estimates one gradient per
//! objective by solving the delta system with an LU decomposition, and
//! samples candidates along random convex combinations of the negated
//! gradients.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::gen::Generator;
use crate::population::Population;
use crate::solution::{GeneratorTag, SolutionHandle, SolutionRoot};
use crate::stats;
use crate::variable::Problem;

/// Two delta directions closer than this to collinear are rejected so the
/// delta matrix keeps full rank.
const COSINE_PRECISION: f64 = 1e-16;

/// A point of the vicinity: normalized continuous values plus the fitness
/// vector over the numeric objectives.
#[derive(Clone, Debug)]
pub(crate) struct VicinityPoint {
    pub(crate) values: DVector<f64>,
    pub(crate) fitness: Vec<f64>,
}

/// A neighborhood of solutions around a base point, dense enough to
/// estimate per-objective gradients.
pub(crate) struct Vicinity {
    base: VicinityPoint,
    neighbors: Vec<VicinityPoint>,
    deltas: Vec<DVector<f64>>,
}

impl Vicinity {
    pub(crate) fn new(base: VicinityPoint) -> Self {
        Self {
            base,
            neighbors: Vec::new(),
            deltas: Vec::new(),
        }
    }

    /// The number of neighbors needed for a full basis.
    pub(crate) fn required_neighbors(&self) -> usize {
        self.base.values.len()
    }

    /// Whether enough neighbors have been accepted to solve for gradients.
    pub(crate) fn is_complete(&self) -> bool {
        self.neighbors.len() >= self.required_neighbors()
    }

    /// Offers a neighbor. Accepted only while the basis is incomplete, the
    /// dimensions match, and the new delta is not near-collinear with any
    /// existing delta or with any difference between two existing
    /// neighbors.
    pub(crate) fn offer(&mut self, point: VicinityPoint) -> bool {
        let n = self.required_neighbors();
        if self.neighbors.len() >= n {
            return false;
        }
        if point.values.len() != n || point.fitness.len() < self.base.fitness.len() {
            return false;
        }

        let delta = &point.values - &self.base.values;
        if near_collinear(&delta, &delta) {
            // Zero-length delta: the point coincides with the base.
            return false;
        }
        for existing in &self.deltas {
            if near_collinear(&delta, existing) {
                return false;
            }
        }
        for i in 0..self.neighbors.len() {
            for j in (i + 1)..self.neighbors.len() {
                let between = &self.neighbors[j].values - &self.neighbors[i].values;
                let to_point = &point.values - &self.neighbors[i].values;
                if near_collinear(&between, &to_point) {
                    return false;
                }
            }
        }

        self.neighbors.push(point);
        self.deltas.push(delta);
        true
    }

    /// Solves `Δ · g = Δf` for every objective, where row *j* of `Δ` is the
    /// delta of neighbor *j* and `Δf` its fitness difference to the base.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SingularDeltas`] if the delta matrix cannot be
    /// decomposed (or the basis is incomplete).
    pub(crate) fn gradients(&self) -> Result<Vec<DVector<f64>>> {
        let n = self.required_neighbors();
        if !self.is_complete() || n == 0 {
            return Err(Error::SingularDeltas);
        }

        let delta = DMatrix::from_fn(n, n, |row, col| self.deltas[row][col]);
        let lu = delta.lu();

        let objectives = self.base.fitness.len();
        let mut gradients = Vec::with_capacity(objectives);
        for obj in 0..objectives {
            let delta_f = DVector::from_fn(n, |row, _| {
                self.neighbors[row].fitness[obj] - self.base.fitness[obj]
            });
            let gradient = lu.solve(&delta_f).ok_or(Error::SingularDeltas)?;
            if gradient.iter().any(|g| !g.is_finite()) {
                return Err(Error::SingularDeltas);
            }
            gradients.push(gradient);
        }
        Ok(gradients)
    }

    /// Samples `count` candidate value vectors by stepping from the base
    /// along a random convex combination of the descent directions, with an
    /// optional Gaussian spread proportional to the per-dimension standard
    /// deviation of the vicinity.
    pub(crate) fn sample_candidates(
        &self,
        rng: &mut fastrand::Rng,
        count: usize,
        step_size: f64,
        amplitude: f64,
    ) -> Result<Vec<DVector<f64>>> {
        let gradients = self.gradients()?;
        let n = self.required_neighbors();
        let objectives = gradients.len();

        // Per-dimension spread of the vicinity members.
        let std_devs: Vec<f64> = (0..n)
            .map(|dim| {
                let mut series = Vec::with_capacity(self.neighbors.len() + 1);
                series.push(self.base.values[dim]);
                series.extend(self.neighbors.iter().map(|p| p.values[dim]));
                stats::std_dev(&series)
            })
            .collect();

        let mut candidates = Vec::with_capacity(count);
        for _ in 0..count {
            let weights: Vec<f64> = (0..objectives).map(|_| rng.f64()).collect();
            let sum: f64 = weights.iter().sum();
            let mut displacement = DVector::zeros(n);
            for (gradient, &weight) in gradients.iter().zip(&weights) {
                displacement += gradient * (-weight);
            }
            if sum > 0.0 {
                displacement *= step_size / sum;
            }
            let center = &self.base.values + displacement;

            let candidate = if amplitude > 0.0 {
                DVector::from_fn(n, |dim, _| {
                    stats::sample_normal(rng, center[dim], std_devs[dim] * amplitude)
                })
            } else {
                center
            };
            candidates.push(candidate);
        }
        Ok(candidates)
    }
}

/// Whether two vectors are collinear within [`COSINE_PRECISION`], treating
/// degenerate (zero-length) vectors as collinear.
fn near_collinear(a: &DVector<f64>, b: &DVector<f64>) -> bool {
    let norms = a.norm() * b.norm();
    if norms == 0.0 {
        return true;
    }
    let cosine = a.dot(b) / norms;
    1.0 - cosine.abs() < COSINE_PRECISION
}

/// Gradient-descent generator.
///
/// Builds a [`Vicinity`] from rank-biased selections, solves for the
/// per-objective gradients, and proposes candidates downhill of the base
/// solution. When the population cannot supply a full basis or the solve
/// is singular, the batch is empty and the ensemble reallocates.
pub struct GradientDescentGenerator {
    greed: f64,
    step_size: f64,
    amplitude: f64,
    problem: Mutex<Option<Arc<Problem>>>,
    rng: Mutex<fastrand::Rng>,
}

impl GradientDescentGenerator {
    /// Creates a gradient-descent generator with the default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring a [`GradientDescentGenerator`].
    #[must_use]
    pub fn builder() -> GradientDescentGeneratorBuilder {
        GradientDescentGeneratorBuilder::default()
    }

    fn vicinity_point(problem: &Problem, handle: &SolutionHandle) -> VicinityPoint {
        let cont_vars = problem.cont_vars();
        let values = DVector::from_fn(cont_vars.len(), |dim, _| {
            let var = &cont_vars[dim];
            let range = var.range();
            if range > 0.0 {
                (handle.solution().cont_values()[dim] - var.min()) / range
            } else {
                0.0
            }
        });
        let fitness = problem
            .objectives()
            .iter()
            .filter(|o| !o.is_custom())
            .map(|o| handle.fitness(o.index()))
            .collect();
        VicinityPoint { values, fitness }
    }
}

impl Default for GradientDescentGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`GradientDescentGenerator`].
#[derive(Debug, Clone, Default)]
pub struct GradientDescentGeneratorBuilder {
    greed: Option<f64>,
    step_size: Option<f64>,
    amplitude: Option<f64>,
    seed: Option<u64>,
}

impl GradientDescentGeneratorBuilder {
    /// Sets the selection greed used to pick the vicinity. Default: 0.8.
    #[must_use]
    pub fn greed(mut self, greed: f64) -> Self {
        self.greed = Some(greed.clamp(-1.0, 1.0));
        self
    }

    /// Sets the factor applied to the combined descent direction.
    /// Default: 1.0.
    #[must_use]
    pub fn step_size(mut self, step_size: f64) -> Self {
        self.step_size = Some(step_size);
        self
    }

    /// Sets the Gaussian spread factor around the descent target; 0
    /// disables the spread. Default: 0.1.
    #[must_use]
    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = Some(amplitude);
        self
    }

    /// Sets the random seed for reproducibility.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the configured [`GradientDescentGenerator`].
    #[must_use]
    pub fn build(self) -> GradientDescentGenerator {
        let rng = self
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        GradientDescentGenerator {
            greed: self.greed.unwrap_or(0.8),
            step_size: self.step_size.unwrap_or(1.0),
            amplitude: self.amplitude.unwrap_or(0.1),
            problem: Mutex::new(None),
            rng: Mutex::new(rng),
        }
    }
}

impl Generator for GradientDescentGenerator {
    fn id(&self) -> &str {
        "Gradient Descent"
    }

    fn short_id(&self) -> &str {
        "GD"
    }

    fn param_summary(&self) -> String {
        format!(
            "greed = {}; step size = {}; amplitude = {}",
            self.greed, self.step_size, self.amplitude
        )
    }

    fn set_problem(&self, problem: Arc<Problem>) {
        *self.problem.lock() = Some(problem);
    }

    fn generate(&self, population: &Population, count: usize) -> Vec<SolutionRoot> {
        let Some(problem) = self.problem.lock().clone() else {
            return Vec::new();
        };
        let n = problem.cont_vars().len();
        if n == 0 || count == 0 || population.size() == 0 {
            return Vec::new();
        }

        // A full basis needs the base plus n independent neighbors; draw a
        // few spares since collinear picks are rejected.
        let picks = population.select_greedy(3 * (n + 1), self.greed);
        let Some(base) = picks.first() else {
            return Vec::new();
        };

        let mut vicinity = Vicinity::new(Self::vicinity_point(&problem, base));
        for candidate in picks.iter().skip(1) {
            if vicinity.is_complete() {
                break;
            }
            vicinity.offer(Self::vicinity_point(&problem, candidate));
        }
        if !vicinity.is_complete() {
            return Vec::new();
        }

        let mut rng = self.rng.lock();
        let samples = match vicinity.sample_candidates(&mut rng, count, self.step_size, self.amplitude)
        {
            Ok(samples) => samples,
            Err(_) => {
                tracing::debug!("gradient solve failed; returning empty batch");
                return Vec::new();
            }
        };

        // Denormalize into the variable intervals; discrete values are
        // inherited from the base solution.
        let base_disc = base.solution().disc_values().to_vec();
        samples
            .into_iter()
            .map(|values| {
                let cont = problem
                    .cont_vars()
                    .iter()
                    .enumerate()
                    .map(|(dim, var)| var.validate(var.min() + values[dim] * var.range()))
                    .collect();
                SolutionRoot::new(base_disc.clone(), cont, GeneratorTag::Random)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::{Population, PopulationConfig};
    use crate::solution::tests::StubSolution;
    use crate::variable::ContVar;
    use crate::Objective;

    fn point(values: &[f64], fitness: &[f64]) -> VicinityPoint {
        VicinityPoint {
            values: DVector::from_column_slice(values),
            fitness: fitness.to_vec(),
        }
    }

    #[test]
    fn test_vicinity_rejects_collinear_neighbors() {
        let mut vicinity = Vicinity::new(point(&[0.0, 0.0], &[0.0]));
        assert!(vicinity.offer(point(&[1.0, 0.0], &[1.0])));
        // Same direction as the first delta.
        assert!(!vicinity.offer(point(&[2.0, 0.0], &[2.0])));
        // The base itself.
        assert!(!vicinity.offer(point(&[0.0, 0.0], &[0.0])));
        assert!(vicinity.offer(point(&[0.0, 1.0], &[1.0])));
        assert!(vicinity.is_complete());
        // Complete vicinities accept nothing more.
        assert!(!vicinity.offer(point(&[0.5, 0.5], &[1.0])));
    }

    #[test]
    fn test_gradients_of_linear_objective() {
        // f(x, y) = 2x + 3y measured around the origin.
        let mut vicinity = Vicinity::new(point(&[0.0, 0.0], &[0.0]));
        assert!(vicinity.offer(point(&[1.0, 0.0], &[2.0])));
        assert!(vicinity.offer(point(&[0.0, 1.0], &[3.0])));
        let gradients = vicinity.gradients().unwrap();
        assert_eq!(gradients.len(), 1);
        assert!((gradients[0][0] - 2.0).abs() < 1e-12);
        assert!((gradients[0][1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_incomplete_vicinity_is_singular() {
        let mut vicinity = Vicinity::new(point(&[0.0, 0.0], &[0.0]));
        assert!(vicinity.offer(point(&[1.0, 0.0], &[2.0])));
        assert!(matches!(vicinity.gradients(), Err(Error::SingularDeltas)));
    }

    #[test]
    fn test_samples_step_downhill_without_spread() {
        // Single objective increasing along +x: candidates must move to -x.
        let mut vicinity = Vicinity::new(point(&[0.5, 0.5], &[1.0]));
        assert!(vicinity.offer(point(&[0.6, 0.5], &[1.1])));
        assert!(vicinity.offer(point(&[0.5, 0.6], &[1.0])));
        let mut rng = fastrand::Rng::with_seed(13);
        let samples = vicinity.sample_candidates(&mut rng, 20, 0.1, 0.0).unwrap();
        for sample in samples {
            assert!(sample[0] < 0.5, "candidate moved uphill: {sample}");
        }
    }

    #[test]
    fn test_generator_yields_bounded_roots_or_nothing() {
        let problem = crate::variable::Problem::new(
            vec![],
            vec![ContVar::new("x", 0.0, 5.0), ContVar::new("y", 0.0, 3.0)],
            vec![
                Objective::numeric(0, "f1", false),
                Objective::numeric(1, "f2", false),
            ],
        );
        let population = Population::new(PopulationConfig {
            capacity: 12,
            seed: Some(31),
            ..PopulationConfig::default()
        });
        population.set_objectives(problem.objectives().to_vec());
        let mut rng = fastrand::Rng::with_seed(77);
        for i in 0..12u64 {
            let x = rng.f64() * 5.0;
            let y = rng.f64() * 3.0;
            population.offer(Arc::new(SolutionHandle::new(
                i,
                Box::new(StubSolution::full(
                    &format!("g{i}"),
                    vec![],
                    vec![x, y],
                    vec![4.0 * x * x + 4.0 * y * y, (x - 5.0).powi(2) + (y - 5.0).powi(2)],
                )),
                GeneratorTag::Random,
                None,
            )));
        }
        population.force_update();

        let generator = GradientDescentGenerator::builder().seed(3).build();
        generator.set_problem(problem);
        let roots = generator.generate(&population, 6);
        for root in &roots {
            assert!((0.0..=5.0).contains(&root.cont_values[0]));
            assert!((0.0..=3.0).contains(&root.cont_values[1]));
        }
    }

    #[test]
    fn test_generator_without_continuous_variables_is_empty() {
        let problem = crate::variable::Problem::new(
            vec![crate::variable::DiscVar::new("d", 0, 2, true)],
            vec![],
            vec![Objective::numeric(0, "f1", false)],
        );
        let population = Population::new(PopulationConfig::default());
        let generator = GradientDescentGenerator::new();
        generator.set_problem(problem);
        assert!(generator.generate(&population, 4).is_empty());
    }
}
