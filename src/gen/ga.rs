//! Genetic-algorithm generator: rank-biased parent selection, mixed
//! point/uniform crossover, and per-variable mutation operators.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::gen::Generator;
use crate::population::Population;
use crate::solution::{GeneratorTag, SolutionHandle, SolutionRoot};
use crate::stats;
use crate::variable::{ContVar, DiscVar, Problem};

/// Uniform-crossover blending method for continuous variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformMethod {
    /// Copy the value of one parent, chosen with probability `p_uniform`.
    EitherOr,
    /// Sample uniformly from the parents' value range extended by
    /// `unif_dist_param`, clamped to the variable bounds.
    UniformDistribution,
    /// Sample a normal centered at one parent's value with standard
    /// deviation `unif_dist_param * |v2 - v1|`, clamped.
    NormalDistribution,
}

/// Genetic-algorithm generator.
///
/// Each offspring draws two parents through the population's rank-weighted
/// selection, builds its discrete and continuous vectors independently via
/// crossover, and then mutates each position with a small probability.
pub struct GaGenerator {
    greed: f64,
    points: usize,
    point_uniform: f64,
    p_uniform: f64,
    unif_method: UniformMethod,
    unif_dist_param: f64,
    mutation_prob: f64,
    random_mutation: f64,
    adjacent_mutation: f64,
    boundary_mutation: f64,
    gaussian_mutation: f64,
    problem: Mutex<Option<Arc<Problem>>>,
    rng: Mutex<fastrand::Rng>,
}

impl GaGenerator {
    /// Creates a GA generator with the default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring a [`GaGenerator`].
    #[must_use]
    pub fn builder() -> GaGeneratorBuilder {
        GaGeneratorBuilder::default()
    }
}

impl Default for GaGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`GaGenerator`].
#[derive(Debug, Clone, Default)]
pub struct GaGeneratorBuilder {
    greed: Option<f64>,
    points: Option<usize>,
    point_uniform: Option<f64>,
    p_uniform: Option<f64>,
    unif_method: Option<UniformMethod>,
    unif_dist_param: Option<f64>,
    mutation_prob: Option<f64>,
    random_mutation: Option<f64>,
    adjacent_mutation: Option<f64>,
    boundary_mutation: Option<f64>,
    gaussian_mutation: Option<f64>,
    seed: Option<u64>,
}

impl GaGeneratorBuilder {
    /// Sets the selection greed in `[-1, 1]`. Default: 0.5.
    #[must_use]
    pub fn greed(mut self, greed: f64) -> Self {
        self.greed = Some(greed.clamp(-1.0, 1.0));
        self
    }

    /// Sets the number of crossover split points. Default: 1.
    #[must_use]
    pub fn points(mut self, points: usize) -> Self {
        self.points = Some(points);
        self
    }

    /// Sets the probability of uniform (vs point) crossover per partition.
    /// Default: 0.5.
    #[must_use]
    pub fn point_uniform(mut self, prob: f64) -> Self {
        self.point_uniform = Some(prob.clamp(0.0, 1.0));
        self
    }

    /// Sets the probability of inheriting from parent 1 in uniform
    /// crossover. Default: 0.5.
    #[must_use]
    pub fn p_uniform(mut self, prob: f64) -> Self {
        self.p_uniform = Some(prob.clamp(0.0, 1.0));
        self
    }

    /// Sets the uniform-crossover method for continuous variables.
    /// Default: [`UniformMethod::EitherOr`].
    #[must_use]
    pub fn unif_method(mut self, method: UniformMethod) -> Self {
        self.unif_method = Some(method);
        self
    }

    /// Sets the spread parameter of the distribution-based uniform
    /// crossover methods. Default: 0.2.
    #[must_use]
    pub fn unif_dist_param(mut self, param: f64) -> Self {
        self.unif_dist_param = Some(param);
        self
    }

    /// Sets the per-position mutation probability. Default: 0.05.
    #[must_use]
    pub fn mutation_prob(mut self, prob: f64) -> Self {
        self.mutation_prob = Some(prob.clamp(0.0, 1.0));
        self
    }

    /// Sets the weight of the random mutation operator for scalar discrete
    /// variables. Default: 1.0.
    #[must_use]
    pub fn random_mutation(mut self, weight: f64) -> Self {
        self.random_mutation = Some(weight);
        self
    }

    /// Sets the weight of the adjacent (±1) mutation operator. Default: 1.0.
    #[must_use]
    pub fn adjacent_mutation(mut self, weight: f64) -> Self {
        self.adjacent_mutation = Some(weight);
        self
    }

    /// Sets the weight of the boundary mutation operator. Default: 1.0.
    #[must_use]
    pub fn boundary_mutation(mut self, weight: f64) -> Self {
        self.boundary_mutation = Some(weight);
        self
    }

    /// Sets the Gaussian mutation spread for continuous variables as a
    /// fraction of the variable range; NaN selects uniform mutation.
    /// Default: 0.05.
    #[must_use]
    pub fn gaussian_mutation(mut self, std_dev_fraction: f64) -> Self {
        self.gaussian_mutation = Some(std_dev_fraction);
        self
    }

    /// Sets the random seed for reproducibility.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the configured [`GaGenerator`].
    #[must_use]
    pub fn build(self) -> GaGenerator {
        let rng = self
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        GaGenerator {
            greed: self.greed.unwrap_or(0.5),
            points: self.points.unwrap_or(1),
            point_uniform: self.point_uniform.unwrap_or(0.5),
            p_uniform: self.p_uniform.unwrap_or(0.5),
            unif_method: self.unif_method.unwrap_or(UniformMethod::EitherOr),
            unif_dist_param: self.unif_dist_param.unwrap_or(0.2),
            mutation_prob: self.mutation_prob.unwrap_or(0.05),
            random_mutation: self.random_mutation.unwrap_or(1.0),
            adjacent_mutation: self.adjacent_mutation.unwrap_or(1.0),
            boundary_mutation: self.boundary_mutation.unwrap_or(1.0),
            gaussian_mutation: self.gaussian_mutation.unwrap_or(0.05),
            problem: Mutex::new(None),
            rng: Mutex::new(rng),
        }
    }
}

impl Generator for GaGenerator {
    fn id(&self) -> &str {
        "Genetic Algorithm"
    }

    fn short_id(&self) -> &str {
        "GA"
    }

    fn param_summary(&self) -> String {
        let method = match self.unif_method {
            UniformMethod::EitherOr => "either-or",
            UniformMethod::UniformDistribution => "uniform distribution",
            UniformMethod::NormalDistribution => "normal distribution",
        };
        format!(
            "greed = {}; crossover points = {}; uniform crossover prob = {}; \
             parent 1 prob = {}; uniform method (cont) = {method}; \
             distribution param = {}; mutation prob = {}; \
             random mut weight = {}; adjacent mut weight = {}; \
             boundary mut weight = {}; gaussian mut st. dev. = {}",
            self.greed,
            self.points,
            self.point_uniform,
            self.p_uniform,
            self.unif_dist_param,
            self.mutation_prob,
            self.random_mutation,
            self.adjacent_mutation,
            self.boundary_mutation,
            self.gaussian_mutation,
        )
    }

    fn set_problem(&self, problem: Arc<Problem>) {
        *self.problem.lock() = Some(problem);
    }

    fn generate(&self, population: &Population, count: usize) -> Vec<SolutionRoot> {
        let Some(problem) = self.problem.lock().clone() else {
            return Vec::new();
        };
        if population.size() == 0
            || problem.disc_vars().len() + problem.cont_vars().len() == 0
            || count == 0
        {
            return Vec::new();
        }

        let parents = population.select_greedy(2 * count, self.greed);
        if parents.len() < 2 * count {
            return Vec::new();
        }

        let mut rng = self.rng.lock();
        let mut roots = Vec::with_capacity(count);
        for pair in parents.chunks_exact(2) {
            let disc = self.child_disc_values(&mut rng, &problem, &pair[0], &pair[1]);
            let cont = self.child_cont_values(&mut rng, &problem, &pair[0], &pair[1]);
            roots.push(SolutionRoot::new(disc, cont, GeneratorTag::Random));
        }
        roots
    }
}

impl GaGenerator {
    /// Sorted split fractions partitioning a value vector of length `len`
    /// into `points + 1` contiguous ranges, expressed as end offsets.
    fn partition_bounds(&self, rng: &mut fastrand::Rng, len: usize) -> Vec<usize> {
        let mut fractions: Vec<f64> = (0..self.points).map(|_| rng.f64()).collect();
        fractions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mut bounds: Vec<usize> = fractions
            .iter()
            .map(|f| (f * len as f64) as usize)
            .collect();
        bounds.push(len);
        bounds
    }

    fn child_disc_values(
        &self,
        rng: &mut fastrand::Rng,
        problem: &Problem,
        parent1: &SolutionHandle,
        parent2: &SolutionHandle,
    ) -> Vec<i64> {
        let vars = problem.disc_vars();
        if vars.is_empty() {
            return Vec::new();
        }
        let v1 = parent1.solution().disc_values();
        let v2 = parent2.solution().disc_values();
        let mut child = Vec::with_capacity(vars.len());

        // Crossover: each partition is either point mode (alternating
        // parents) or uniform mode (per-variable parent pick).
        let bounds = self.partition_bounds(rng, vars.len());
        let mut var = 0usize;
        for (partition, &end) in bounds.iter().enumerate() {
            let uniform = rng.f64() < self.point_uniform;
            while var < end {
                let value = if uniform {
                    if rng.f64() < self.p_uniform { v1[var] } else { v2[var] }
                } else if partition % 2 == 0 {
                    v1[var]
                } else {
                    v2[var]
                };
                child.push(value);
                var += 1;
            }
        }

        // Mutation.
        for (value, variable) in child.iter_mut().zip(vars) {
            if rng.f64() < self.mutation_prob {
                *value = self.mutate_disc(rng, variable, *value);
            }
        }
        child
    }

    fn mutate_disc(&self, rng: &mut fastrand::Rng, variable: &DiscVar, value: i64) -> i64 {
        let sum = self.random_mutation + self.adjacent_mutation + self.boundary_mutation;
        // Non-scalar variables have no meaningful order: always resample.
        let operator = if variable.is_scalar() { rng.f64() * sum } else { 0.0 };
        if operator <= self.random_mutation {
            variable.sample(rng)
        } else if operator < self.random_mutation + self.adjacent_mutation {
            let step = if rng.bool() { 1 } else { -1 };
            variable.validate(value + step)
        } else if rng.bool() {
            variable.min()
        } else {
            variable.max()
        }
    }

    fn child_cont_values(
        &self,
        rng: &mut fastrand::Rng,
        problem: &Problem,
        parent1: &SolutionHandle,
        parent2: &SolutionHandle,
    ) -> Vec<f64> {
        let vars = problem.cont_vars();
        if vars.is_empty() {
            return Vec::new();
        }
        let v1 = parent1.solution().cont_values();
        let v2 = parent2.solution().cont_values();
        let mut child = Vec::with_capacity(vars.len());

        let bounds = self.partition_bounds(rng, vars.len());
        let mut var = 0usize;
        for (partition, &end) in bounds.iter().enumerate() {
            let uniform = rng.f64() < self.point_uniform;
            while var < end {
                let value = if uniform {
                    self.blend_cont(rng, &vars[var], v1[var], v2[var])
                } else if partition % 2 == 0 {
                    v1[var]
                } else {
                    v2[var]
                };
                child.push(value);
                var += 1;
            }
        }

        for (value, variable) in child.iter_mut().zip(vars) {
            if rng.f64() < self.mutation_prob {
                *value = self.mutate_cont(rng, variable, *value);
            }
        }
        child
    }

    /// Uniform-crossover blend of one continuous position.
    fn blend_cont(&self, rng: &mut fastrand::Rng, variable: &ContVar, v1: f64, v2: f64) -> f64 {
        match self.unif_method {
            UniformMethod::EitherOr => {
                if rng.f64() < self.p_uniform { v1 } else { v2 }
            }
            UniformMethod::UniformDistribution => {
                let margin = self.unif_dist_param * (v2 - v1).abs() / 2.0;
                let low = variable.min().max(v1.min(v2) - margin);
                let high = variable.max().min(v1.max(v2) + margin);
                if high > low {
                    stats::f64_range(rng, low, high)
                } else {
                    low
                }
            }
            UniformMethod::NormalDistribution => {
                let mean = if rng.f64() < self.p_uniform { v1 } else { v2 };
                let std_dev = self.unif_dist_param * (v2 - v1).abs();
                variable.validate(stats::sample_normal(rng, mean, std_dev))
            }
        }
    }

    fn mutate_cont(&self, rng: &mut fastrand::Rng, variable: &ContVar, value: f64) -> f64 {
        if self.gaussian_mutation.is_nan() {
            variable.sample(rng)
        } else {
            let std_dev = self.gaussian_mutation * variable.range();
            variable.validate(stats::sample_normal(rng, value, std_dev))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::{Population, PopulationConfig};
    use crate::solution::tests::StubSolution;
    use crate::variable::Problem;
    use crate::Objective;

    fn setup() -> (Arc<Population>, Arc<Problem>) {
        let problem = Problem::new(
            vec![DiscVar::new("d", 0, 10, true)],
            vec![ContVar::new("x", 0.0, 5.0), ContVar::new("y", 0.0, 3.0)],
            vec![
                Objective::numeric(0, "f1", false),
                Objective::numeric(1, "f2", false),
            ],
        );
        let population = Population::new(PopulationConfig {
            capacity: 10,
            seed: Some(5),
            ..PopulationConfig::default()
        });
        population.set_objectives(problem.objectives().to_vec());
        for i in 0..10u64 {
            let x = f64::from(i as u32) * 0.5;
            population.offer(Arc::new(SolutionHandle::new(
                i,
                Box::new(StubSolution::full(
                    &format!("s{i}"),
                    vec![i64::try_from(i).unwrap()],
                    vec![x, 3.0 - x * 0.5],
                    vec![x, 5.0 - x],
                )),
                GeneratorTag::Random,
                None,
            )));
        }
        population.force_update();
        (population, problem)
    }

    #[test]
    fn test_generates_requested_count_within_bounds() {
        let (population, problem) = setup();
        let ga = GaGenerator::builder().seed(17).build();
        ga.set_problem(Arc::clone(&problem));

        let roots = ga.generate(&population, 8);
        assert_eq!(roots.len(), 8);
        for root in &roots {
            assert_eq!(root.disc_values.len(), 1);
            assert_eq!(root.cont_values.len(), 2);
            assert!((0..=9).contains(&root.disc_values[0]));
            assert!((0.0..=5.0).contains(&root.cont_values[0]));
            assert!((0.0..=3.0).contains(&root.cont_values[1]));
        }
    }

    #[test]
    fn test_empty_population_yields_empty_batch() {
        let problem = Problem::new(vec![], vec![ContVar::new("x", 0.0, 1.0)], vec![]);
        let population = Population::new(PopulationConfig::default());
        let ga = GaGenerator::builder().seed(1).build();
        ga.set_problem(problem);
        assert!(ga.generate(&population, 4).is_empty());
    }

    #[test]
    fn test_unbound_generator_yields_empty_batch() {
        let (population, _) = setup();
        let ga = GaGenerator::new();
        assert!(ga.generate(&population, 4).is_empty());
    }

    #[test]
    fn test_distribution_methods_stay_in_bounds() {
        for method in [
            UniformMethod::UniformDistribution,
            UniformMethod::NormalDistribution,
        ] {
            let (population, problem) = setup();
            let ga = GaGenerator::builder()
                .seed(23)
                .point_uniform(1.0)
                .unif_method(method)
                .mutation_prob(0.5)
                .build();
            ga.set_problem(problem);
            for root in ga.generate(&population, 50) {
                assert!((0.0..=5.0).contains(&root.cont_values[0]), "{method:?}");
                assert!((0.0..=3.0).contains(&root.cont_values[1]), "{method:?}");
            }
        }
    }

    #[test]
    fn test_uniform_mutation_when_gaussian_is_nan() {
        let (population, problem) = setup();
        let ga = GaGenerator::builder()
            .seed(29)
            .mutation_prob(1.0)
            .gaussian_mutation(f64::NAN)
            .build();
        ga.set_problem(problem);
        for root in ga.generate(&population, 30) {
            assert!((0.0..=5.0).contains(&root.cont_values[0]));
            assert!((0.0..=3.0).contains(&root.cont_values[1]));
        }
    }
}
