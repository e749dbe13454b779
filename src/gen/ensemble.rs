//! The ensemble scheduler: allocates each generation cycle's budget among
//! the registered generators, weighted by their recent contribution to the
//! population and to the first front.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::gen::ga::GaGenerator;
use crate::gen::gradient::GradientDescentGenerator;
use crate::gen::Generator;
use crate::population::Population;
use crate::solution::{GeneratorTag, SolutionRoot};
use crate::variable::Problem;

/// Baseline share weight granted to every generator so that none is ever
/// starved of its exploration budget.
const EXPLORATION_BIAS: f64 = 1.0;

/// Configuration of the [`Ensemble`].
#[derive(Clone, Debug)]
pub struct EnsembleConfig {
    /// Target fraction of the population capacity generated per cycle.
    pub gen_ratio: f64,
    /// Per-generator floor as a fraction of the capacity.
    pub gen_min: f64,
    /// Absolute floor on the cycle budget.
    pub abs_gen_min: usize,
    /// Weight of a generator's total population membership in its share.
    pub weight_pop: f64,
    /// Weight of a generator's first-front membership in its share.
    pub weight_front1: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            gen_ratio: 1.0,
            gen_min: 0.1,
            abs_gen_min: 5,
            weight_pop: 1.0,
            weight_front1: 1.0,
        }
    }
}

/// One row of the generation history: what a generator produced during one
/// cycle and how long it took.
#[derive(Clone, Debug)]
pub struct GenerationRecord {
    /// 1-based generation cycle.
    pub cycle: usize,
    /// Identifier of the generator.
    pub generator_id: String,
    /// Number of solution roots produced.
    pub solutions: usize,
    /// Wall time spent in the generator, in milliseconds.
    pub total_time_ms: u64,
    /// Wall time per produced solution, in milliseconds.
    pub time_per_solution_ms: f64,
}

/// Reporting view of one registered generator.
#[derive(Clone, Debug)]
pub struct GeneratorInfo {
    /// Identifier, disambiguated with a numeric suffix when duplicated.
    pub id: String,
    /// Short identifier used in solution tables.
    pub short_id: String,
    /// Total number of solutions generated so far.
    pub total_generated: usize,
    /// One-line parameter rendering.
    pub param_summary: String,
}

struct GenEntry {
    generator: Box<dyn Generator>,
    id: String,
    short_id: String,
    total: AtomicUsize,
}

/// Schedules an ensemble of [`Generator`]s.
pub struct Ensemble {
    config: RwLock<EnsembleConfig>,
    generators: RwLock<Vec<GenEntry>>,
    history: Mutex<Vec<GenerationRecord>>,
    cycle: AtomicUsize,
}

impl Default for Ensemble {
    fn default() -> Self {
        Self::new()
    }
}

impl Ensemble {
    /// Creates an empty ensemble with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RwLock::new(EnsembleConfig::default()),
            generators: RwLock::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            cycle: AtomicUsize::new(0),
        }
    }

    /// The current configuration.
    #[must_use]
    pub fn config(&self) -> EnsembleConfig {
        self.config.read().clone()
    }

    /// Replaces the configuration.
    pub fn set_config(&self, config: EnsembleConfig) {
        *self.config.write() = config;
    }

    /// Registers a generator. A numeric suffix is appended to both
    /// identifiers when they collide with an already-registered generator.
    pub fn add_generator(&self, generator: Box<dyn Generator>) {
        let mut generators = self.generators.write();
        let duplicates = generators
            .iter()
            .filter(|e| e.generator.id() == generator.id())
            .count();
        let (id, short_id) = if duplicates == 0 {
            (generator.id().to_string(), generator.short_id().to_string())
        } else {
            (
                format!("{} {}", generator.id(), duplicates + 1),
                format!("{}{}", generator.short_id(), duplicates + 1),
            )
        };
        generators.push(GenEntry {
            generator,
            id,
            short_id,
            total: AtomicUsize::new(0),
        });
    }

    /// Installs the default members (GA and gradient descent) when no
    /// custom generator was registered.
    pub(crate) fn ensure_defaults(&self) {
        let mut generators = self.generators.write();
        if generators.is_empty() {
            drop(generators);
            self.add_generator(Box::new(GaGenerator::new()));
            self.add_generator(Box::new(GradientDescentGenerator::new()));
        }
    }

    /// The number of registered generators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.generators.read().len()
    }

    /// Whether no generator is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generators.read().is_empty()
    }

    /// A reporting snapshot of every registered generator.
    #[must_use]
    pub fn generator_info(&self) -> Vec<GeneratorInfo> {
        self.generators
            .read()
            .iter()
            .map(|e| GeneratorInfo {
                id: e.id.clone(),
                short_id: e.short_id.clone(),
                total_generated: e.total.load(Ordering::Relaxed),
                param_summary: e.generator.param_summary(),
            })
            .collect()
    }

    /// The short identifier of a generator tag; `Random` and `User` are
    /// reserved for seeded and predefined roots.
    #[must_use]
    pub fn short_id(&self, tag: &GeneratorTag) -> String {
        match tag {
            GeneratorTag::Random => "Random".to_string(),
            GeneratorTag::Predefined => "User".to_string(),
            GeneratorTag::Generator(index) => self
                .generators
                .read()
                .get(*index)
                .map_or_else(|| format!("#{index}"), |e| e.short_id.clone()),
        }
    }

    /// A copy of the generation history recorded so far.
    #[must_use]
    pub fn history(&self) -> Vec<GenerationRecord> {
        self.history.lock().clone()
    }

    pub(crate) fn set_problem(&self, problem: &Arc<Problem>) {
        for entry in self.generators.read().iter() {
            entry.generator.set_problem(Arc::clone(problem));
        }
    }

    /// Runs one generation cycle: splits the budget among the generators
    /// by their population and first-front membership, invokes each one,
    /// stamps the produced roots with the generator tag, and records one
    /// history row per generator.
    #[must_use]
    pub fn generate(&self, population: &Population) -> Vec<SolutionRoot> {
        let generators = self.generators.read();
        if generators.is_empty() {
            return Vec::new();
        }
        let config = self.config.read().clone();
        let capacity = population.capacity();

        // Tally how many population members (and first-front members) each
        // generator contributed.
        let mut pop_counts = vec![0usize; generators.len()];
        let mut front1_counts = vec![0usize; generators.len()];
        for (front_index, front) in population.fronts().iter().enumerate() {
            for handle in front.solutions() {
                if let GeneratorTag::Generator(g) = handle.generator() {
                    if let Some(count) = pop_counts.get_mut(*g) {
                        *count += 1;
                        if front_index == 0 {
                            front1_counts[*g] += 1;
                        }
                    }
                }
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let weights: Vec<f64> = (0..generators.len())
            .map(|g| {
                config.weight_pop * pop_counts[g] as f64
                    + config.weight_front1 * front1_counts[g] as f64
                    + EXPLORATION_BIAS
            })
            .collect();
        let total_weight: f64 = weights.iter().sum();

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let budget = config
            .abs_gen_min
            .max((config.gen_ratio * capacity as f64).ceil() as usize);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let floor = (config.gen_min * capacity as f64).ceil() as usize;

        let cycle = self.cycle.fetch_add(1, Ordering::Relaxed) + 1;
        let mut roots = Vec::with_capacity(budget);
        let mut history = Vec::with_capacity(generators.len());
        for (g, entry) in generators.iter().enumerate() {
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let share = (budget as f64 * weights[g] / total_weight).round() as usize;
            let allocation = share.max(floor);
            if allocation == 0 {
                continue;
            }

            let started = Instant::now();
            let mut batch = entry.generator.generate(population, allocation);
            let elapsed = started.elapsed();

            for root in &mut batch {
                root.generator = GeneratorTag::Generator(g);
            }
            entry.total.fetch_add(batch.len(), Ordering::Relaxed);

            #[allow(clippy::cast_precision_loss)]
            let per_solution = if batch.is_empty() {
                0.0
            } else {
                elapsed.as_secs_f64() * 1000.0 / batch.len() as f64
            };
            history.push(GenerationRecord {
                cycle,
                generator_id: entry.id.clone(),
                solutions: batch.len(),
                total_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                time_per_solution_ms: per_solution,
            });
            roots.extend(batch);
        }
        self.history.lock().extend(history);
        roots
    }
}
