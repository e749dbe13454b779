//! The optimization driver: problem setup, the evaluation worker pool,
//! termination, and the hall of fame.
//!
//! Workers pull [`SolutionRoot`]s from a shared generation buffer. A worker
//! finding the buffer empty refills it synchronously by asking the
//! [`Ensemble`] for a new batch; with concurrent updates enabled, a merely
//! low buffer is topped up from a detached thread instead. Evaluated
//! solutions are offered to the [`Population`] under its mutex, and every
//! solution that first reaches rank 1 enters the hall of fame (and its
//! append-only log, when configured).
//!
//! Termination fires on the wall-time limit, the evaluation-count limit, or
//! a solution reporting convergence; the [`Monitor`] is notified exactly
//! once, after the workers have stopped and a final population update ran.

use std::collections::{BTreeMap, VecDeque};
use std::fs::OpenOptions;
use std::io::Write as _;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::error::{Error, Result};
use crate::gen::ensemble::{Ensemble, EnsembleConfig, GenerationRecord, GeneratorInfo};
use crate::gen::Generator;
use crate::monitor::Monitor;
use crate::objective::Objective;
use crate::population::{Population, PopulationConfig, RankObserver};
use crate::solution::{Evaluator, GeneratorTag, SolutionHandle, SolutionRoot};
use crate::variable::{ContVar, DiscVar, Problem};

/// Longest time the terminating thread waits for its peers to wind down.
pub const MAX_TIMEOUT: Duration = Duration::from_millis(10_000);

const TERMINATION_TIME: &str = "Time limit reached";
const TERMINATION_EVALUATIONS: &str = "Solution evaluation count limit reached";
const TERMINATION_SOLUTION: &str = "Solution met user-defined criterion";

#[derive(Default)]
struct WorkerSlot {
    /// When the in-flight evaluation started; `None` between evaluations.
    analysis_start: Mutex<Option<Instant>>,
    /// Set when the worker timed out and was replaced; its pending result
    /// is discarded.
    abandoned: AtomicBool,
    /// Cooperative stop signal.
    stop: AtomicBool,
}

struct Worker {
    slot: Arc<WorkerSlot>,
    join: JoinHandle<()>,
}

struct Control {
    start_time: RwLock<Instant>,
    time_limit: RwLock<Duration>,
    solution_limit: AtomicU64,
    offer_count: AtomicU64,
    eval_count: AtomicU64,
    terminated: AtomicBool,
    reason: Mutex<String>,
    notified: AtomicBool,
    done: Mutex<bool>,
    done_cv: Condvar,
}

impl Default for Control {
    fn default() -> Self {
        Self {
            start_time: RwLock::new(Instant::now()),
            time_limit: RwLock::new(Duration::MAX),
            solution_limit: AtomicU64::new(u64::MAX),
            offer_count: AtomicU64::new(0),
            eval_count: AtomicU64::new(0),
            terminated: AtomicBool::new(false),
            reason: Mutex::new(String::new()),
            notified: AtomicBool::new(false),
            done: Mutex::new(false),
            done_cv: Condvar::new(),
        }
    }
}

pub(crate) struct Inner {
    problem_name: String,
    run_index: u32,
    evaluator: Arc<dyn Evaluator>,
    monitor: Arc<dyn Monitor>,
    disc_vars: RwLock<Vec<DiscVar>>,
    cont_vars: RwLock<Vec<ContVar>>,
    objectives: RwLock<Vec<Objective>>,
    problem: RwLock<Arc<Problem>>,
    population: Arc<Population>,
    ensemble: Arc<Ensemble>,
    gen_buffer: Mutex<VecDeque<SolutionRoot>>,
    refilling: AtomicBool,
    workers: Mutex<Vec<Worker>>,
    all_solutions: Option<Mutex<Vec<Arc<SolutionHandle>>>>,
    hall_of_fame: Mutex<BTreeMap<u64, Arc<SolutionHandle>>>,
    hall_of_fame_file: RwLock<Option<PathBuf>>,
    thread_count: AtomicUsize,
    evaluation_time_limit: RwLock<Option<Duration>>,
    random_solution_ratio: RwLock<f64>,
    control: Control,
    me: Weak<Inner>,
}

/// The MAESTRO-MO optimization driver.
///
/// Configure the problem (decision variables, objectives, generators,
/// limits), then call [`start_optimization`](Self::start_optimization) to
/// launch the worker pool and [`wait`](Self::wait) to block until the
/// monitor has been notified — or [`optimize`](Self::optimize) for both.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// # use maestro_mo::{Evaluator, Monitor, Optimizer, Solution};
/// # struct MyEvaluator;
/// # impl Evaluator for MyEvaluator {
/// #     fn create_new(
/// #         &self,
/// #         _index: u64,
/// #         _disc: &[i64],
/// #         _cont: &[f64],
/// #         _extra: Option<&maestro_mo::Extra>,
/// #     ) -> Box<dyn Solution> {
/// #         unimplemented!()
/// #     }
/// # }
/// # struct MyMonitor;
/// # impl Monitor for MyMonitor {
/// #     fn terminate(&self, _reason: &str) {}
/// # }
/// let optimizer = Optimizer::new(
///     "my problem",
///     1,
///     Arc::new(MyEvaluator),
///     Arc::new(MyMonitor),
///     true,
/// );
/// optimizer.add_cont_var("x", 0.0, 5.0);
/// optimizer.add_numeric_objective(0, "f1", false);
/// optimizer.add_numeric_objective(1, "f2", false);
/// optimizer
///     .optimize(Duration::from_secs(5), 1000)
///     .unwrap();
/// ```
pub struct Optimizer {
    inner: Arc<Inner>,
}

impl Optimizer {
    /// Creates an optimizer with a default-configured population.
    ///
    /// `keep_history` retains every evaluated solution for the
    /// `[All solutions]` report section.
    #[must_use]
    pub fn new(
        problem_name: impl Into<String>,
        run_index: u32,
        evaluator: Arc<dyn Evaluator>,
        monitor: Arc<dyn Monitor>,
        keep_history: bool,
    ) -> Self {
        Self::with_population_config(
            problem_name,
            run_index,
            evaluator,
            monitor,
            keep_history,
            PopulationConfig::default(),
        )
    }

    /// Creates an optimizer with an explicit population configuration.
    #[must_use]
    pub fn with_population_config(
        problem_name: impl Into<String>,
        run_index: u32,
        evaluator: Arc<dyn Evaluator>,
        monitor: Arc<dyn Monitor>,
        keep_history: bool,
        population_config: PopulationConfig,
    ) -> Self {
        let inner = Arc::new_cyclic(|me| Inner {
            problem_name: problem_name.into(),
            run_index,
            evaluator,
            monitor,
            disc_vars: RwLock::new(Vec::new()),
            cont_vars: RwLock::new(Vec::new()),
            objectives: RwLock::new(Vec::new()),
            problem: RwLock::new(Arc::new(Problem::default())),
            population: Population::new(population_config),
            ensemble: Arc::new(Ensemble::new()),
            gen_buffer: Mutex::new(VecDeque::new()),
            refilling: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
            all_solutions: keep_history.then(|| Mutex::new(Vec::new())),
            hall_of_fame: Mutex::new(BTreeMap::new()),
            hall_of_fame_file: RwLock::new(None),
            thread_count: AtomicUsize::new(1),
            evaluation_time_limit: RwLock::new(None),
            random_solution_ratio: RwLock::new(1.0),
            control: Control::default(),
            me: Weak::clone(me),
        });
        Self { inner }
    }

    // -----------------------------------------------------------------------
    // Problem definition
    // -----------------------------------------------------------------------

    /// Adds a discrete decision variable over `count` integers from `min`.
    pub fn add_disc_var(&self, name: impl Into<String>, min: i64, count: usize, scalar: bool) {
        self.inner
            .disc_vars
            .write()
            .push(DiscVar::new(name, min, count, scalar));
    }

    /// Adds a discrete decision variable whose values map to labels.
    pub fn add_disc_var_with_labels(&self, name: impl Into<String>, labels: Vec<String>) {
        self.inner
            .disc_vars
            .write()
            .push(DiscVar::with_labels(name, labels));
    }

    /// Adds a continuous decision variable over `[min, max]`.
    pub fn add_cont_var(&self, name: impl Into<String>, min: f64, max: f64) {
        self.inner
            .cont_vars
            .write()
            .push(ContVar::new(name, min, max));
    }

    /// Adds an objective compared through a numeric fitness value.
    pub fn add_numeric_objective(&self, index: usize, id: impl Into<String>, maximize: bool) {
        self.inner
            .objectives
            .write()
            .push(Objective::numeric(index, id, maximize));
    }

    /// Adds an objective whose comparison is implemented by the solutions.
    pub fn add_custom_objective(&self, index: usize, id: impl Into<String>) {
        self.inner
            .objectives
            .write()
            .push(Objective::custom(index, id));
    }

    /// Registers an additional generator in the ensemble. Without any
    /// registered generator, a default GA + gradient-descent pair is used.
    pub fn add_generator(&self, generator: Box<dyn Generator>) {
        self.inner.ensemble.add_generator(generator);
    }

    /// Queues a user-predefined solution root for evaluation at startup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueCountMismatch`] if the root's value vectors
    /// are shorter than the variable lists defined so far.
    pub fn add_predefined_solution(&self, mut root: SolutionRoot) -> Result<()> {
        {
            let disc_vars = self.inner.disc_vars.read();
            if root.disc_values.len() < disc_vars.len() {
                return Err(Error::ValueCountMismatch {
                    expected: disc_vars.len(),
                    got: root.disc_values.len(),
                });
            }
            for (value, var) in root.disc_values.iter_mut().zip(disc_vars.iter()) {
                *value = var.validate(*value);
            }
        }
        {
            let cont_vars = self.inner.cont_vars.read();
            if root.cont_values.len() < cont_vars.len() {
                return Err(Error::ValueCountMismatch {
                    expected: cont_vars.len(),
                    got: root.cont_values.len(),
                });
            }
            for (value, var) in root.cont_values.iter_mut().zip(cont_vars.iter()) {
                *value = var.validate(*value);
            }
        }
        root.generator = GeneratorTag::Predefined;
        self.inner.gen_buffer.lock().push_back(root);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Sets the target population capacity.
    pub fn set_population_capacity(&self, capacity: usize) {
        self.inner.population.set_capacity(capacity);
    }

    /// Sets the number of evaluation worker threads.
    pub fn set_thread_count(&self, threads: usize) {
        self.inner
            .thread_count
            .store(threads.max(1), Ordering::Relaxed);
    }

    /// Allows population merges and buffer refills to run on detached
    /// threads.
    pub fn set_concurrent_updates(&self, concurrent: bool) {
        self.inner.population.set_concurrent_update(concurrent);
    }

    /// Bounds how long a single evaluation may run before its worker is
    /// abandoned and replaced; `None` disables the check.
    pub fn set_evaluation_time_limit(&self, limit: Option<Duration>) {
        *self.inner.evaluation_time_limit.write() = limit;
    }

    /// Sets how many random roots to seed, as a fraction of the capacity.
    pub fn set_random_solution_ratio(&self, ratio: f64) {
        *self.inner.random_solution_ratio.write() = ratio.max(0.0);
    }

    /// Enables the append-only hall-of-fame log at the given path.
    pub fn set_hall_of_fame_file(&self, path: impl AsRef<Path>) {
        *self.inner.hall_of_fame_file.write() = Some(path.as_ref().to_path_buf());
    }

    /// Replaces the ensemble scheduling configuration.
    pub fn set_ensemble_config(&self, config: EnsembleConfig) {
        self.inner.ensemble.set_config(config);
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The name of the optimization problem.
    #[must_use]
    pub fn problem_name(&self) -> &str {
        &self.inner.problem_name
    }

    /// The index identifying this run.
    #[must_use]
    pub fn run_index(&self) -> u32 {
        self.inner.run_index
    }

    /// The solution population.
    #[must_use]
    pub fn population(&self) -> Arc<Population> {
        Arc::clone(&self.inner.population)
    }

    /// The frozen problem definition of the current (or last) run.
    #[must_use]
    pub fn problem(&self) -> Arc<Problem> {
        self.inner.problem.read().clone()
    }

    /// The ensemble scheduling configuration.
    #[must_use]
    pub fn ensemble_config(&self) -> EnsembleConfig {
        self.inner.ensemble.config()
    }

    /// A reporting snapshot of the registered generators.
    #[must_use]
    pub fn generator_info(&self) -> Vec<GeneratorInfo> {
        self.inner.ensemble.generator_info()
    }

    /// The per-cycle generation history.
    #[must_use]
    pub fn generation_history(&self) -> Vec<GenerationRecord> {
        self.inner.ensemble.history()
    }

    /// The number of solutions evaluated so far.
    #[must_use]
    pub fn eval_count(&self) -> u64 {
        self.inner.control.eval_count.load(Ordering::Relaxed)
    }

    /// The number of solution indices assigned so far.
    #[must_use]
    pub fn offer_count(&self) -> u64 {
        self.inner.control.offer_count.load(Ordering::Relaxed)
    }

    /// The wall time spent since the optimization started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.inner.control.start_time.read().elapsed()
    }

    /// The configured time limit of the current run.
    #[must_use]
    pub fn time_limit(&self) -> Duration {
        *self.inner.control.time_limit.read()
    }

    /// The configured evaluation-count limit of the current run.
    #[must_use]
    pub fn solution_limit(&self) -> u64 {
        self.inner.control.solution_limit.load(Ordering::Relaxed)
    }

    /// The number of evaluation worker threads.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.inner.thread_count.load(Ordering::Relaxed)
    }

    /// Whether detached merges and refills are enabled.
    #[must_use]
    pub fn concurrent_updates(&self) -> bool {
        self.inner.population.concurrent_update()
    }

    /// The configured random seeding ratio.
    #[must_use]
    pub fn random_solution_ratio(&self) -> f64 {
        *self.inner.random_solution_ratio.read()
    }

    /// The termination reason, or an empty string while running.
    #[must_use]
    pub fn termination_message(&self) -> String {
        self.inner.control.reason.lock().clone()
    }

    /// The tab-separated report header of the user evaluator.
    #[must_use]
    pub fn report_header(&self) -> String {
        self.inner.evaluator.report_header()
    }

    /// The solutions currently in the first (Pareto) front, forcing a
    /// merge first if only buffered solutions exist.
    #[must_use]
    pub fn first_front(&self) -> Vec<Arc<SolutionHandle>> {
        let population = &self.inner.population;
        if population.size() == 0 {
            population.force_update();
        }
        population
            .fronts()
            .first()
            .map(|front| front.solutions().to_vec())
            .unwrap_or_default()
    }

    /// Every solution currently in the population, in front order.
    #[must_use]
    pub fn solutions_in_population(&self) -> Vec<Arc<SolutionHandle>> {
        let population = &self.inner.population;
        if population.size() == 0 {
            population.force_update();
        }
        population.all_solutions()
    }

    /// Every solution that ever held rank 1, in index order.
    #[must_use]
    pub fn hall_of_fame(&self) -> Vec<Arc<SolutionHandle>> {
        self.inner.hall_of_fame.lock().values().cloned().collect()
    }

    /// Every evaluated solution, when history keeping is enabled.
    #[must_use]
    pub fn all_solutions(&self) -> Option<Vec<Arc<SolutionHandle>>> {
        self.inner
            .all_solutions
            .as_ref()
            .map(|all| all.lock().clone())
    }

    /// The short generator identifier for a solution, honoring user labels
    /// of predefined roots.
    #[must_use]
    pub fn generator_short_id(&self, handle: &SolutionHandle) -> String {
        self.inner.generator_short_id(handle)
    }

    // -----------------------------------------------------------------------
    // Run control
    // -----------------------------------------------------------------------

    /// Launches the optimization and returns once the workers are running.
    ///
    /// The run ends when the time limit or the evaluation-count limit is
    /// reached, a solution reports convergence, or
    /// [`terminate`](Self::terminate) is called; the monitor is then
    /// notified exactly once. Use [`wait`](Self::wait) to block until that
    /// happens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoVariables`] or [`Error::NoObjectives`] when the
    /// problem is incomplete, and [`Error::ReportIo`] if the hall-of-fame
    /// log cannot be created.
    pub fn start_optimization(&self, time_limit: Duration, solution_limit: u64) -> Result<()> {
        self.inner.start_optimization(time_limit, solution_limit)
    }

    /// Blocks until the current run has terminated and the monitor was
    /// notified.
    pub fn wait(&self) {
        let control = &self.inner.control;
        let mut done = control.done.lock();
        while !*done {
            control.done_cv.wait(&mut done);
        }
    }

    /// Runs a complete optimization: [`start_optimization`] followed by
    /// [`wait`].
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`start_optimization`](Self::start_optimization).
    pub fn optimize(&self, time_limit: Duration, solution_limit: u64) -> Result<()> {
        self.start_optimization(time_limit, solution_limit)?;
        self.wait();
        Ok(())
    }

    /// Terminates the run with the given reason.
    pub fn terminate(&self, reason: &str) {
        self.inner.terminate(reason);
    }

    /// Writes the tab-delimited execution report to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReportIo`] if the file cannot be written.
    pub fn write_report(
        &self,
        path: impl AsRef<Path>,
        options: crate::report::ReportOptions,
    ) -> Result<()> {
        crate::report::write_report(self, path, options)
    }
}

impl Inner {
    fn start_optimization(&self, time_limit: Duration, solution_limit: u64) -> Result<()> {
        let disc_vars = self.disc_vars.read().clone();
        let cont_vars = self.cont_vars.read().clone();
        if disc_vars.is_empty() && cont_vars.is_empty() {
            return Err(Error::NoVariables);
        }
        let objectives = self.objectives.read().clone();
        if objectives.is_empty() {
            return Err(Error::NoObjectives);
        }

        self.monitor.reset();

        // Signal any workers left over from a previous run.
        for worker in std::mem::take(&mut *self.workers.lock()) {
            worker.slot.stop.store(true, Ordering::SeqCst);
        }

        let problem = Problem::new(disc_vars, cont_vars, objectives.clone());
        *self.problem.write() = Arc::clone(&problem);
        self.population.set_objectives(objectives);
        let Some(inner) = self.me.upgrade() else {
            return Ok(());
        };
        let observer: Arc<dyn RankObserver> = inner.clone();
        self.population.set_rank_observer(Arc::downgrade(&observer));
        self.ensemble.ensure_defaults();
        self.ensemble.set_problem(&problem);

        let control = &self.control;
        *control.start_time.write() = Instant::now();
        *control.time_limit.write() = time_limit;
        control.solution_limit.store(solution_limit, Ordering::SeqCst);
        control.offer_count.store(0, Ordering::SeqCst);
        control.eval_count.store(0, Ordering::SeqCst);
        control.terminated.store(false, Ordering::SeqCst);
        control.notified.store(false, Ordering::SeqCst);
        control.reason.lock().clear();
        *control.done.lock() = false;

        self.prepare_hall_of_fame_file()?;
        self.seed_initial_roots(&problem);

        tracing::info!(
            problem = %self.problem_name,
            run_index = self.run_index,
            time_limit_ms = u64::try_from(time_limit.as_millis()).unwrap_or(u64::MAX),
            solution_limit,
            "optimization started"
        );

        let threads = self.thread_count.load(Ordering::Relaxed).max(1);
        let mut workers = self.workers.lock();
        for _ in 0..threads {
            workers.push(spawn_worker(&inner));
        }
        Ok(())
    }

    /// Queues the initial uniformly random roots: enough to fill the
    /// capacity after the predefined roots, but no fewer than
    /// `random_solution_ratio * capacity`.
    fn seed_initial_roots(&self, problem: &Problem) {
        let mut buffer = self.gen_buffer.lock();
        let capacity = self.population.capacity();
        let to_complete = capacity.saturating_sub(buffer.len());
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let random_count =
            to_complete.max((capacity as f64 * *self.random_solution_ratio.read()).ceil() as usize);
        let mut rng = fastrand::Rng::new();
        for _ in 0..random_count {
            let (disc, cont) = problem.sample_values(&mut rng);
            buffer.push_back(SolutionRoot::new(disc, cont, GeneratorTag::Random));
        }
    }

    /// The next root to evaluate. `None` signals the worker to stop.
    fn next_root(&self) -> Result<Option<SolutionRoot>> {
        if self.control.terminated.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let mut buffer = self.gen_buffer.lock();
        if buffer.is_empty() {
            self.generate_roots_into(&mut buffer)?;
        } else if buffer.len() <= self.thread_count.load(Ordering::Relaxed)
            && self.population.concurrent_update()
            && !self.refilling.swap(true, Ordering::AcqRel)
        {
            // Top up the running-low buffer from a detached thread.
            if let Some(inner) = self.me.upgrade() {
                std::thread::spawn(move || {
                    let result = {
                        let mut buffer = inner.gen_buffer.lock();
                        inner.generate_roots_into(&mut buffer)
                    };
                    inner.refilling.store(false, Ordering::Release);
                    if let Err(error) = result {
                        tracing::warn!(%error, "background buffer refill failed");
                    }
                });
            } else {
                self.refilling.store(false, Ordering::Release);
            }
        }
        Ok(buffer.pop_front())
    }

    /// Refills the generation buffer with a fresh ensemble batch.
    fn generate_roots_into(&self, buffer: &mut VecDeque<SolutionRoot>) -> Result<()> {
        if self.control.terminated.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.population.total_size() == 0 {
            return Err(Error::EmptyPopulation);
        }
        if self.population.size() == 0 {
            self.population.force_update();
        }
        let problem = self.problem.read().clone();
        for mut root in self.ensemble.generate(&self.population) {
            problem.validate_disc_values(&mut root.disc_values)?;
            problem.validate_cont_values(&mut root.cont_values)?;
            buffer.push_back(root);
        }
        Ok(())
    }

    /// Evaluates one root: assigns the next solution index, runs the user
    /// evaluator, and offers the valid result to the population.
    fn process_root(&self, slot: &WorkerSlot, root: SolutionRoot) {
        *slot.analysis_start.lock() = Some(Instant::now());
        let index = self.control.offer_count.fetch_add(1, Ordering::SeqCst) + 1;
        let evaluator = Arc::clone(&self.evaluator);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            evaluator.create_new(index, &root.disc_values, &root.cont_values, root.extra.as_ref())
        }));
        *slot.analysis_start.lock() = None;

        if slot.abandoned.load(Ordering::SeqCst) {
            // This worker was replaced while evaluating; the result is
            // discarded and the replacement carries on.
            return;
        }

        let solution = match outcome {
            Ok(solution) => solution,
            Err(payload) => {
                let error = Error::EvaluationFailed(panic_message(&payload));
                tracing::warn!(%error, solution_index = index, "evaluator panicked");
                return;
            }
        };
        if self.control.terminated.load(Ordering::SeqCst) || !solution.is_valid() {
            return;
        }

        let handle = Arc::new(SolutionHandle::new(
            index,
            solution,
            root.generator,
            root.label,
        ));
        self.population.offer(Arc::clone(&handle));
        if let Some(all) = &self.all_solutions {
            all.lock().push(Arc::clone(&handle));
        }

        let evals = self.control.eval_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.check_terminate(evals);
        self.verify_workers(evals);

        if !self.control.terminated.load(Ordering::SeqCst) && handle.solution().converged() {
            self.terminate(&format!("{TERMINATION_SOLUTION}: {}", handle.id()));
        }
    }

    fn check_terminate(&self, evals: u64) {
        let mut reason = None;
        if self.control.start_time.read().elapsed() >= *self.control.time_limit.read() {
            reason = Some(TERMINATION_TIME);
        }
        if evals >= self.control.solution_limit.load(Ordering::SeqCst) {
            reason = Some(TERMINATION_EVALUATIONS);
        }
        if let Some(reason) = reason {
            self.terminate(reason);
        }
    }

    /// Every `capacity` evaluations, abandon workers whose in-flight
    /// evaluation exceeded the evaluation time limit and spawn
    /// replacements.
    fn verify_workers(&self, evals: u64) {
        let Some(limit) = *self.evaluation_time_limit.read() else {
            return;
        };
        let capacity = self.population.capacity() as u64;
        if capacity == 0 || evals % capacity != 0 {
            return;
        }

        let mut replacements = 0usize;
        {
            let workers = self.workers.lock();
            for worker in workers.iter() {
                let stale = worker
                    .slot
                    .analysis_start
                    .lock()
                    .is_some_and(|start| start.elapsed() > limit);
                if stale && !worker.slot.abandoned.swap(true, Ordering::SeqCst) {
                    tracing::warn!(
                        limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        "evaluation exceeded the time limit; worker replaced"
                    );
                    replacements += 1;
                }
            }
        }
        if replacements > 0 && !self.control.terminated.load(Ordering::SeqCst) {
            if let Some(inner) = self.me.upgrade() {
                let mut workers = self.workers.lock();
                for _ in 0..replacements {
                    workers.push(spawn_worker(&inner));
                }
            }
        }
    }

    fn terminate(&self, reason: &str) {
        if reason.is_empty() {
            return;
        }
        if self.control.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.control.reason.lock() = reason.to_string();

        // Signal every worker and wait (bounded) for the peers to wind
        // down; workers stuck past the evaluation limit are abandoned.
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in &workers {
            worker.slot.stop.store(true, Ordering::SeqCst);
        }
        let deadline = Instant::now() + MAX_TIMEOUT;
        let current = std::thread::current().id();
        let eval_limit = *self.evaluation_time_limit.read();
        'workers: for worker in &workers {
            if worker.join.thread().id() == current {
                continue;
            }
            loop {
                if worker.join.is_finished() || worker.slot.abandoned.load(Ordering::SeqCst) {
                    break;
                }
                if let Some(limit) = eval_limit {
                    let stuck = worker
                        .slot
                        .analysis_start
                        .lock()
                        .is_some_and(|start| start.elapsed() > limit);
                    if stuck {
                        worker.slot.abandoned.store(true, Ordering::SeqCst);
                        break;
                    }
                }
                if Instant::now() > deadline {
                    break 'workers;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }

        if !self.control.notified.swap(true, Ordering::SeqCst) {
            self.population.force_update();
            let reason = self.control.reason.lock().clone();
            tracing::info!(
                %reason,
                evaluations = self.control.eval_count.load(Ordering::SeqCst),
                "optimization terminated"
            );
            self.monitor.terminate(&reason);
            let mut done = self.control.done.lock();
            *done = true;
            self.control.done_cv.notify_all();
        }
    }

    fn generator_short_id(&self, handle: &SolutionHandle) -> String {
        handle.label().map_or_else(
            || self.ensemble.short_id(handle.generator()),
            ToString::to_string,
        )
    }

    /// Writes the hall-of-fame log header, creating the file.
    fn prepare_hall_of_fame_file(&self) -> Result<()> {
        let Some(path) = self.hall_of_fame_file.read().clone() else {
            return Ok(());
        };
        let mut fields = vec!["Solution".to_string(), "Generator".to_string()];
        let header = self.evaluator.report_header();
        if !header.is_empty() {
            fields.push(header);
        }
        for var in self.disc_vars.read().iter() {
            fields.push(var.name().to_string());
        }
        for var in self.cont_vars.read().iter() {
            fields.push(var.name().to_string());
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", fields.join("\t"))?;
        Ok(())
    }

    /// Appends one hall-of-fame row for a solution that first reached
    /// rank 1.
    fn append_hall_of_famer(&self, handle: &SolutionHandle) -> Result<()> {
        let Some(path) = self.hall_of_fame_file.read().clone() else {
            return Ok(());
        };
        let problem = self.problem.read().clone();
        let mut fields = vec![handle.id(), self.generator_short_id(handle)];
        let report = handle.solution().report();
        if !report.is_empty() {
            fields.push(report);
        }
        for (value, var) in handle
            .solution()
            .disc_values()
            .iter()
            .zip(problem.disc_vars())
        {
            fields.push(var.value_label(*value));
        }
        for value in handle.solution().cont_values() {
            fields.push(value.to_string());
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", fields.join("\t"))?;
        Ok(())
    }
}

impl RankObserver for Inner {
    fn rank_changed(&self, handle: &Arc<SolutionHandle>) {
        if handle.rank() != 1 {
            return;
        }
        {
            let mut hall_of_fame = self.hall_of_fame.lock();
            if hall_of_fame.contains_key(&handle.index()) {
                return;
            }
            hall_of_fame.insert(handle.index(), Arc::clone(handle));
        }
        if let Err(error) = self.append_hall_of_famer(handle) {
            tracing::warn!(%error, "failed to append hall-of-fame entry");
        }
    }
}

fn spawn_worker(inner: &Arc<Inner>) -> Worker {
    let slot = Arc::new(WorkerSlot::default());
    let worker_inner = Arc::clone(inner);
    let worker_slot = Arc::clone(&slot);
    let join = std::thread::spawn(move || worker_loop(&worker_inner, &worker_slot));
    Worker { slot, join }
}

fn worker_loop(inner: &Inner, slot: &WorkerSlot) {
    loop {
        if inner.control.terminated.load(Ordering::SeqCst)
            || slot.stop.load(Ordering::SeqCst)
            || slot.abandoned.load(Ordering::SeqCst)
        {
            break;
        }
        let root = match inner.next_root() {
            Ok(Some(root)) => root,
            Ok(None) => break,
            Err(error) => {
                tracing::error!(%error, "root generation failed; worker stopping");
                break;
            }
        };
        inner.process_root(slot, root);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload.downcast_ref::<&str>().map_or_else(
        || {
            payload
                .downcast_ref::<String>()
                .cloned()
                .unwrap_or_else(|| "panic".to_string())
        },
        |s| (*s).to_string(),
    )
}
