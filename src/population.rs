//! The group-merging elitist archive at the heart of the optimizer.
//!
//! Newly evaluated solutions are *offered* to the population. Offers that
//! duplicate an existing decision vector (or, optionally, an existing
//! fitness vector) are rejected outright; accepted offers accumulate in a
//! buffer. Once the buffer reaches a configurable fraction of the capacity,
//! the buffer and the current fronts are merged: the combined group is
//! sorted with fast non-dominated sorting (Deb et al., 2002), the last
//! qualifying front is reduced by crowding distance, and everything beyond
//! the capacity is evicted.
//!
//! Selection is rank-weighted: front weights follow a normal kernel
//! centered at rank 1 whose spread is controlled by the `greed` argument,
//! so `greed = 1` draws almost exclusively from the first front while
//! `greed = 0` is near-uniform.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::front::Front;
use crate::objective::Objective;
use crate::solution::SolutionHandle;
use crate::stats;

/// Default population capacity.
pub const DEFAULT_CAPACITY: usize = 20;

/// Configuration of a [`Population`].
#[derive(Clone, Debug)]
pub struct PopulationConfig {
    /// Target maximum number of solutions after an update.
    pub capacity: usize,
    /// Whether two solutions with identical fitness vectors may coexist.
    pub allow_equal_performers: bool,
    /// Merge once `buffer.len() >= update_trigger * capacity`.
    pub update_trigger: f64,
    /// Run merges on a detached thread instead of the offering thread.
    pub concurrent_update: bool,
    /// Smallest selection spread factor; reached at `|greed| = 1`.
    pub q_min: f64,
    /// Largest selection spread factor; reached at `greed = 0`.
    pub q_max: f64,
    /// Curvature of the greed-to-spread mapping.
    pub greed_to_q_power: f64,
    /// Break crowding-distance ties with a coin flip instead of the
    /// solution index. Kept for parity with historical behavior.
    pub random_tie_break: bool,
    /// Seed for the population's internal RNG.
    pub seed: Option<u64>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            allow_equal_performers: true,
            update_trigger: 1.0,
            concurrent_update: false,
            q_min: 0.1,
            q_max: 10.0,
            greed_to_q_power: 5.0,
            random_tie_break: false,
            seed: None,
        }
    }
}

/// Receives notifications whenever a solution holds rank 1 after an update.
pub(crate) trait RankObserver: Send + Sync {
    fn rank_changed(&self, handle: &Arc<SolutionHandle>);
}

/// Structural fingerprint of a decision vector, used to reject exact
/// duplicates. Continuous values compare by bit pattern; the key is only
/// ever used for equality and hashing, never for ordering.
#[derive(PartialEq, Eq, Hash)]
struct ValueKey {
    disc: Vec<i64>,
    cont: Vec<u64>,
}

impl ValueKey {
    fn of(handle: &SolutionHandle) -> Self {
        Self {
            disc: handle.solution().disc_values().to_vec(),
            cont: handle
                .solution()
                .cont_values()
                .iter()
                .map(|v| v.to_bits())
                .collect(),
        }
    }
}

/// Fingerprint of the numeric-objective fitness vector, used to reject
/// equal performers when configured.
#[derive(PartialEq, Eq, Hash)]
struct PerfKey {
    fitness: Vec<u64>,
}

impl PerfKey {
    fn of(handle: &SolutionHandle, objectives: &[Objective]) -> Self {
        Self {
            fitness: objectives
                .iter()
                .filter(|o| !o.is_custom())
                .map(|o| handle.fitness(o.index()).to_bits())
                .collect(),
        }
    }
}

#[derive(Default)]
struct PopInner {
    fronts: Vec<Front>,
    buffer: Vec<Arc<SolutionHandle>>,
    registry: HashSet<ValueKey>,
    perf_registry: HashSet<PerfKey>,
}

impl PopInner {
    fn front_size(&self) -> usize {
        self.fronts.iter().map(Front::len).sum()
    }
}

/// Group-merging elitist archive with duplicate rejection and rank-weighted
/// selection.
pub struct Population {
    config: PopulationConfig,
    capacity: AtomicUsize,
    concurrent: AtomicBool,
    objectives: RwLock<Vec<Objective>>,
    inner: Mutex<PopInner>,
    rng: Mutex<fastrand::Rng>,
    updating: AtomicBool,
    observer: RwLock<Option<Weak<dyn RankObserver>>>,
    me: Weak<Population>,
}

impl Population {
    /// Creates a population with the given configuration.
    #[must_use]
    pub fn new(config: PopulationConfig) -> Arc<Self> {
        let rng = config
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        Arc::new_cyclic(|me| Self {
            capacity: AtomicUsize::new(config.capacity.max(1)),
            concurrent: AtomicBool::new(config.concurrent_update),
            config,
            objectives: RwLock::new(Vec::new()),
            inner: Mutex::new(PopInner::default()),
            rng: Mutex::new(rng),
            updating: AtomicBool::new(false),
            observer: RwLock::new(None),
            me: Weak::clone(me),
        })
    }

    pub(crate) fn set_objectives(&self, objectives: Vec<Objective>) {
        *self.objectives.write() = objectives;
    }

    /// The objectives the population sorts by.
    #[must_use]
    pub fn objectives(&self) -> Vec<Objective> {
        self.objectives.read().clone()
    }

    pub(crate) fn set_rank_observer(&self, observer: Weak<dyn RankObserver>) {
        *self.observer.write() = Some(observer);
    }

    /// The target maximum population size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Whether merges run on a detached thread.
    #[must_use]
    pub fn concurrent_update(&self) -> bool {
        self.concurrent.load(Ordering::Relaxed)
    }

    /// Switches merges between the offering thread and a detached thread.
    pub fn set_concurrent_update(&self, concurrent: bool) {
        self.concurrent.store(concurrent, Ordering::Relaxed);
    }

    /// Whether two solutions with identical fitness vectors may coexist.
    #[must_use]
    pub fn allow_equal_performers(&self) -> bool {
        self.config.allow_equal_performers
    }

    /// Changes the capacity and updates the population if it now overflows.
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity.max(1), Ordering::Relaxed);
        self.update();
    }

    /// The number of solutions currently placed in fronts.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.lock().front_size()
    }

    /// The number of solutions in fronts plus the not-yet-merged buffer.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.inner.lock().registry.len()
    }

    /// Whether a solution with the same decision vector is already present.
    #[must_use]
    pub fn contains(&self, handle: &SolutionHandle) -> bool {
        self.inner.lock().registry.contains(&ValueKey::of(handle))
    }

    /// Removes every solution and fingerprint.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.fronts.clear();
        inner.buffer.clear();
        inner.registry.clear();
        inner.perf_registry.clear();
    }

    /// A snapshot of the current fronts, in domination order.
    #[must_use]
    pub fn fronts(&self) -> Vec<Front> {
        self.inner.lock().fronts.clone()
    }

    /// Every solution currently placed in a front.
    #[must_use]
    pub fn all_solutions(&self) -> Vec<Arc<SolutionHandle>> {
        self.inner
            .lock()
            .fronts
            .iter()
            .flat_map(|f| f.solutions().iter().cloned())
            .collect()
    }

    /// Offers a solution to the population.
    ///
    /// The offer is rejected when its decision vector is already registered
    /// or, with `allow_equal_performers` off, when its fitness vector is.
    /// Accepted offers land in the buffer; a merge runs when the buffer
    /// reaches the update trigger or the population overflows its capacity.
    pub fn offer(&self, handle: Arc<SolutionHandle>) {
        let promoted = {
            let mut inner = self.inner.lock();
            self.insert_locked(&mut inner, handle);
            self.update_if_due_locked(&mut inner)
        };
        self.notify(&promoted);
    }

    /// Offers a batch of solutions; at most one merge runs at the end.
    pub fn offer_all(&self, handles: impl IntoIterator<Item = Arc<SolutionHandle>>) {
        let promoted = {
            let mut inner = self.inner.lock();
            for handle in handles {
                self.insert_locked(&mut inner, handle);
            }
            self.update_if_due_locked(&mut inner)
        };
        self.notify(&promoted);
    }

    /// Merges buffer and fronts if the update trigger or capacity demands it.
    pub fn update(&self) {
        let promoted = {
            let mut inner = self.inner.lock();
            self.update_if_due_locked(&mut inner)
        };
        self.notify(&promoted);
    }

    /// Merges unconditionally (unless there is nothing to merge).
    pub fn force_update(&self) {
        if self.updating.load(Ordering::Acquire) {
            return;
        }
        if self.concurrent_update() {
            self.spawn_detached_update();
        } else {
            let promoted = {
                let mut inner = self.inner.lock();
                self.merge_locked(&mut inner)
            };
            self.notify(&promoted);
        }
    }

    /// Selects `count` solutions uniformly at random, with replacement.
    #[must_use]
    pub fn select(&self, count: usize) -> Vec<Arc<SolutionHandle>> {
        let all = self.all_solutions();
        if all.is_empty() {
            return Vec::new();
        }
        let mut rng = self.rng.lock();
        (0..count)
            .map(|_| Arc::clone(&all[rng.usize(0..all.len())]))
            .collect()
    }

    /// Selects `count` solutions biased by front rank.
    ///
    /// `greed` lies in `[-1, 1]`: positive values favor early fronts,
    /// negative values late fronts, and 0 is near-uniform. Each pick first
    /// draws a front by weight, then a member of that front uniformly.
    #[must_use]
    pub fn select_greedy(&self, count: usize, greed: f64) -> Vec<Arc<SolutionHandle>> {
        let mut inner = self.inner.lock();
        let size = inner.front_size();
        if size == 0 || count == 0 {
            return Vec::new();
        }

        let greed = greed.clamp(-1.0, 1.0);
        let temp = (1.0 - greed.abs()).powf(self.config.greed_to_q_power);
        let q = self.config.q_min + (self.config.q_max - self.config.q_min) * temp;
        #[allow(clippy::cast_precision_loss)]
        let spread = q * size as f64;

        // Walk the fronts from the favored end, accumulating the kernel
        // density over the global solution rank.
        let front_count = inner.fronts.len();
        let walk: Vec<usize> = if greed >= 0.0 {
            (0..front_count).collect()
        } else {
            (0..front_count).rev().collect()
        };
        let mut sol_rank = 1.0f64;
        for &fi in &walk {
            let members = inner.fronts[fi].len();
            let mut weight = 0.0;
            for _ in 0..members {
                weight += stats::normal_pdf(sol_rank, 1.0, spread);
                sol_rank += 1.0;
            }
            inner.fronts[fi].set_weight(weight);
        }
        let weights: Vec<f64> = walk.iter().map(|&fi| inner.fronts[fi].weight()).collect();

        let mut rng = self.rng.lock();
        let mut selection = Vec::with_capacity(count);
        for _ in 0..count {
            let pos = stats::weighted_index(&mut rng, &weights)
                .unwrap_or_else(|| rng.usize(0..walk.len()));
            let front = &inner.fronts[walk[pos]];
            let member = rng.usize(0..front.len());
            selection.push(Arc::clone(&front.solutions()[member]));
        }
        selection
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn insert_locked(&self, inner: &mut PopInner, handle: Arc<SolutionHandle>) {
        let key = ValueKey::of(&handle);
        if inner.registry.contains(&key) {
            return;
        }
        let objectives = self.objectives.read();
        if !self.config.allow_equal_performers {
            let perf = PerfKey::of(&handle, &objectives);
            if inner.perf_registry.contains(&perf) {
                return;
            }
            inner.perf_registry.insert(perf);
        }
        inner.registry.insert(key);
        inner.buffer.push(handle);
    }

    /// Runs (or schedules) a merge when the trigger or capacity demands it.
    /// Returns the handles promoted to rank 1 by an inline merge.
    fn update_if_due_locked(&self, inner: &mut PopInner) -> Vec<Arc<SolutionHandle>> {
        let capacity = self.capacity();
        #[allow(clippy::cast_precision_loss)]
        let buffer_full =
            inner.buffer.len() as f64 >= self.config.update_trigger * capacity as f64;
        let overflowed = inner.front_size() > capacity;
        if !(buffer_full || overflowed) || self.updating.load(Ordering::Acquire) {
            return Vec::new();
        }
        if self.concurrent_update() {
            self.spawn_detached_update();
            Vec::new()
        } else {
            self.merge_locked(inner)
        }
    }

    fn spawn_detached_update(&self) {
        if self.updating.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(population) = self.me.upgrade() else {
            self.updating.store(false, Ordering::Release);
            return;
        };
        std::thread::spawn(move || {
            let promoted = {
                let mut inner = population.inner.lock();
                population.merge_locked(&mut inner)
            };
            population.updating.store(false, Ordering::Release);
            population.notify(&promoted);
        });
    }

    /// Merges the buffer with the current fronts, re-sorts, prunes to
    /// capacity, and rebuilds both registries. Must be called with the
    /// inner lock held. Returns the survivors holding rank 1.
    fn merge_locked(&self, inner: &mut PopInner) -> Vec<Arc<SolutionHandle>> {
        let capacity = self.capacity();
        if inner.buffer.is_empty() && inner.front_size() <= capacity {
            return Vec::new();
        }
        self.updating.store(true, Ordering::Release);

        let mut combined: Vec<Arc<SolutionHandle>> = inner.buffer.drain(..).collect();
        for front in inner.fronts.drain(..) {
            combined.extend(front.solutions().iter().cloned());
        }

        let objectives = self.objectives.read().clone();
        let mut fronts = fast_non_dominated_sort(&combined, &objectives, Some(capacity));

        // Reduce the first front that overflows the capacity; drop the rest.
        let mut kept = Vec::with_capacity(fronts.len());
        let mut placed = 0usize;
        for front in fronts.drain(..) {
            let needed = capacity - placed;
            if needed == 0 {
                break;
            }
            if front.len() > needed {
                let mut rng = self.rng.lock();
                kept.push(front.reduced(
                    needed,
                    &objectives,
                    &mut rng,
                    self.config.random_tie_break,
                ));
                placed = capacity;
                break;
            }
            placed += front.len();
            kept.push(front);
        }

        // Record ranks: survivors get their 1-based front rank, everything
        // else in this merge is marked evicted.
        let mut survivor_indices = HashSet::new();
        let mut promoted = Vec::new();
        for (rank0, front) in kept.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let rank = rank0 as i32 + 1;
            for handle in front.solutions() {
                survivor_indices.insert(handle.index());
                handle.push_rank(rank);
                if rank == 1 {
                    promoted.push(Arc::clone(handle));
                }
            }
        }
        for handle in &combined {
            if !survivor_indices.contains(&handle.index()) {
                handle.push_rank(-1);
            }
        }

        // Rebuild the registries from the survivors (the buffer is empty).
        inner.registry.clear();
        inner.perf_registry.clear();
        for front in &kept {
            for handle in front.solutions() {
                inner.registry.insert(ValueKey::of(handle));
                if !self.config.allow_equal_performers {
                    inner.perf_registry.insert(PerfKey::of(handle, &objectives));
                }
            }
        }
        inner.fronts = kept;

        self.updating.store(false, Ordering::Release);
        promoted
    }

    fn notify(&self, promoted: &[Arc<SolutionHandle>]) {
        if promoted.is_empty() {
            return;
        }
        let observer = self.observer.read().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            for handle in promoted {
                observer.rank_changed(handle);
            }
        }
    }
}

/// Fast non-dominated sorting (Deb et al., 2002).
///
/// Partitions the candidates into fronts in domination order. With
/// `max = Some(cap)`, sorting stops once the accumulated front sizes reach
/// `cap` (the first front is always completed); `None` sorts everything.
///
/// Complexity: O(m·n²) for n candidates and m objectives.
#[must_use]
pub fn fast_non_dominated_sort(
    candidates: &[Arc<SolutionHandle>],
    objectives: &[Objective],
    max: Option<usize>,
) -> Vec<Front> {
    let n = candidates.len();
    if n == 0 {
        return Vec::new();
    }
    let max = max.unwrap_or(usize::MAX);

    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count: Vec<usize> = vec![0; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let dominance = candidates[i].dominance(&candidates[j], objectives);
            if dominance > 0 {
                dominated_by[i].push(j);
                domination_count[j] += 1;
            } else if dominance < 0 {
                dominated_by[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    let mut included = current.len();

    while !current.is_empty() {
        let mut next = Vec::new();
        for &p in &current {
            for &q in &dominated_by[p] {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        fronts.push(Front::from_solutions(
            current.iter().map(|&i| Arc::clone(&candidates[i])).collect(),
        ));
        if included >= max {
            break;
        }
        included += next.len();
        current = next;
    }

    fronts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solution::tests::handle;

    fn min_objectives() -> Vec<Objective> {
        vec![
            Objective::numeric(0, "f1", false),
            Objective::numeric(1, "f2", false),
        ]
    }

    fn population_with(config: PopulationConfig) -> Arc<Population> {
        let population = Population::new(config);
        population.set_objectives(min_objectives());
        population
    }

    #[test]
    fn test_sort_partitions_into_expected_fronts() {
        let candidates = vec![
            handle(1, vec![1.0, 5.0]),
            handle(2, vec![5.0, 1.0]),
            handle(3, vec![3.0, 3.0]),
            handle(4, vec![4.0, 4.0]),
            handle(5, vec![6.0, 6.0]),
        ];
        let fronts = fast_non_dominated_sort(&candidates, &min_objectives(), None);
        assert_eq!(fronts.len(), 3);
        let mut f0: Vec<u64> = fronts[0].solutions().iter().map(|s| s.index()).collect();
        f0.sort_unstable();
        assert_eq!(f0, vec![1, 2, 3]);
        assert_eq!(fronts[1].solutions()[0].index(), 4);
        assert_eq!(fronts[2].solutions()[0].index(), 5);
    }

    #[test]
    fn test_sort_stops_early_at_cap() {
        let candidates: Vec<_> = (0..10)
            .map(|i| handle(i, vec![f64::from(i as u32), f64::from(i as u32)]))
            .collect();
        // A chain: each candidate is its own front.
        let fronts = fast_non_dominated_sort(&candidates, &min_objectives(), Some(3));
        assert_eq!(fronts.len(), 3);

        // max = 0 still yields the complete first front.
        let fronts = fast_non_dominated_sort(&candidates, &min_objectives(), Some(0));
        assert_eq!(fronts.len(), 1);
        assert_eq!(fronts[0].len(), 1);
    }

    #[test]
    fn test_sort_nan_never_dominates() {
        let candidates = vec![handle(1, vec![f64::NAN, f64::NAN]), handle(2, vec![1.0, 1.0])];
        let fronts = fast_non_dominated_sort(&candidates, &min_objectives(), None);
        assert_eq!(fronts.len(), 2);
        assert_eq!(fronts[0].solutions()[0].index(), 2);
    }

    #[test]
    fn test_duplicate_offers_are_rejected() {
        let population = population_with(PopulationConfig {
            capacity: 10,
            ..PopulationConfig::default()
        });
        for i in 0..100 {
            let h = Arc::new(crate::solution::SolutionHandle::new(
                i,
                Box::new(crate::solution::tests::StubSolution::full(
                    &format!("dup{i}"),
                    vec![3],
                    vec![0.5],
                    vec![1.0, 1.0],
                )),
                crate::solution::GeneratorTag::Random,
                None,
            ));
            population.offer(h);
        }
        assert_eq!(population.total_size(), 1);
        population.force_update();
        assert_eq!(population.size(), 1);
    }

    #[test]
    fn test_equal_performer_rejection() {
        let population = population_with(PopulationConfig {
            capacity: 10,
            allow_equal_performers: false,
            ..PopulationConfig::default()
        });
        let offer = |disc: Vec<i64>, cont: Vec<f64>, fit: Vec<f64>, i: u64| {
            population.offer(Arc::new(crate::solution::SolutionHandle::new(
                i,
                Box::new(crate::solution::tests::StubSolution::full(
                    &format!("p{i}"),
                    disc,
                    cont,
                    fit,
                )),
                crate::solution::GeneratorTag::Random,
                None,
            )));
        };
        offer(vec![], vec![0.0, 0.0], vec![50.0, 50.0], 1);
        // Same decision vector: duplicate value.
        offer(vec![], vec![0.0, 0.0], vec![50.0, 50.0], 2);
        // Different decision vector, same fitness: duplicate performance.
        offer(vec![], vec![1e-20, 1e-20], vec![50.0, 50.0], 3);
        assert_eq!(population.total_size(), 1);
    }

    #[test]
    fn test_merge_respects_capacity_and_registries() {
        let population = population_with(PopulationConfig {
            capacity: 5,
            seed: Some(42),
            ..PopulationConfig::default()
        });
        for i in 0..25u64 {
            let x = f64::from(i as u32) * 0.1;
            population.offer(handle_with_values(i, x, 5.0 - x));
        }
        let size = population.size();
        assert!(size <= 5, "population size {size} exceeds capacity");
        assert_eq!(population.total_size(), size + buffered(&population));

        // No front member may dominate another member of the same front,
        // and earlier fronts must not be dominated by later ones.
        let objectives = min_objectives();
        let fronts = population.fronts();
        for (i, front) in fronts.iter().enumerate() {
            for a in front.solutions() {
                for b in front.solutions() {
                    if a.index() != b.index() {
                        assert_eq!(a.dominance(b, &objectives), 0);
                    }
                }
                for later in &fronts[i + 1..] {
                    for b in later.solutions() {
                        assert!(a.dominance(b, &objectives) >= 0);
                    }
                }
            }
        }
    }

    fn buffered(population: &Population) -> usize {
        population.total_size() - population.size()
    }

    fn handle_with_values(i: u64, x: f64, y: f64) -> Arc<SolutionHandle> {
        Arc::new(SolutionHandle::new(
            i,
            Box::new(crate::solution::tests::StubSolution::full(
                &format!("v{i}"),
                vec![],
                vec![x, y],
                vec![x, y],
            )),
            crate::solution::GeneratorTag::Random,
            None,
        ))
    }

    #[test]
    fn test_select_zero_returns_empty() {
        let population = population_with(PopulationConfig::default());
        population.offer(handle_with_values(1, 0.0, 1.0));
        population.force_update();
        assert!(population.select_greedy(0, 1.0).is_empty());
        assert!(population.select(0).is_empty());
    }

    #[test]
    fn test_select_on_empty_population_returns_empty() {
        let population = population_with(PopulationConfig::default());
        assert!(population.select(3).is_empty());
        assert!(population.select_greedy(3, 0.5).is_empty());
    }

    #[test]
    fn test_greedy_selection_concentrates_on_first_front() {
        let population = population_with(PopulationConfig {
            capacity: 10,
            seed: Some(7),
            ..PopulationConfig::default()
        });
        // Front 1: five trade-off points; front 2: five dominated points.
        for i in 0..5u64 {
            let x = f64::from(i as u32);
            population.offer(handle_with_values(i, x, 4.0 - x));
            population.offer(handle_with_values(10 + i, x + 10.0, 14.0 - x));
        }
        population.force_update();
        assert_eq!(population.fronts().len(), 2);

        let first_front: HashSet<u64> = population.fronts()[0]
            .solutions()
            .iter()
            .map(|s| s.index())
            .collect();

        let draws = 10_000usize;
        let greedy = population.select_greedy(draws, 1.0);
        let from_first = greedy
            .iter()
            .filter(|s| first_front.contains(&s.index()))
            .count();
        assert!(
            from_first * 100 >= draws * 95,
            "greed=1 drew only {from_first}/{draws} from front 1"
        );

        let uniform = population.select_greedy(draws, 0.0);
        let from_first = uniform
            .iter()
            .filter(|s| first_front.contains(&s.index()))
            .count();
        assert!(
            (40 * draws..=60 * draws).contains(&(from_first * 100)),
            "greed=0 drew {from_first}/{draws} from front 1"
        );

        let inverse = population.select_greedy(draws, -1.0);
        let from_first = inverse
            .iter()
            .filter(|s| first_front.contains(&s.index()))
            .count();
        assert!(
            from_first * 100 <= draws * 5,
            "greed=-1 drew {from_first}/{draws} from front 1"
        );
    }

    #[test]
    fn test_rank_history_records_promotion_and_eviction() {
        let population = population_with(PopulationConfig {
            capacity: 2,
            seed: Some(3),
            ..PopulationConfig::default()
        });
        let dominated = handle_with_values(99, 50.0, 50.0);
        population.offer(Arc::clone(&dominated));
        population.offer(handle_with_values(1, 0.0, 3.0));
        population.force_update();
        // Dominated point holds rank 2 of a 2-slot population.
        assert_eq!(dominated.rank(), 2);

        population.offer(handle_with_values(2, 1.0, 2.0));
        population.offer(handle_with_values(3, 2.0, 1.0));
        population.force_update();
        // Three non-dominated points now fill the capacity; the dominated
        // point is evicted and marked so.
        assert_eq!(dominated.rank(), -1);
        assert!(dominated.rank_history().ends_with(&[-1]));
    }
}
