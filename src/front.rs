//! A single non-domination front and its crowding-distance reduction.

use std::sync::Arc;

use crate::objective::Objective;
use crate::solution::SolutionHandle;

/// A set of mutually non-dominated solutions.
///
/// Fronts are ordered inside the population: the solutions of front *i*
/// dominate those of front *i + 1*. The `weight` field is scratch state for
/// rank-weighted selection and is rewritten on every weighted draw.
#[derive(Clone, Default)]
pub struct Front {
    solutions: Vec<Arc<SolutionHandle>>,
    weight: f64,
}

impl Front {
    /// Creates an empty front.
    #[must_use]
    pub fn new() -> Self {
        Self {
            solutions: Vec::new(),
            weight: f64::NAN,
        }
    }

    /// Creates a front from the given solutions.
    #[must_use]
    pub fn from_solutions(solutions: Vec<Arc<SolutionHandle>>) -> Self {
        Self {
            solutions,
            weight: f64::NAN,
        }
    }

    /// Adds a solution to the front.
    pub fn add(&mut self, solution: Arc<SolutionHandle>) {
        self.solutions.push(solution);
    }

    /// Adds all the given solutions to the front.
    pub fn add_all(&mut self, solutions: impl IntoIterator<Item = Arc<SolutionHandle>>) {
        self.solutions.extend(solutions);
    }

    /// Whether the front contains the solution with the given index.
    #[must_use]
    pub fn contains(&self, solution: &SolutionHandle) -> bool {
        self.solutions.iter().any(|s| s.index() == solution.index())
    }

    /// The number of solutions in the front.
    #[must_use]
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    /// Whether the front is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// The solutions in the front.
    #[must_use]
    pub fn solutions(&self) -> &[Arc<SolutionHandle>] {
        &self.solutions
    }

    pub(crate) fn weight(&self) -> f64 {
        self.weight
    }

    pub(crate) fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    /// Reduces the front to `count` solutions by NSGA-II crowding distance,
    /// keeping the most isolated solutions in objective space.
    ///
    /// For each objective the front is sorted along that objective, the two
    /// endpoints receive an infinite gap, and each interior solution the
    /// absolute fitness gap between its neighbors (custom objectives
    /// contribute 1.0 whenever the neighbors differ). Gaps are accumulated
    /// normalized by the largest gap seen for that objective. Ties between
    /// equal overall distances break on the solution index, or uniformly at
    /// random when `random_ties` is set.
    #[must_use]
    pub fn reduced(
        &self,
        count: usize,
        objectives: &[Objective],
        rng: &mut fastrand::Rng,
        random_ties: bool,
    ) -> Front {
        let n = self.solutions.len();
        if count >= n {
            return self.clone();
        }
        if count == 0 {
            return Front::new();
        }

        let mut crowding = vec![0.0f64; n];
        let mut temp = vec![0.0f64; n];

        for objective in objectives {
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| {
                objective.compare(self.solutions[a].solution(), self.solutions[b].solution())
            });

            temp.fill(0.0);
            temp[order[0]] = f64::INFINITY;
            temp[order[n - 1]] = f64::INFINITY;

            let mut largest = 0.0f64;
            for w in order.windows(3) {
                let (prev, current, next) = (w[0], w[1], w[2]);
                let gap = if objective.is_custom() {
                    let cmp = objective.compare(
                        self.solutions[prev].solution(),
                        self.solutions[next].solution(),
                    );
                    if cmp == core::cmp::Ordering::Equal { 0.0 } else { 1.0 }
                } else {
                    let index = objective.index();
                    (self.solutions[prev].fitness(index) - self.solutions[next].fitness(index))
                        .abs()
                };
                largest = largest.max(gap);
                temp[current] = gap;
            }

            for i in 0..n {
                if objective.is_custom() {
                    crowding[i] += temp[i];
                } else if temp[i].is_infinite() {
                    crowding[i] = f64::INFINITY;
                } else if largest > 0.0 {
                    crowding[i] += temp[i] / largest;
                }
            }
        }

        // Decorate with a tie-break key so the sort stays a total order even
        // in coin-flip mode.
        let mut order: Vec<(usize, u64)> = (0..n)
            .map(|i| {
                let key = if random_ties { rng.u64(..) } else { i as u64 };
                (i, key)
            })
            .collect();
        order.sort_by(|&(a, ka), &(b, kb)| {
            crowding[b]
                .partial_cmp(&crowding[a])
                .unwrap_or(core::cmp::Ordering::Equal)
                .then(ka.cmp(&kb))
        });

        Front::from_solutions(
            order
                .iter()
                .take(count)
                .map(|&(i, _)| Arc::clone(&self.solutions[i]))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solution::tests::handle;

    fn objectives() -> Vec<Objective> {
        vec![
            Objective::numeric(0, "f1", false),
            Objective::numeric(1, "f2", false),
        ]
    }

    #[test]
    fn test_reduced_keeps_front_when_count_large_enough() {
        let mut front = Front::new();
        front.add(handle(1, vec![1.0, 5.0]));
        front.add(handle(2, vec![5.0, 1.0]));
        let mut rng = fastrand::Rng::with_seed(1);
        let reduced = front.reduced(2, &objectives(), &mut rng, false);
        assert_eq!(reduced.len(), 2);
        let reduced = front.reduced(5, &objectives(), &mut rng, false);
        assert_eq!(reduced.len(), 2);
    }

    #[test]
    fn test_reduced_keeps_boundary_solutions() {
        // Five points on a line; the dense middle ones go first.
        let mut front = Front::new();
        front.add(handle(1, vec![0.0, 4.0]));
        front.add(handle(2, vec![1.0, 3.0]));
        front.add(handle(3, vec![1.1, 2.9]));
        front.add(handle(4, vec![1.2, 2.8]));
        front.add(handle(5, vec![4.0, 0.0]));

        let mut rng = fastrand::Rng::with_seed(2);
        let reduced = front.reduced(3, &objectives(), &mut rng, false);
        let kept: Vec<u64> = reduced.solutions().iter().map(|s| s.index()).collect();
        assert!(kept.contains(&1), "lower boundary dropped: {kept:?}");
        assert!(kept.contains(&5), "upper boundary dropped: {kept:?}");
        assert_eq!(reduced.len(), 3);
    }

    #[test]
    fn test_reduced_is_deterministic_with_stable_ties() {
        let build = || {
            let mut front = Front::new();
            for i in 0..6 {
                front.add(handle(i, vec![f64::from(i as u32), 5.0 - f64::from(i as u32)]));
            }
            front
        };
        let mut rng_a = fastrand::Rng::with_seed(9);
        let mut rng_b = fastrand::Rng::with_seed(1234);
        let a: Vec<u64> = build()
            .reduced(4, &objectives(), &mut rng_a, false)
            .solutions()
            .iter()
            .map(|s| s.index())
            .collect();
        let b: Vec<u64> = build()
            .reduced(4, &objectives(), &mut rng_b, false)
            .solutions()
            .iter()
            .map(|s| s.index())
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_reduced_with_duplicate_points_terminates() {
        let mut front = Front::new();
        for i in 0..10 {
            front.add(handle(i, vec![1.0, 1.0]));
        }
        let mut rng = fastrand::Rng::with_seed(3);
        let reduced = front.reduced(4, &objectives(), &mut rng, true);
        assert_eq!(reduced.len(), 4);
    }

    #[test]
    fn test_contains_by_index() {
        let mut front = Front::new();
        let h = handle(42, vec![0.0, 0.0]);
        front.add(Arc::clone(&h));
        assert!(front.contains(&h));
        assert!(!front.contains(&handle(43, vec![0.0, 0.0])));
    }
}
