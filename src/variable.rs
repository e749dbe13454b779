//! Decision variables and the frozen problem definition.
//!
//! A problem mixes discrete variables ([`DiscVar`]: an integer range with an
//! optional label per value) and continuous variables ([`ContVar`]: a closed
//! interval). Both sample uniformly and validate by clamping to their bounds,
//! so `validate(validate(x)) == validate(x)` always holds.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::objective::Objective;
use crate::stats;

/// A discrete decision variable taking integer values in
/// `[min, min + count)`.
#[derive(Clone, Debug)]
pub struct DiscVar {
    name: String,
    min: i64,
    count: usize,
    scalar: bool,
    labels: Option<Vec<String>>,
}

impl DiscVar {
    /// Creates a discrete variable over `count` integers starting at `min`.
    ///
    /// `scalar` marks variables whose values form an ordered scale, which
    /// enables the adjacent and boundary mutation operators.
    pub fn new(name: impl Into<String>, min: i64, count: usize, scalar: bool) -> Self {
        Self {
            name: name.into(),
            min,
            count: count.max(1),
            scalar,
            labels: None,
        }
    }

    /// Creates a discrete variable whose values `0..labels.len()` map to
    /// the given textual labels. Labelled variables are never scalar.
    pub fn with_labels(name: impl Into<String>, labels: Vec<String>) -> Self {
        let count = labels.len().max(1);
        Self {
            name: name.into(),
            min: 0,
            count,
            scalar: false,
            labels: Some(labels),
        }
    }

    /// The identifier of the variable.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The smallest value the variable can take.
    #[must_use]
    pub fn min(&self) -> i64 {
        self.min
    }

    /// The largest value the variable can take.
    #[must_use]
    pub fn max(&self) -> i64 {
        #[allow(clippy::cast_possible_wrap)]
        {
            self.min + self.count as i64 - 1
        }
    }

    /// The number of values the variable can take.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the values form an ordered scale.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.scalar
    }

    /// The textual label for a value, or its decimal rendering when the
    /// variable has no labels or the value is out of label range.
    #[must_use]
    pub fn value_label(&self, value: i64) -> String {
        if let Some(labels) = &self.labels {
            let offset = value - self.min;
            if offset >= 0 {
                #[allow(clippy::cast_sign_loss)]
                if let Some(label) = labels.get(offset as usize) {
                    return label.clone();
                }
            }
        }
        value.to_string()
    }

    /// Clamps a value into the valid range.
    #[must_use]
    pub fn validate(&self, value: i64) -> i64 {
        value.clamp(self.min, self.max())
    }

    /// Samples a value uniformly.
    pub fn sample(&self, rng: &mut fastrand::Rng) -> i64 {
        rng.i64(self.min..=self.max())
    }
}

/// A continuous decision variable over the closed interval `[min, max]`.
#[derive(Clone, Debug)]
pub struct ContVar {
    name: String,
    min: f64,
    max: f64,
}

impl ContVar {
    /// Creates a continuous variable over `[min, max]`. Reversed bounds are
    /// swapped.
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    /// The identifier of the variable.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lower bound of the variable.
    #[must_use]
    pub fn min(&self) -> f64 {
        self.min
    }

    /// The upper bound of the variable.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// The width of the interval.
    #[must_use]
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Clamps a value into `[min, max]`. NaN maps to the lower bound so
    /// validation stays idempotent even for invalid inputs.
    #[must_use]
    pub fn validate(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    /// Samples a value uniformly from `[min, max)`.
    pub fn sample(&self, rng: &mut fastrand::Rng) -> f64 {
        stats::f64_range(rng, self.min, self.max)
    }
}

/// The frozen definition of an optimization problem: its decision variables
/// and objectives.
///
/// Built once by the [`Optimizer`](crate::optimizer::Optimizer) at startup
/// and shared read-only with the population and every generator.
#[derive(Clone, Debug, Default)]
pub struct Problem {
    disc_vars: Vec<DiscVar>,
    cont_vars: Vec<ContVar>,
    objectives: Vec<Objective>,
}

impl Problem {
    pub(crate) fn new(
        disc_vars: Vec<DiscVar>,
        cont_vars: Vec<ContVar>,
        objectives: Vec<Objective>,
    ) -> Arc<Self> {
        Arc::new(Self {
            disc_vars,
            cont_vars,
            objectives,
        })
    }

    /// The discrete decision variables, in definition order.
    #[must_use]
    pub fn disc_vars(&self) -> &[DiscVar] {
        &self.disc_vars
    }

    /// The continuous decision variables, in definition order.
    #[must_use]
    pub fn cont_vars(&self) -> &[ContVar] {
        &self.cont_vars
    }

    /// The objectives, in definition order.
    #[must_use]
    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    /// Clamps every discrete value into its variable's range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueCountMismatch`] if fewer values than variables
    /// are provided.
    pub fn validate_disc_values(&self, values: &mut [i64]) -> Result<()> {
        if values.len() < self.disc_vars.len() {
            return Err(Error::ValueCountMismatch {
                expected: self.disc_vars.len(),
                got: values.len(),
            });
        }
        for (value, var) in values.iter_mut().zip(&self.disc_vars) {
            *value = var.validate(*value);
        }
        Ok(())
    }

    /// Clamps every continuous value into its variable's interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueCountMismatch`] if fewer values than variables
    /// are provided.
    pub fn validate_cont_values(&self, values: &mut [f64]) -> Result<()> {
        if values.len() < self.cont_vars.len() {
            return Err(Error::ValueCountMismatch {
                expected: self.cont_vars.len(),
                got: values.len(),
            });
        }
        for (value, var) in values.iter_mut().zip(&self.cont_vars) {
            *value = var.validate(*value);
        }
        Ok(())
    }

    /// Samples one uniformly random value vector pair.
    pub(crate) fn sample_values(&self, rng: &mut fastrand::Rng) -> (Vec<i64>, Vec<f64>) {
        let disc = self.disc_vars.iter().map(|v| v.sample(rng)).collect();
        let cont = self.cont_vars.iter().map(|v| v.sample(rng)).collect();
        (disc, cont)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disc_var_bounds_and_validation() {
        let var = DiscVar::new("layers", 2, 5, true);
        assert_eq!(var.min(), 2);
        assert_eq!(var.max(), 6);
        assert_eq!(var.validate(-3), 2);
        assert_eq!(var.validate(10), 6);
        assert_eq!(var.validate(4), 4);
    }

    #[test]
    fn test_disc_var_labels() {
        let var = DiscVar::with_labels("color", vec!["red".into(), "green".into()]);
        assert!(!var.is_scalar());
        assert_eq!(var.value_label(0), "red");
        assert_eq!(var.value_label(1), "green");
        assert_eq!(var.value_label(7), "7");
    }

    #[test]
    fn test_disc_var_sampling_stays_in_range() {
        let var = DiscVar::new("v", -1, 3, true);
        let mut rng = fastrand::Rng::with_seed(11);
        for _ in 0..200 {
            let v = var.sample(&mut rng);
            assert!((-1..=1).contains(&v));
        }
    }

    #[test]
    fn test_cont_var_validation_is_idempotent() {
        let var = ContVar::new("x", 0.0, 5.0);
        for raw in [-3.0, 0.0, 2.5, 5.0, 17.0, f64::NAN] {
            let once = var.validate(raw);
            assert!((0.0..=5.0).contains(&once));
            assert_eq!(var.validate(once), once);
        }
    }

    #[test]
    fn test_cont_var_swaps_reversed_bounds() {
        let var = ContVar::new("x", 5.0, -1.0);
        assert_eq!(var.min(), -1.0);
        assert_eq!(var.max(), 5.0);
    }

    #[test]
    fn test_problem_validates_value_vectors() {
        let problem = Problem::new(
            vec![DiscVar::new("d", 0, 3, true)],
            vec![ContVar::new("c", 0.0, 1.0)],
            vec![],
        );
        let mut disc = vec![9];
        let mut cont = vec![-0.5];
        problem.validate_disc_values(&mut disc).unwrap();
        problem.validate_cont_values(&mut cont).unwrap();
        assert_eq!(disc, vec![2]);
        assert_eq!(cont, vec![0.0]);

        let mut short: Vec<i64> = vec![];
        assert!(matches!(
            problem.validate_disc_values(&mut short),
            Err(Error::ValueCountMismatch {
                expected: 1,
                got: 0
            })
        ));
    }
}
