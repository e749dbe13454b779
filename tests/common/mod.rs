//! Shared fixtures for the integration tests: the Binh-and-Korn problem
//! and a monitor that counts its notifications.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use maestro_mo::{Evaluator, Extra, Monitor, Optimizer, Solution};

pub struct BakSolution {
    pub id: String,
    pub cont: [f64; 2],
    pub obj1: f64,
    pub obj2: f64,
}

impl BakSolution {
    pub fn new(id: String, x: f64, y: f64) -> Self {
        Self {
            id,
            cont: [x, y],
            obj1: 4.0 * x * x + 4.0 * y * y,
            obj2: (x - 5.0).powi(2) + (y - 5.0).powi(2),
        }
    }
}

impl Solution for BakSolution {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn disc_values(&self) -> &[i64] {
        &[]
    }

    fn cont_values(&self) -> &[f64] {
        &self.cont
    }

    fn report(&self) -> String {
        format!("{}\t{}", self.obj1, self.obj2)
    }

    fn fitness(&self, objective: usize) -> f64 {
        match objective {
            0 => self.obj1,
            1 => self.obj2,
            _ => f64::NAN,
        }
    }
}

pub struct BakEvaluator;

impl Evaluator for BakEvaluator {
    fn create_new(
        &self,
        index: u64,
        _disc: &[i64],
        cont: &[f64],
        _extra: Option<&Extra>,
    ) -> Box<dyn Solution> {
        Box::new(BakSolution::new(format!("Solution {index}"), cont[0], cont[1]))
    }

    fn report_header(&self) -> String {
        "obj1\tobj2".to_string()
    }
}

/// Counts terminations and remembers the last reason.
#[derive(Default)]
pub struct CountingMonitor {
    pub terminations: AtomicUsize,
    pub resets: AtomicUsize,
    pub last_reason: Mutex<String>,
}

impl Monitor for CountingMonitor {
    fn terminate(&self, reason: &str) {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        *self.last_reason.lock().unwrap() = reason.to_string();
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Builds a Binh-and-Korn optimizer with the given monitor.
pub fn bak_optimizer(monitor: Arc<CountingMonitor>, capacity: usize) -> Optimizer {
    let optimizer = Optimizer::new(
        "Binh and Korn function",
        1,
        Arc::new(BakEvaluator),
        monitor,
        true,
    );
    optimizer.set_population_capacity(capacity);
    optimizer.add_cont_var("x", 0.0, 5.0);
    optimizer.add_cont_var("y", 0.0, 3.0);
    optimizer.add_numeric_objective(0, "Objective 1", false);
    optimizer.add_numeric_objective(1, "Objective 2", false);
    optimizer
}

/// A unique path in the system temp directory.
pub fn temp_path(prefix: &str, extension: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    std::env::temp_dir().join(format!(
        "maestro_{prefix}_{}_{}.{extension}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ))
}
