//! The Binh-and-Korn two-objective test problem.
//!
//! Minimizes `f1 = 4x² + 4y²` and `f2 = (x − 5)² + (y − 5)²` over
//! `x ∈ [0, 5]`, `y ∈ [0, 3]`, then prints the Pareto front and writes the
//! execution report next to the working directory.

use std::sync::Arc;
use std::time::Duration;

use maestro_mo::{Evaluator, Extra, Monitor, Optimizer, ReportOptions, Solution};

struct BakSolution {
    id: String,
    cont: [f64; 2],
    obj1: f64,
    obj2: f64,
}

impl BakSolution {
    fn new(id: String, x: f64, y: f64) -> Self {
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

struct BakEvaluator;

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

struct PrintingMonitor;

impl Monitor for PrintingMonitor {
    fn terminate(&self, reason: &str) {
        println!("Optimization finished: {reason}");
    }
}

fn main() {
    let optimizer = Optimizer::new(
        "Binh and Korn function",
        1,
        Arc::new(BakEvaluator),
        Arc::new(PrintingMonitor),
        true,
    );
    optimizer.set_population_capacity(50);
    optimizer.set_thread_count(4);
    optimizer.add_cont_var("x", 0.0, 5.0);
    optimizer.add_cont_var("y", 0.0, 3.0);
    optimizer.add_numeric_objective(0, "Objective 1", false);
    optimizer.add_numeric_objective(1, "Objective 2", false);

    println!("Optimization started");
    optimizer
        .optimize(Duration::from_secs(5), 1000)
        .expect("the problem definition is complete");

    println!("\nPareto front:");
    for solution in optimizer.first_front() {
        println!(
            "{}\tx = {:.4}\ty = {:.4}\tf1 = {:.4}\tf2 = {:.4}",
            solution.id(),
            solution.solution().cont_values()[0],
            solution.solution().cont_values()[1],
            solution.fitness(0),
            solution.fitness(1),
        );
    }

    let report_path = std::env::temp_dir().join("binh_and_korn_report.txt");
    optimizer
        .write_report(&report_path, ReportOptions::default())
        .expect("report directory is writable");
    println!("\nReport written to {}", report_path.display());
}
