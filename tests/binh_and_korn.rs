//! End-to-end scenario: the Binh-and-Korn problem, plus the report
//! write/read round trip.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{bak_optimizer, temp_path, CountingMonitor};
use maestro_mo::{read_report, ReportOptions};

#[test]
fn binh_and_korn_finds_consistent_pareto_front() {
    let monitor = Arc::new(CountingMonitor::default());
    let optimizer = bak_optimizer(Arc::clone(&monitor), 50);
    optimizer.set_thread_count(2);

    optimizer
        .optimize(Duration::from_secs(5), 1000)
        .expect("problem is fully defined");

    assert_eq!(monitor.terminations.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(optimizer.eval_count() >= 50, "too few evaluations ran");
    assert!(optimizer.population().size() <= 50);

    let front = optimizer.first_front();
    assert!(!front.is_empty());
    for solution in &front {
        let values = solution.solution().cont_values();
        let (x, y) = (values[0], values[1]);
        assert!((0.0..=5.0).contains(&x), "x out of bounds: {x}");
        assert!((0.0..=3.0).contains(&y), "y out of bounds: {y}");
        // Reported fitness is exactly the analytic objective.
        assert!(
            (4.0 * x * x + 4.0 * y * y - solution.fitness(0)).abs() < 1e-9,
            "fitness 0 inconsistent at x = {x}, y = {y}"
        );
        assert!(
            ((x - 5.0).powi(2) + (y - 5.0).powi(2) - solution.fitness(1)).abs() < 1e-9,
            "fitness 1 inconsistent at x = {x}, y = {y}"
        );
    }

    // Mutual non-domination on the first front (both objectives minimized).
    for a in &front {
        for b in &front {
            if a.index() == b.index() {
                continue;
            }
            let dominates = a.fitness(0) <= b.fitness(0)
                && a.fitness(1) <= b.fitness(1)
                && (a.fitness(0) < b.fitness(0) || a.fitness(1) < b.fitness(1));
            assert!(!dominates, "{} dominates {} inside front 1", a.id(), b.id());
        }
    }
}

#[test]
fn report_round_trip_preserves_solutions() {
    let monitor = Arc::new(CountingMonitor::default());
    let optimizer = bak_optimizer(Arc::clone(&monitor), 20);

    optimizer
        .optimize(Duration::from_secs(5), 200)
        .expect("problem is fully defined");

    let path = temp_path("report", "txt");
    optimizer
        .write_report(&path, ReportOptions::default())
        .expect("report writes");

    let parsed = read_report(&path).expect("report parses back");
    let rows = parsed
        .section("Final population")
        .expect("population section present");

    let population = optimizer.solutions_in_population();
    assert_eq!(rows.len(), population.len());
    for (row, handle) in rows.iter().zip(&population) {
        assert_eq!(row.id, handle.id());
        assert_eq!(row.rank_history, handle.rank_history());
        // Fields: obj1, obj2 (the user report), then x and y.
        assert_eq!(row.fields.len(), 4);
        let obj1: f64 = row.fields[0].parse().expect("obj1 parses");
        let obj2: f64 = row.fields[1].parse().expect("obj2 parses");
        assert!((obj1 - handle.fitness(0)).abs() < 1e-9);
        assert!((obj2 - handle.fitness(1)).abs() < 1e-9);
    }

    // The all-solutions table covers every evaluation.
    let all_rows = parsed.section("All solutions").expect("all solutions present");
    assert_eq!(all_rows.len() as u64, optimizer.eval_count());

    std::fs::remove_file(&path).ok();
}
