//! Tab-delimited execution reports.
//!
//! One report file per run, sectioned with bracketed headers:
//! `[MAESTRO parameters]`, `[Generator methods]`, `[Generator method use]`,
//! `[Final population]` (or `[Pareto front]`), `[Hall of fame]`, and
//! `[All solutions]`. Each solution row carries the id, the generator short
//! id, the run-length-encoded rank history (e.g. `1x3, 2, -1x5`), the
//! user report fields, the discrete values as labels, and the continuous
//! values. [`read_report`] parses the solution tables back for round-trip
//! checks.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::optimizer::Optimizer;
use crate::solution::SolutionHandle;
use crate::variable::Problem;

const PARAMETERS_SECTION: &str = "[MAESTRO parameters]";
const GENERATORS_SECTION: &str = "[Generator methods]";
const GENERATION_HISTORY_SECTION: &str = "[Generator method use]";
const POPULATION_SECTION: &str = "[Final population]";
const PARETO_FRONT_SECTION: &str = "[Pareto front]";
const HALL_OF_FAME_SECTION: &str = "[Hall of fame]";
const ALL_SOLUTIONS_SECTION: &str = "[All solutions]";

/// Which report sections to include.
#[derive(Clone, Copy, Debug)]
pub struct ReportOptions {
    /// Include the parameter and generator configuration tables.
    pub write_config: bool,
    /// Include the entire population instead of only the Pareto front.
    pub entire_population: bool,
    /// Include the per-cycle generation history.
    pub write_generation_history: bool,
    /// Include the hall of fame.
    pub write_hall_of_fame: bool,
    /// Include every evaluated solution (requires history keeping).
    pub write_all_solutions: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            write_config: true,
            entire_population: true,
            write_generation_history: true,
            write_hall_of_fame: true,
            write_all_solutions: true,
        }
    }
}

/// Writes the execution report of an optimizer run.
///
/// # Errors
///
/// Returns [`Error::ReportIo`] if the file cannot be written.
pub fn write_report(
    optimizer: &Optimizer,
    path: impl AsRef<Path>,
    options: ReportOptions,
) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    let problem = optimizer.problem();

    writeln!(out, "MAESTRO execution report")?;
    writeln!(out, "Optimization problem: {}", optimizer.problem_name())?;
    writeln!(out, "Run index: {}", optimizer.run_index())?;
    writeln!(out, "Execution time: {} ms", optimizer.elapsed().as_millis())?;
    writeln!(out, "Solutions processed: {}", optimizer.eval_count())?;
    writeln!(out, "Terminated: {}", optimizer.termination_message())?;
    writeln!(out)?;

    if options.write_config {
        let ensemble = optimizer.ensemble_config();
        writeln!(out, "{PARAMETERS_SECTION}")?;
        writeln!(
            out,
            "Population capacity =\t{}",
            optimizer.population().capacity()
        )?;
        writeln!(
            out,
            "Equivalent performers allowed =\t{}",
            optimizer.population().allow_equal_performers()
        )?;
        writeln!(
            out,
            "Random solution ratio =\t{}",
            optimizer.random_solution_ratio()
        )?;
        writeln!(out, "Time limit =\t{} ms", optimizer.time_limit().as_millis())?;
        writeln!(out, "Solution limit =\t{}", optimizer.solution_limit())?;
        writeln!(out, "Number of threads =\t{}", optimizer.thread_count())?;
        writeln!(
            out,
            "Concurrent updates allowed =\t{}",
            optimizer.concurrent_updates()
        )?;
        writeln!(out, "Generation ratio =\t{}", ensemble.gen_ratio)?;
        writeln!(out, "Generation minimum =\t{}", ensemble.gen_min)?;
        writeln!(out, "Absolute generation minimum =\t{}", ensemble.abs_gen_min)?;
        writeln!(out, "Population weight (for generation) =\t{}", ensemble.weight_pop)?;
        writeln!(
            out,
            "Front 1 weight (for generation) =\t{}",
            ensemble.weight_front1
        )?;
        writeln!(out)?;

        writeln!(out, "{GENERATORS_SECTION}")?;
        writeln!(out, "Generator\tTotal solutions\tParameters")?;
        for info in optimizer.generator_info() {
            writeln!(
                out,
                "{} ({})\t{}\t{}",
                info.id, info.short_id, info.total_generated, info.param_summary
            )?;
        }
        writeln!(out)?;
    }

    if options.write_generation_history {
        writeln!(out, "{GENERATION_HISTORY_SECTION}")?;
        writeln!(
            out,
            "Generation\tGenerator\tSolutions generated\tTotal time (ms)\tTime for each (ms)"
        )?;
        for record in optimizer.generation_history() {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                record.cycle,
                record.generator_id,
                record.solutions,
                record.total_time_ms,
                record.time_per_solution_ms
            )?;
        }
        writeln!(out)?;
    }

    let (section, best) = if options.entire_population {
        (POPULATION_SECTION, optimizer.solutions_in_population())
    } else {
        (PARETO_FRONT_SECTION, optimizer.first_front())
    };
    write_solution_table(&mut out, optimizer, &problem, section, &best)?;

    if options.write_hall_of_fame {
        write_solution_table(
            &mut out,
            optimizer,
            &problem,
            HALL_OF_FAME_SECTION,
            &optimizer.hall_of_fame(),
        )?;
    }

    if options.write_all_solutions {
        if let Some(all) = optimizer.all_solutions() {
            write_solution_table(&mut out, optimizer, &problem, ALL_SOLUTIONS_SECTION, &all)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn write_solution_table(
    out: &mut impl Write,
    optimizer: &Optimizer,
    problem: &Arc<Problem>,
    section: &str,
    solutions: &[Arc<SolutionHandle>],
) -> Result<()> {
    if solutions.is_empty() {
        return Ok(());
    }
    writeln!(out, "{section}")?;

    let mut header = vec![
        "Solution".to_string(),
        "Generator".to_string(),
        "Rank history".to_string(),
    ];
    let user_header = optimizer.report_header();
    if !user_header.is_empty() {
        header.push(user_header);
    }
    for var in problem.disc_vars() {
        header.push(var.name().to_string());
    }
    for var in problem.cont_vars() {
        header.push(var.name().to_string());
    }
    writeln!(out, "{}", header.join("\t"))?;

    for handle in solutions {
        let mut fields = vec![
            handle.id(),
            optimizer.generator_short_id(handle),
            encode_rank_history(&handle.rank_history()),
        ];
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
        writeln!(out, "{}", fields.join("\t"))?;
    }
    writeln!(out)?;
    Ok(())
}

/// Run-length-encodes a rank history, e.g. `[1, 1, 1, 2, -1]` becomes
/// `1x3, 2, -1`.
#[must_use]
pub fn encode_rank_history(history: &[i32]) -> String {
    let mut runs: Vec<(i32, usize)> = Vec::new();
    for &rank in history {
        match runs.last_mut() {
            Some((last, count)) if *last == rank => *count += 1,
            _ => runs.push((rank, 1)),
        }
    }
    runs.iter()
        .map(|&(rank, count)| {
            if count > 1 {
                format!("{rank}x{count}")
            } else {
                rank.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Decodes a run-length-encoded rank history.
///
/// # Errors
///
/// Returns [`Error::ReportParse`] (with `line` 0) when a token is not of
/// the form `rank` or `rankxcount`.
pub fn decode_rank_history(text: &str) -> Result<Vec<i32>> {
    let mut history = Vec::new();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(history);
    }
    for token in trimmed.split(',') {
        let token = token.trim();
        let (rank, count) = match token.split_once('x') {
            Some((rank, count)) => (
                rank.parse::<i32>(),
                count.parse::<usize>().map_err(|_| Error::ReportParse {
                    line: 0,
                    reason: format!("invalid run length in {token:?}"),
                })?,
            ),
            None => (token.parse::<i32>(), 1),
        };
        let rank = rank.map_err(|_| Error::ReportParse {
            line: 0,
            reason: format!("invalid rank in {token:?}"),
        })?;
        history.extend(std::iter::repeat(rank).take(count));
    }
    Ok(history)
}

/// One parsed solution row of a report table.
#[derive(Clone, Debug, PartialEq)]
pub struct SolutionRow {
    /// The solution identifier.
    pub id: String,
    /// The generator short identifier (or user label).
    pub generator: String,
    /// The decoded rank history.
    pub rank_history: Vec<i32>,
    /// The remaining fields: user report values, then variable values.
    pub fields: Vec<String>,
}

/// The solution tables parsed back from a report file, keyed by section
/// name (without brackets).
#[derive(Clone, Debug, Default)]
pub struct ParsedReport {
    /// Parsed solution tables by section name.
    pub sections: BTreeMap<String, Vec<SolutionRow>>,
}

impl ParsedReport {
    /// The rows of the given section, if present.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&[SolutionRow]> {
        self.sections.get(name).map(Vec::as_slice)
    }
}

/// Reads the solution tables of a report file written by [`write_report`].
///
/// # Errors
///
/// Returns [`Error::ReportIo`] if the file cannot be read and
/// [`Error::ReportParse`] on malformed rows.
pub fn read_report(path: impl AsRef<Path>) -> Result<ParsedReport> {
    let solution_sections = [
        POPULATION_SECTION,
        PARETO_FRONT_SECTION,
        HALL_OF_FAME_SECTION,
        ALL_SOLUTIONS_SECTION,
    ];

    let reader = BufReader::new(File::open(path)?);
    let mut report = ParsedReport::default();
    let mut current: Option<String> = None;
    let mut expecting_header = false;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = index + 1;

        if line.starts_with('[') {
            current = solution_sections
                .iter()
                .find(|s| **s == line)
                .map(|s| s.trim_matches(['[', ']']).to_string());
            if let Some(name) = &current {
                report.sections.entry(name.clone()).or_default();
                expecting_header = true;
            }
            continue;
        }
        let Some(section) = current.clone() else {
            continue;
        };
        if line.trim().is_empty() {
            current = None;
            continue;
        }
        if expecting_header {
            expecting_header = false;
            continue;
        }

        let mut columns = line.split('\t');
        let (Some(id), Some(generator), Some(ranks)) =
            (columns.next(), columns.next(), columns.next())
        else {
            return Err(Error::ReportParse {
                line: line_number,
                reason: "expected at least 3 tab-separated columns".to_string(),
            });
        };
        let rank_history = decode_rank_history(ranks).map_err(|e| match e {
            Error::ReportParse { reason, .. } => Error::ReportParse {
                line: line_number,
                reason,
            },
            other => other,
        })?;
        if let Some(rows) = report.sections.get_mut(&section) {
            rows.push(SolutionRow {
                id: id.to_string(),
                generator: generator.to_string(),
                rank_history,
                fields: columns.map(ToString::to_string).collect(),
            });
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_rank_history_examples() {
        assert_eq!(encode_rank_history(&[1, 1, 1, 2, -1, -1, -1, -1, -1]), "1x3, 2, -1x5");
        assert_eq!(encode_rank_history(&[1]), "1");
        assert_eq!(encode_rank_history(&[]), "");
        assert_eq!(encode_rank_history(&[2, 2]), "2x2");
    }

    #[test]
    fn test_rank_history_round_trip() {
        let histories: [&[i32]; 4] = [&[1, 1, 1, 2, -1], &[3], &[], &[1, 2, 1, 2]];
        for history in histories {
            let encoded = encode_rank_history(history);
            assert_eq!(decode_rank_history(&encoded).unwrap(), history);
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_rank_history("1x").is_err());
        assert!(decode_rank_history("abc").is_err());
        assert!(decode_rank_history("1xtwo").is_err());
    }
}
