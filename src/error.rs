#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when optimization is started with no decision variables.
    #[error("no discrete or continuous decision variables were defined")]
    NoVariables,

    /// Returned when optimization is started with no objectives.
    #[error("no optimization objectives were defined")]
    NoObjectives,

    /// Returned when a buffer refill is requested but the population holds
    /// no solutions at all (neither in fronts nor in its buffer).
    #[error("the population is empty")]
    EmptyPopulation,

    /// Returned when a value vector is shorter than the variable list.
    #[error("the value list has {got} values; there are {expected} variables")]
    ValueCountMismatch {
        /// The number of variables defined for the problem.
        expected: usize,
        /// The number of values actually provided.
        got: usize,
    },

    /// Returned when a user evaluator panics. The offending solution is
    /// discarded and the worker continues.
    #[error("evaluation failed: {0}")]
    EvaluationFailed(String),

    /// Returned when the delta matrix of a gradient vicinity cannot be
    /// decomposed. Generators convert this into an empty batch.
    #[error("the delta matrix is singular; gradients cannot be solved")]
    SingularDeltas,

    /// Returned when a report or hall-of-fame file cannot be written or read.
    #[error("report I/O error: {0}")]
    ReportIo(#[from] std::io::Error),

    /// Returned when a report file cannot be parsed back.
    #[error("report parse error at line {line}: {reason}")]
    ReportParse {
        /// 1-based line number in the report file.
        line: usize,
        /// What went wrong on that line.
        reason: String,
    },
}

pub type Result<T> = core::result::Result<T, Error>;
