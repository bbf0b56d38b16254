//! Solver options: validation, the identity token and the backend directives.

use std::collections::BTreeMap;
use std::fmt;

use crate::diagnostics::{Diagnostics, Warning};
use crate::params::ParamValue;

#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error(r#"{0:?} is not a constraint formulation, expected "lin" or "quad""#)]
    ConstraintForm(String),
    #[error(r#"{0:?} is not an optimization method, expected "bar", "barhom" or "dualsimp""#)]
    Method(String),
    #[error(r#"{0:?} is not a solver backend, expected "gurobi" or "cplex""#)]
    Backend(String),
}
pub type Result<T> = std::result::Result<T, SolverError>;

/// Formulation of the dark-zone contrast constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintForm {
    /// two-sided bounds on the field amplitude
    Linear,
    /// one bound on the field intensity
    Quadratic,
}
impl ConstraintForm {
    pub fn new(token: &str) -> Result<Self> {
        match token {
            "lin" => Ok(Self::Linear),
            "quad" => Ok(Self::Quadratic),
            other => Err(SolverError::ConstraintForm(other.to_string())),
        }
    }
}
impl fmt::Display for ConstraintForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "lin"),
            Self::Quadratic => write!(f, "quad"),
        }
    }
}

/// Optimization method requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Barrier,
    BarrierHomogeneous,
    DualSimplex,
}
impl Method {
    pub fn new(token: &str) -> Result<Self> {
        match token {
            "bar" => Ok(Self::Barrier),
            "barhom" => Ok(Self::BarrierHomogeneous),
            "dualsimp" => Ok(Self::DualSimplex),
            other => Err(SolverError::Method(other.to_string())),
        }
    }
}
impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Barrier => write!(f, "bar"),
            Self::BarrierHomogeneous => write!(f, "barhom"),
            Self::DualSimplex => write!(f, "dualsimp"),
        }
    }
}

/// Solver backend the generated program is executed with
///
/// The backend changes the emitted option directives only, never the design
/// identity: the same design solved with either backend shares its name and
/// its file slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Gurobi,
    Cplex,
}
impl Backend {
    pub fn new(token: &str) -> Result<Self> {
        match token {
            "gurobi" => Ok(Self::Gurobi),
            "cplex" => Ok(Self::Cplex),
            other => Err(SolverError::Backend(other.to_string())),
        }
    }
}
impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gurobi => write!(f, "gurobi"),
            Self::Cplex => write!(f, "cplex"),
        }
    }
}

/// Caller-supplied solver options, prior to validation
pub type RawSolverOptions = BTreeMap<String, ParamValue>;

/// Validated solver options
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub constr: ConstraintForm,
    pub method: Method,
    pub presolve: bool,
    pub threads: Option<u32>,
    pub backend: Backend,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            constr: ConstraintForm::Linear,
            method: Method::Barrier,
            presolve: true,
            threads: None,
            backend: Backend::Gurobi,
        }
    }
}

impl SolverOptions {
    /// Validate a caller-supplied mapping, reverting bad entries to defaults
    pub fn resolve(raw: &RawSolverOptions, diag: &mut Diagnostics) -> Self {
        let mut options = Self::default();
        for (option, value) in raw {
            match option.as_str() {
                "constr" => {
                    if let Some(constr) = token_of(value, "constr", ConstraintForm::new, diag) {
                        options.constr = constr;
                    }
                }
                "method" => {
                    if let Some(method) = token_of(value, "method", Method::new, diag) {
                        options.method = method;
                    }
                }
                "solver" => {
                    if let Some(backend) = token_of(value, "solver", Backend::new, diag) {
                        options.backend = backend;
                    }
                }
                "presolve" => match value {
                    ParamValue::Bool(presolve) => options.presolve = *presolve,
                    _ => diag.warn(Warning::BadSolverValue {
                        option: "presolve",
                        value: value.to_string(),
                    }),
                },
                "threads" => match value {
                    ParamValue::Int(threads)
                        if *threads > 0 && *threads <= i64::from(u32::MAX) =>
                    {
                        options.threads = Some(*threads as u32);
                    }
                    _ => diag.warn(Warning::BadSolverValue {
                        option: "threads",
                        value: value.to_string(),
                    }),
                },
                _ => diag.warn(Warning::UnknownSolverOption {
                    option: option.clone(),
                }),
            }
        }
        options
    }

    /// The solver sub-name of the design identity
    ///
    /// Encodes the formulation, the method, the presolve flag and the thread
    /// count. The backend is deliberately left out.
    pub fn token(&self) -> String {
        let mut token = format!("{}{}", self.constr, self.method);
        if self.presolve {
            token.push_str("pre");
        }
        if let Some(threads) = self.threads {
            token.push_str(&format!("t{threads:02}"));
        }
        token
    }

    /// The backend option directive of the generated program
    pub fn option_line(&self) -> String {
        match self.backend {
            Backend::Gurobi => {
                let method = match self.method {
                    Method::Barrier => "method=2 crossover=0",
                    Method::BarrierHomogeneous => "method=2 barhomogeneous=1 crossover=0",
                    Method::DualSimplex => "method=1",
                };
                let mut line = format!("option gurobi_options \"outlev=1 {method}");
                if !self.presolve {
                    line.push_str(" presolve=0");
                }
                if let Some(threads) = self.threads {
                    line.push_str(&format!(" threads={threads}"));
                }
                line.push_str("\";");
                line
            }
            Backend::Cplex => {
                let method = match self.method {
                    Method::Barrier | Method::BarrierHomogeneous => "baropt",
                    Method::DualSimplex => "dualopt",
                };
                let mut line = format!("option cplex_options \"{method} display=1");
                if !self.presolve {
                    line.push_str(" presolve=0");
                }
                if let Some(threads) = self.threads {
                    line.push_str(&format!(" threads={threads}"));
                }
                line.push_str("\";");
                line
            }
        }
    }
}

/// Parse an option that takes a fixed string token, warning on anything else
fn token_of<T>(
    value: &ParamValue,
    option: &'static str,
    parse: impl Fn(&str) -> Result<T>,
    diag: &mut Diagnostics,
) -> Option<T> {
    if let ParamValue::Str(token) = value {
        if let Ok(parsed) = parse(token) {
            return Some(parsed);
        }
    }
    diag.warn(Warning::BadSolverValue {
        option,
        value: value.to_string(),
    });
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(entries: &[(&str, ParamValue)]) -> RawSolverOptions {
        entries
            .iter()
            .map(|(option, value)| (option.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn defaults() {
        let mut diag = Diagnostics::new();
        let options = SolverOptions::resolve(&RawSolverOptions::new(), &mut diag);
        assert!(diag.is_empty());
        assert_eq!(options.constr, ConstraintForm::Linear);
        assert_eq!(options.method, Method::Barrier);
        assert!(options.presolve);
        assert_eq!(options.threads, None);
        assert_eq!(options.backend, Backend::Gurobi);
        assert_eq!(options.token(), "linbarpre");
    }

    #[test]
    fn full_token() {
        let mut diag = Diagnostics::new();
        let options = SolverOptions::resolve(
            &raw(&[
                ("constr", "quad".into()),
                ("method", "barhom".into()),
                ("threads", 8.into()),
            ]),
            &mut diag,
        );
        assert!(diag.is_empty());
        assert_eq!(options.token(), "quadbarhompret08");
    }

    #[test]
    fn presolve_off_leaves_the_token_bare() {
        let mut diag = Diagnostics::new();
        let options =
            SolverOptions::resolve(&raw(&[("presolve", false.into())]), &mut diag);
        assert_eq!(options.token(), "linbar");
    }

    #[test]
    fn backend_does_not_reach_the_token() {
        let mut diag = Diagnostics::new();
        let gurobi = SolverOptions::resolve(&RawSolverOptions::new(), &mut diag);
        let cplex = SolverOptions::resolve(&raw(&[("solver", "cplex".into())]), &mut diag);
        assert!(diag.is_empty());
        assert_eq!(gurobi.token(), cplex.token());
        assert_ne!(gurobi.option_line(), cplex.option_line());
    }

    #[test]
    fn bad_entries_revert_to_defaults_with_a_warning() {
        let mut diag = Diagnostics::new();
        let options = SolverOptions::resolve(
            &raw(&[
                ("method", "simplex".into()),
                ("threads", 0.into()),
                ("verbosity", 3.into()),
            ]),
            &mut diag,
        );
        assert_eq!(diag.len(), 3);
        assert_eq!(options.method, Method::Barrier);
        assert_eq!(options.threads, None);
        assert!(diag
            .warnings()
            .iter()
            .any(|warning| matches!(warning, Warning::UnknownSolverOption { option } if option == "verbosity")));
    }

    #[test]
    fn oversized_thread_counts_revert_with_a_warning() {
        let mut diag = Diagnostics::new();
        let options =
            SolverOptions::resolve(&raw(&[("threads", 4294967296_i64.into())]), &mut diag);
        assert_eq!(diag.len(), 1);
        assert!(matches!(
            diag.warnings()[0],
            Warning::BadSolverValue {
                option: "threads",
                ..
            }
        ));
        assert_eq!(options.threads, None);
        assert_eq!(options.token(), "linbarpre");
        assert!(!options.option_line().contains("threads"));
        // the largest representable count still passes
        let options =
            SolverOptions::resolve(&raw(&[("threads", i64::from(u32::MAX).into())]), &mut diag);
        assert_eq!(options.threads, Some(u32::MAX));
    }

    #[test]
    fn gurobi_directive_tracks_the_options() {
        let mut diag = Diagnostics::new();
        let options = SolverOptions::resolve(
            &raw(&[
                ("method", "dualsimp".into()),
                ("presolve", false.into()),
                ("threads", 4.into()),
            ]),
            &mut diag,
        );
        assert_eq!(
            options.option_line(),
            "option gurobi_options \"outlev=1 method=1 presolve=0 threads=4\";"
        );
    }
}
