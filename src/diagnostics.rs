//! Recoverable configuration problems and the sink that collects them.
//!
//! Validation and resolution never abort on bad input: the offending entry is
//! dropped, a [`Warning`] is recorded and the run carries on. The sink is
//! created by the caller and threaded through the validator, the file
//! organization resolver and the survey screen, so a survey driver owns the
//! complete account of what was ignored.

use std::path::PathBuf;

use crate::fileorg::Slot;
use crate::params::ParamKind;

/// A dropped or defaulted configuration entry
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Warning {
    #[error("unknown category {category:?}, its contents are ignored")]
    UnknownCategory { category: String },
    #[error("unknown parameter {category:?}/{param:?}, entry ignored")]
    UnknownParam { category: String, param: String },
    #[error("parameter {category:?}/{param:?} is derived, the supplied value is ignored")]
    DerivedParam { category: String, param: String },
    #[error("{category:?}/{param:?} expects a {expected} but a {got} was supplied, entry ignored")]
    TypeMismatch {
        category: String,
        param: String,
        expected: ParamKind,
        got: ParamKind,
    },
    #[error("{category:?}/{param:?} was supplied as an empty sequence, axis ignored")]
    EmptyAxis { category: String, param: String },
    #[error("{slot:?} is not a recognized file organization slot, entry ignored")]
    UnknownSlot { slot: String },
    #[error("the {slot} {path:?} does not exist on disk")]
    MissingDir { slot: Slot, path: PathBuf },
    #[error("the {slot} {path:?} was not found ({siblings} other mask(s) in its directory)")]
    MissingInput {
        slot: Slot,
        path: PathBuf,
        siblings: usize,
    },
    #[error("unknown solver option {option:?}, entry ignored")]
    UnknownSolverOption { option: String },
    #[error("solver option {option} does not accept {value:?}, reverting to its default")]
    BadSolverValue {
        option: &'static str,
        value: String,
    },
    #[error("bandwidth {bw} leaves no usable band, image sampling falls back to the band center")]
    BadBandwidth { bw: f64 },
}

/// Caller-owned warning sink
///
/// Every warning is forwarded to [`log::warn!`] as it is recorded, so console
/// output does not depend on the caller ever reading the sink back.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }
    /// Record a warning and forward it to the logger
    pub fn warn(&mut self, warning: Warning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }
    /// Every warning recorded so far, in order
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
    pub fn len(&self) -> usize {
        self.warnings.len()
    }
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_accumulate_in_order() {
        let mut diag = Diagnostics::new();
        assert!(diag.is_empty());
        diag.warn(Warning::UnknownCategory {
            category: "Telescope".into(),
        });
        diag.warn(Warning::UnknownSolverOption {
            option: "verbosity".into(),
        });
        assert_eq!(diag.len(), 2);
        assert!(matches!(
            diag.warnings()[0],
            Warning::UnknownCategory { .. }
        ));
        assert!(matches!(
            diag.warnings()[1],
            Warning::UnknownSolverOption { .. }
        ));
    }
}
