//! Survey generation for apodized-pupil Lyot coronagraph design studies
//!
//! A design study starts from a compact specification: a few parameters over
//! the pupil, the focal-plane mask, the Lyot stop and the image constraints,
//! any of which may hold a sequence of candidate values. This crate validates
//! the specification against the schema of the chosen coronagraph class,
//! expands the sequences into the full Cartesian product of design points,
//! derives a deterministic collision-free name per point, resolves where each
//! point reads its input masks and writes its outputs, and renders one AMPL
//! optimization program per point for the solver queue to run.
//!
//! The expansion never aborts on a bad entry: unknown, ill-typed or empty
//! entries are dropped with a [`Warning`] collected in a caller-owned
//! [`Diagnostics`] sink and the rest of the survey proceeds.
//!
//! ```no_run
//! use aplc_survey::{DesignSurvey, Diagnostics, EmitOptions, FullAplc};
//!
//! # fn main() -> anyhow::Result<()> {
//! let params = toml::from_str(
//!     r#"
//! [FPM]
//! rad = [3.5, 4.0, 4.5]
//! "#,
//! )?;
//! let mut diag = Diagnostics::new();
//! let survey = DesignSurvey::expand(
//!     FullAplc,
//!     &params,
//!     &Default::default(),
//!     &Default::default(),
//!     &mut diag,
//! )?;
//! for (name, outcome) in survey.write_models(&EmitOptions::default()) {
//!     println!("{name}: {}", outcome?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod design;
pub mod diagnostics;
mod error;
pub mod fileorg;
pub mod mask;
pub mod model;
pub mod naming;
pub mod params;
pub mod solver;
pub mod survey;

pub use design::ApodizerDesign;
pub use diagnostics::{Diagnostics, Warning};
pub use error::Error;
pub use fileorg::{DesignFiles, FileOrg, RawFileOrg, Slot};
pub use mask::MaskGrid;
pub use model::{Coronagraph, EmitOptions, EmitOutcome, FullAplc, HalfAplc, ModelHeader};
pub use naming::DesignName;
pub use params::{DesignConfig, ParamKind, ParamValue, RawConfig, Schema};
pub use solver::{Backend, ConstraintForm, Method, RawSolverOptions, SolverOptions};
pub use survey::{AxisInput, DesignSurvey, RawSurveyConfig, SurveyAxis, SurveyState};
