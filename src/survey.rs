//! Expansion of a compact multi-valued specification into concrete designs.
//!
//! Any parameter of the schema may be supplied as a sequence of candidate
//! values instead of a scalar. Every sequence becomes a survey axis, a
//! sequence of one still counts, and the survey is the full Cartesian product
//! of the axes in canonical schema order, the first declared axis varying
//! slowest. All designs of a survey share one resolved file organization and
//! one set of solver options.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::design::{ApodizerDesign, DesignError};
use crate::diagnostics::{Diagnostics, Warning};
use crate::fileorg::{FileOrg, RawFileOrg};
use crate::model::{Coronagraph, EmitOptions, EmitOutcome};
use crate::params::{DesignConfig, ParamValue};
use crate::solver::{RawSolverOptions, SolverOptions};

#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    #[error("design construction error")]
    Design(#[from] DesignError),
    #[error("failed to access the survey state file")]
    Io(#[from] std::io::Error),
    #[error("failed to encode or decode the survey state")]
    Pickle(#[from] serde_pickle::Error),
    #[error("failed to write the survey table")]
    Csv(#[from] csv::Error),
}
pub type Result<T> = std::result::Result<T, SurveyError>;

/// A value supplied for one parameter of a survey: one candidate or a
/// sequence of candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisInput {
    One(ParamValue),
    Many(Vec<ParamValue>),
}

/// Caller-supplied survey specification, prior to validation
pub type RawSurveyConfig = BTreeMap<String, BTreeMap<String, Option<AxisInput>>>;

/// One varied axis, an ordered sequence of candidate values for one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyAxis {
    pub category: String,
    pub param: String,
    pub values: Vec<ParamValue>,
}

enum Screened {
    One(ParamValue),
    Many(Vec<ParamValue>),
    Null,
}

/// The Cartesian expansion of a survey specification
#[derive(Debug)]
pub struct DesignSurvey<V: Coronagraph> {
    variant: V,
    fileorg: Arc<FileOrg>,
    solver: Arc<SolverOptions>,
    fixed: Vec<(String, String, Option<ParamValue>)>,
    varied: Vec<SurveyAxis>,
    designs: Vec<ApodizerDesign<V>>,
}

impl<V: Coronagraph> DesignSurvey<V> {
    /// Screen a survey specification and expand it into one design per
    /// combination of axis candidates
    pub fn expand(
        variant: V,
        params: &RawSurveyConfig,
        fileorg: &RawFileOrg,
        solver: &RawSolverOptions,
        diag: &mut Diagnostics,
    ) -> Result<Self> {
        let schema = variant.schema();
        let fileorg = Arc::new(FileOrg::resolve(fileorg, diag));
        let solver = Arc::new(SolverOptions::resolve(solver, diag));

        // screen the supplied entries, deferring default filling to the
        // partition below so a defaulted parameter never becomes an axis
        let mut screened: BTreeMap<(String, String), Screened> = BTreeMap::new();
        for (category, entries) in params {
            let Some(category_spec) = schema.category(category) else {
                diag.warn(Warning::UnknownCategory {
                    category: category.clone(),
                });
                continue;
            };
            for (param, input) in entries {
                let Some(spec) = category_spec.param(param) else {
                    diag.warn(Warning::UnknownParam {
                        category: category.clone(),
                        param: param.clone(),
                    });
                    continue;
                };
                if spec.derived {
                    diag.warn(Warning::DerivedParam {
                        category: category.clone(),
                        param: param.clone(),
                    });
                    continue;
                }
                let key = (category.clone(), param.clone());
                match input {
                    None => {
                        if spec.default.is_none() {
                            screened.insert(key, Screened::Null);
                        }
                    }
                    Some(AxisInput::One(value)) if value.kind() == spec.kind => {
                        screened.insert(key, Screened::One(value.clone()));
                    }
                    Some(AxisInput::One(value)) => {
                        diag.warn(Warning::TypeMismatch {
                            category: category.clone(),
                            param: param.clone(),
                            expected: spec.kind,
                            got: value.kind(),
                        });
                    }
                    Some(AxisInput::Many(values)) => {
                        let mut kept = Vec::with_capacity(values.len());
                        for value in values {
                            if value.kind() == spec.kind {
                                kept.push(value.clone());
                            } else {
                                diag.warn(Warning::TypeMismatch {
                                    category: category.clone(),
                                    param: param.clone(),
                                    expected: spec.kind,
                                    got: value.kind(),
                                });
                            }
                        }
                        if kept.is_empty() {
                            diag.warn(Warning::EmptyAxis {
                                category: category.clone(),
                                param: param.clone(),
                            });
                        } else {
                            screened.insert(key, Screened::Many(kept));
                        }
                    }
                }
            }
        }

        // partition into fixed values and varied axes, in canonical order
        let mut fixed = Vec::new();
        let mut varied = Vec::new();
        for (category, spec) in schema.iter() {
            let key = (category.name.to_string(), spec.name.to_string());
            match screened.remove(&key) {
                Some(Screened::Many(values)) => varied.push(SurveyAxis {
                    category: key.0,
                    param: key.1,
                    values,
                }),
                Some(Screened::One(value)) => fixed.push((key.0, key.1, Some(value))),
                Some(Screened::Null) => fixed.push((key.0, key.1, None)),
                None => fixed.push((key.0, key.1, spec.default.clone())),
            }
        }

        // the product of no axes is the single all-fixed design
        let combinations: Vec<Vec<ParamValue>> = if varied.is_empty() {
            vec![Vec::new()]
        } else {
            varied
                .iter()
                .map(|axis| axis.values.clone())
                .multi_cartesian_product()
                .collect()
        };
        let mut designs = Vec::with_capacity(combinations.len());
        for combination in &combinations {
            let entries = fixed.iter().cloned().chain(
                varied
                    .iter()
                    .zip(combination)
                    .map(|(axis, value)| {
                        (axis.category.clone(), axis.param.clone(), Some(value.clone()))
                    }),
            );
            designs.push(ApodizerDesign::from_parts(
                variant,
                DesignConfig::from_entries(entries),
                Arc::clone(&fileorg),
                Arc::clone(&solver),
                diag,
            )?);
        }
        log::info!(
            "{} axis(es) expanded into {} design(s)",
            varied.len(),
            designs.len()
        );
        Ok(Self {
            variant,
            fileorg,
            solver,
            fixed,
            varied,
            designs,
        })
    }

    pub fn variant(&self) -> V {
        self.variant
    }
    pub fn designs(&self) -> &[ApodizerDesign<V>] {
        &self.designs
    }
    /// Mutable access for callers updating the status flags
    pub fn designs_mut(&mut self) -> &mut [ApodizerDesign<V>] {
        &mut self.designs
    }
    pub fn len(&self) -> usize {
        self.designs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.designs.is_empty()
    }
    /// The parameters every design shares, with their resolved values
    pub fn fixed(&self) -> &[(String, String, Option<ParamValue>)] {
        &self.fixed
    }
    /// The varied axes, in canonical order
    pub fn varied(&self) -> &[SurveyAxis] {
        &self.varied
    }
    pub fn fileorg(&self) -> &FileOrg {
        &self.fileorg
    }
    pub fn solver(&self) -> &SolverOptions {
        &self.solver
    }

    /// Re-check every design's input masks and solution on disk
    pub fn refresh_status(&mut self) {
        for design in &mut self.designs {
            design.check_input_files();
            design.check_solution();
        }
    }

    /// Emit the optimization program of every design
    ///
    /// One design failing does not stop the others, the outcome of each is
    /// reported next to its name.
    pub fn write_models(
        &self,
        options: &EmitOptions,
    ) -> Vec<(String, crate::design::Result<EmitOutcome>)> {
        self.designs
            .iter()
            .map(|design| (design.name().to_string(), design.write_model(options)))
            .collect()
    }

    /// Snapshot of the per-design status flags
    pub fn state(&self) -> SurveyState {
        SurveyState {
            designs: self
                .designs
                .iter()
                .map(|design| DesignState {
                    name: design.name().to_string(),
                    input_files_present: design.input_files_present,
                    submitted: design.submitted,
                    solution_present: design.solution_present,
                })
                .collect(),
        }
    }

    /// Persist the status snapshot
    pub fn write_state<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        serde_pickle::to_writer(
            &mut File::create(path.as_ref())?,
            &self.state(),
            Default::default(),
        )?;
        Ok(())
    }

    /// Restore status flags from a persisted snapshot, matching by design
    /// name, and report how many designs were matched
    pub fn load_state<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let state: SurveyState =
            serde_pickle::from_reader(File::open(path.as_ref())?, Default::default())?;
        let mut matched = 0;
        for design in &mut self.designs {
            let name = design.name().to_string();
            if let Some(saved) = state.designs.iter().find(|saved| saved.name == name) {
                design.input_files_present = saved.input_files_present;
                design.submitted = saved.submitted;
                design.solution_present = saved.solution_present;
                matched += 1;
            }
        }
        Ok(matched)
    }

    /// Write the survey summary table, one row per design
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        let mut header = vec!["design".to_string()];
        header.extend(
            self.varied
                .iter()
                .map(|axis| format!("{}/{}", axis.category, axis.param)),
        );
        header.extend(
            ["inputs present", "submitted", "solution present"].map(String::from),
        );
        writer.write_record(&header)?;
        for design in &self.designs {
            let mut record = vec![design.name().to_string()];
            record.extend(self.varied.iter().map(|axis| {
                design
                    .config()
                    .value(&axis.category, &axis.param)
                    .map(|value| value.to_string())
                    .unwrap_or_default()
            }));
            record.push(design.input_files_present.to_string());
            record.push(design.submitted.to_string());
            record.push(design.solution_present.to_string());
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Persisted status of one design
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignState {
    pub name: String,
    pub input_files_present: bool,
    pub submitted: bool,
    pub solution_present: bool,
}

/// Persisted status snapshot of a whole survey
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SurveyState {
    pub designs: Vec<DesignState>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FullAplc;
    use std::collections::BTreeSet;
    use std::fs::File;
    use std::path::Path;

    fn fileorg_in(dir: &Path) -> RawFileOrg {
        let mut raw = RawFileOrg::new();
        raw.insert("work dir".into(), dir.to_path_buf());
        raw
    }

    fn axis(category: &str, param: &str, input: AxisInput) -> RawSurveyConfig {
        let mut raw = RawSurveyConfig::new();
        raw.entry(category.to_string())
            .or_default()
            .insert(param.to_string(), Some(input));
        raw
    }

    fn floats(values: &[f64]) -> AxisInput {
        AxisInput::Many(values.iter().copied().map(ParamValue::Float).collect())
    }

    fn expand_in(dir: &Path, params: &RawSurveyConfig) -> (DesignSurvey<FullAplc>, Diagnostics) {
        let mut diag = Diagnostics::new();
        let survey = DesignSurvey::expand(
            FullAplc,
            params,
            &fileorg_in(dir),
            &RawSolverOptions::new(),
            &mut diag,
        )
        .unwrap();
        (survey, diag)
    }

    #[test]
    fn one_axis_of_three_candidates_gives_three_designs() {
        let work = tempfile::tempdir().unwrap();
        let (survey, diag) = expand_in(
            work.path(),
            &axis("FPM", "rad", floats(&[3.5, 4.0, 4.5])),
        );
        assert!(diag.is_empty());
        assert_eq!(survey.len(), 3);
        assert_eq!(survey.varied().len(), 1);
        let fpm_names: Vec<_> = survey
            .designs()
            .iter()
            .map(|design| design.name().fpm.clone())
            .collect();
        assert_eq!(fpm_names, ["Fpm0350M050", "Fpm0400M050", "Fpm0450M050"]);
        // every other sub-name is shared
        for design in survey.designs() {
            assert_eq!(design.name().pupil, survey.designs()[0].name().pupil);
            assert_eq!(design.name().ls, survey.designs()[0].name().ls);
            assert_eq!(design.name().image, survey.designs()[0].name().image);
        }
    }

    #[test]
    fn two_axes_expand_into_their_cartesian_product() {
        let work = tempfile::tempdir().unwrap();
        let mut params = axis("FPM", "rad", floats(&[3.5, 4.0]));
        params.entry("LS".to_string()).or_default().insert(
            "od".to_string(),
            Some(AxisInput::Many(vec![
                ParamValue::Int(80),
                ParamValue::Int(85),
                ParamValue::Int(90),
            ])),
        );
        let (survey, diag) = expand_in(work.path(), &params);
        assert!(diag.is_empty());
        assert_eq!(survey.len(), 6);
        assert_eq!(survey.varied().len(), 2);
        // schema order puts the FPM axis first, so it varies slowest
        let expected = [
            (3.5, 80),
            (3.5, 85),
            (3.5, 90),
            (4.0, 80),
            (4.0, 85),
            (4.0, 90),
        ];
        for (design, (rad, od)) in survey.designs().iter().zip(expected) {
            assert_eq!(design.config().float("FPM", "rad").unwrap(), rad);
            assert_eq!(design.config().int("LS", "od").unwrap(), od);
        }
    }

    #[test]
    fn a_single_candidate_sequence_still_varies() {
        let work = tempfile::tempdir().unwrap();
        let (survey, diag) = expand_in(work.path(), &axis("FPM", "rad", floats(&[4.0])));
        assert!(diag.is_empty());
        assert_eq!(survey.len(), 1);
        assert_eq!(survey.varied().len(), 1);
        assert!(!survey
            .fixed()
            .iter()
            .any(|(category, param, _)| category == "FPM" && param == "rad"));
    }

    #[test]
    fn a_scalar_entry_stays_fixed() {
        let work = tempfile::tempdir().unwrap();
        let (survey, diag) = expand_in(
            work.path(),
            &axis("FPM", "rad", AxisInput::One(ParamValue::Float(3.5))),
        );
        assert!(diag.is_empty());
        assert_eq!(survey.len(), 1);
        assert!(survey.varied().is_empty());
        assert_eq!(
            survey.designs()[0].config().float("FPM", "rad").unwrap(),
            3.5
        );
    }

    #[test]
    fn mistyped_candidates_are_dropped_elementwise() {
        let work = tempfile::tempdir().unwrap();
        let (survey, diag) = expand_in(
            work.path(),
            &axis(
                "FPM",
                "rad",
                AxisInput::Many(vec![
                    ParamValue::Float(3.5),
                    ParamValue::Int(4),
                    ParamValue::Float(4.5),
                ]),
            ),
        );
        assert_eq!(diag.len(), 1);
        assert!(matches!(diag.warnings()[0], Warning::TypeMismatch { .. }));
        assert_eq!(survey.len(), 2);
    }

    #[test]
    fn an_empty_sequence_reverts_to_the_default() {
        let work = tempfile::tempdir().unwrap();
        let (survey, diag) = expand_in(work.path(), &axis("FPM", "rad", floats(&[])));
        assert_eq!(diag.len(), 1);
        assert!(matches!(diag.warnings()[0], Warning::EmptyAxis { .. }));
        assert_eq!(survey.len(), 1);
        assert!(survey.varied().is_empty());
        assert_eq!(
            survey.designs()[0].config().float("FPM", "rad").unwrap(),
            4.0
        );
    }

    #[test]
    fn no_axes_expand_into_the_single_default_design() {
        let work = tempfile::tempdir().unwrap();
        let (survey, diag) = expand_in(work.path(), &RawSurveyConfig::new());
        assert!(diag.is_empty());
        assert_eq!(survey.len(), 1);
        assert_eq!(survey.fixed().len(), FullAplc.schema().len());
    }

    #[test]
    fn names_are_unique_across_the_survey() {
        let work = tempfile::tempdir().unwrap();
        let mut params = axis("FPM", "rad", floats(&[3.5, 4.0]));
        params.entry("Image".to_string()).or_default().insert(
            "c".to_string(),
            Some(floats(&[9.0, 10.0])),
        );
        let (survey, _) = expand_in(work.path(), &params);
        let names: BTreeSet<_> = survey
            .designs()
            .iter()
            .map(|design| design.name().to_string())
            .collect();
        assert_eq!(names.len(), survey.len());
    }

    #[test]
    fn all_designs_share_the_file_organization() {
        let work = tempfile::tempdir().unwrap();
        let (survey, _) = expand_in(
            work.path(),
            &axis("FPM", "rad", floats(&[3.5, 4.0, 4.5])),
        );
        for design in survey.designs() {
            assert_eq!(design.fileorg(), survey.fileorg());
            // distinct designs write distinct models
            assert_eq!(
                design.files().model.parent().unwrap(),
                survey.fileorg().model_dir
            );
        }
    }

    #[test]
    fn state_round_trips_through_the_checkpoint_file() {
        let work = tempfile::tempdir().unwrap();
        let params = axis("FPM", "rad", floats(&[3.5, 4.0, 4.5]));
        let (mut survey, _) = expand_in(work.path(), &params);
        survey.designs_mut()[1].submitted = true;
        survey.designs_mut()[2].solution_present = true;
        let checkpoint = work.path().join("survey.pkl");
        survey.write_state(&checkpoint).unwrap();

        let (mut restored, _) = expand_in(work.path(), &params);
        assert!(!restored.designs()[1].submitted);
        let matched = restored.load_state(&checkpoint).unwrap();
        assert_eq!(matched, 3);
        assert!(restored.designs()[1].submitted);
        assert!(restored.designs()[2].solution_present);
        assert!(!restored.designs()[0].submitted);
    }

    #[test]
    fn a_grown_survey_keeps_the_matching_designs() {
        let work = tempfile::tempdir().unwrap();
        let (mut survey, _) = expand_in(work.path(), &axis("FPM", "rad", floats(&[4.0])));
        survey.designs_mut()[0].submitted = true;
        let checkpoint = work.path().join("survey.pkl");
        survey.write_state(&checkpoint).unwrap();

        let (mut grown, _) = expand_in(
            work.path(),
            &axis("FPM", "rad", floats(&[3.5, 4.0, 4.5])),
        );
        let matched = grown.load_state(&checkpoint).unwrap();
        assert_eq!(matched, 1);
        assert!(grown.designs()[1].submitted);
        assert!(!grown.designs()[0].submitted);
        assert!(!grown.designs()[2].submitted);
    }

    #[test]
    fn refresh_tracks_masks_appearing_on_disk() {
        let work = tempfile::tempdir().unwrap();
        let (mut survey, _) = expand_in(work.path(), &axis("FPM", "rad", floats(&[4.0])));
        assert!(!survey.designs()[0].input_files_present);
        for (_, mask) in survey.designs()[0].files().masks() {
            File::create(mask).unwrap();
        }
        survey.refresh_status();
        assert!(survey.designs()[0].input_files_present);
    }

    #[test]
    fn emission_outcomes_are_reported_per_design() {
        let work = tempfile::tempdir().unwrap();
        let (survey, _) = expand_in(work.path(), &axis("FPM", "rad", floats(&[3.5, 4.0])));
        let outcomes = survey.write_models(&EmitOptions::default());
        assert_eq!(outcomes.len(), 2);
        for (name, outcome) in &outcomes {
            assert!(name.starts_with("AplcFull_"));
            assert_eq!(*outcome.as_ref().unwrap(), EmitOutcome::Aborted);
        }
        let outcomes = survey.write_models(&EmitOptions {
            force: true,
            ..Default::default()
        });
        for (_, outcome) in &outcomes {
            assert!(matches!(outcome.as_ref().unwrap(), EmitOutcome::Written(_)));
        }
    }

    #[test]
    fn the_survey_table_lists_axes_and_status() {
        let work = tempfile::tempdir().unwrap();
        let (survey, _) = expand_in(work.path(), &axis("FPM", "rad", floats(&[3.5, 4.0])));
        let table = work.path().join("survey.csv");
        survey.to_csv(&table).unwrap();
        let contents = std::fs::read_to_string(&table).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "design,FPM/rad,inputs present,submitted,solution present"
        );
        let rows: Vec<_> = lines.collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains("Fpm0350M050"));
        assert!(rows[0].contains("3.5"));
        assert!(rows[1].contains("Fpm0400M050"));
    }
}
