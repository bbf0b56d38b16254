//! One concrete design point of an apodizer survey.

use std::sync::Arc;

use crate::diagnostics::{Diagnostics, Warning};
use crate::fileorg::{DesignFiles, FileOrg, RawFileOrg};
use crate::model::{emit, Coronagraph, EmitOptions, EmitOutcome, ModelError};
use crate::naming::DesignName;
use crate::params::{DesignConfig, ParamValue, ParamsError, RawConfig};
use crate::solver::{RawSolverOptions, SolverOptions};

#[derive(Debug, thiserror::Error)]
pub enum DesignError {
    #[error("design parameter error")]
    Params(#[from] ParamsError),
    #[error("model emission error")]
    Model(#[from] ModelError),
}
pub type Result<T> = std::result::Result<T, DesignError>;

/// A fully resolved design point
///
/// Holds the validated configuration, the derived identity name, the concrete
/// file locations and the three status flags an external queue reads and
/// updates: whether the input masks are on disk, whether the job script was
/// handed over and whether a solution came back.
#[derive(Debug)]
pub struct ApodizerDesign<V: Coronagraph> {
    variant: V,
    config: DesignConfig,
    fileorg: Arc<FileOrg>,
    solver: Arc<SolverOptions>,
    name: DesignName,
    files: DesignFiles,
    pub input_files_present: bool,
    pub submitted: bool,
    pub solution_present: bool,
}

impl<V: Coronagraph> ApodizerDesign<V> {
    /// Validate and resolve a single design from raw mappings
    pub fn new(
        variant: V,
        params: &RawConfig,
        fileorg: &RawFileOrg,
        solver: &RawSolverOptions,
        diag: &mut Diagnostics,
    ) -> Result<Self> {
        let config = variant.schema().validate(params, diag);
        let fileorg = Arc::new(FileOrg::resolve(fileorg, diag));
        let solver = Arc::new(SolverOptions::resolve(solver, diag));
        Self::from_parts(variant, config, fileorg, solver, diag)
    }

    /// Assemble a design from already validated parts, the survey path
    pub(crate) fn from_parts(
        variant: V,
        mut config: DesignConfig,
        fileorg: Arc<FileOrg>,
        solver: Arc<SolverOptions>,
        diag: &mut Diagnostics,
    ) -> Result<Self> {
        derive_image_samples(&mut config, diag)?;
        let name = DesignName::derive(variant.mode_tag(), &config, &solver)?;
        let files = fileorg.for_design(&name, variant.aperture_tag());
        let input_files_present = files.inputs_present();
        let solution_present = files.solution_present();
        Ok(Self {
            variant,
            config,
            fileorg,
            solver,
            name,
            files,
            input_files_present,
            submitted: false,
            solution_present,
        })
    }

    pub fn variant(&self) -> V {
        self.variant
    }
    pub fn config(&self) -> &DesignConfig {
        &self.config
    }
    pub fn name(&self) -> &DesignName {
        &self.name
    }
    pub fn files(&self) -> &DesignFiles {
        &self.files
    }
    pub fn fileorg(&self) -> &FileOrg {
        &self.fileorg
    }
    pub fn solver(&self) -> &SolverOptions {
        &self.solver
    }

    /// Re-check the three input masks on disk
    pub fn check_input_files(&mut self) -> bool {
        self.input_files_present = self.files.inputs_present();
        self.input_files_present
    }
    /// Re-check the solution file on disk
    pub fn check_solution(&mut self) -> bool {
        self.solution_present = self.files.solution_present();
        self.solution_present
    }

    /// Render and write the optimization program of this design
    pub fn write_model(&self, options: &EmitOptions) -> Result<EmitOutcome> {
        Ok(emit(self, options)?)
    }
}

/// Image-plane half-width in samples, derived from the sampling resolution,
/// the outer constraint angle and the bandwidth
///
/// The shortest wavelength of the band sets the widest image extent, hence
/// the `1 - bw/2` stretch. The result is truncated towards zero.
fn derive_image_samples(
    config: &mut DesignConfig,
    diag: &mut Diagnostics,
) -> std::result::Result<(), ParamsError> {
    let fpres = config.int("Image", "fpres")?;
    let oca = config.float("Image", "oca")?;
    let bw = config.float("Image", "bw")?;
    let mut denom = 1. - bw / 2.;
    if denom <= 0. {
        diag.warn(Warning::BadBandwidth { bw });
        denom = 1.;
    }
    let n_img = (fpres as f64 * oca / denom) as i64;
    config.set("Image", "Nimg", ParamValue::Int(n_img));
    Ok(())
}
