//! Generation of the AMPL optimization program of a design.
//!
//! The program text is assembled from fixed sections in a fixed order: header,
//! design parameters, mask data, coordinate grids, derived sets, field
//! propagation, dark-zone constraints, solver options, execute and result
//! store. Every interpolated value comes from the validated configuration at a
//! fixed precision, so two designs with the same parameters render the same
//! text apart from the header line carrying the creator and the time stamp.

mod full;
mod half;

pub use full::FullAplc;
pub use half::HalfAplc;

use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::design::ApodizerDesign;
use crate::fileorg::DesignFiles;
use crate::naming::DesignName;
use crate::params::{DesignConfig, ParamsError, Schema};
use crate::solver::SolverOptions;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to create the model directory {0:?}")]
    Dir(PathBuf, #[source] std::io::Error),
    #[error("failed to write the model program {0:?}")]
    Write(PathBuf, #[source] std::io::Error),
    #[error("design parameter error")]
    Params(#[from] ParamsError),
}
pub type Result<T> = std::result::Result<T, ModelError>;

/// A coronagraph class: its parameter schema, its identity tags and its
/// optimization program
pub trait Coronagraph: Copy + fmt::Debug {
    /// Tag leading every design identity name
    fn mode_tag(&self) -> &'static str;
    /// Tag embedded in the mask file names
    fn aperture_tag(&self) -> &'static str;
    /// The parameters this class recognizes
    fn schema(&self) -> Schema;
    /// Rows and columns of the pupil and Lyot mask arrays
    fn pupil_mask_shape(&self, n: i64) -> (i64, i64);
    /// Rows and columns of the focal-plane mask array
    fn fpm_mask_shape(&self, m: i64) -> (i64, i64);
    /// Render the complete program text
    fn model_text(
        &self,
        design: &ApodizerDesign<Self>,
        header: &ModelHeader,
    ) -> Result<String>;
}

/// Creator identity and generation time stamped into the program header
#[derive(Debug, Clone)]
pub struct ModelHeader {
    pub user: String,
    pub host: String,
    pub timestamp: String,
}

impl ModelHeader {
    /// Capture the current user, host and local time
    pub fn capture() -> Self {
        Self {
            user: env::var("USER").unwrap_or_else(|_| "unknown".into()),
            host: env::var("HOSTNAME").unwrap_or_else(|_| "localhost".into()),
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Emission switches
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitOptions {
    /// replace an existing program file
    pub overwrite: bool,
    /// emit even when input masks are missing
    pub force: bool,
}

/// Terminal state of one emission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    Written(PathBuf),
    Skipped(PathBuf),
    Aborted,
}

impl fmt::Display for EmitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written(path) => write!(f, "written to {path:?}"),
            Self::Skipped(path) => write!(f, "skipped, {path:?} already exists"),
            Self::Aborted => write!(f, "aborted, input masks missing"),
        }
    }
}

/// Render and write the optimization program of one design
///
/// Emission aborts when the input masks are missing unless forced, and skips
/// an existing program file unless overwriting was requested.
pub fn emit<V: Coronagraph>(
    design: &ApodizerDesign<V>,
    options: &EmitOptions,
) -> Result<EmitOutcome> {
    if !design.input_files_present && !options.force {
        log::warn!(
            "input masks missing for {}, model emission aborted",
            design.name()
        );
        return Ok(EmitOutcome::Aborted);
    }
    let target = design.files().model.clone();
    if target.is_file() && !options.overwrite {
        log::info!("{target:?} already exists, model emission skipped");
        return Ok(EmitOutcome::Skipped(target));
    }
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir).map_err(|e| ModelError::Dir(dir.to_path_buf(), e))?;
    }
    let header = ModelHeader::capture();
    let text = design.variant().model_text(design, &header)?;
    fs::write(&target, text).map_err(|e| ModelError::Write(target.clone(), e))?;
    log::info!("model program written to {target:?}");
    Ok(EmitOutcome::Written(target))
}

/// The configuration values a program interpolates
pub(crate) struct ModelScalars {
    pub n: i64,
    pub m: i64,
    pub n_img: i64,
    pub rad: f64,
    pub ica: f64,
    pub oca: f64,
    pub c: f64,
    pub bw: f64,
    pub nlam: i64,
    pub fpres: i64,
    pub ls_id: f64,
    pub ls_od: f64,
    pub ls_pad: f64,
}

impl ModelScalars {
    pub(crate) fn gather(config: &DesignConfig) -> std::result::Result<Self, ParamsError> {
        Ok(Self {
            n: config.int("Pupil", "N")?,
            m: config.int("FPM", "M")?,
            n_img: config.int("Image", "Nimg")?,
            rad: config.float("FPM", "rad")?,
            ica: config.float("Image", "ica")?,
            oca: config.float("Image", "oca")?,
            c: config.float("Image", "c")?,
            bw: config.float("Image", "bw")?,
            nlam: config.int("Image", "nlam")?,
            fpres: config.int("Image", "fpres")?,
            ls_id: config.int("LS", "id")? as f64 / 100.,
            ls_od: config.int("LS", "od")? as f64 / 100.,
            ls_pad: config.int("LS", "pad")? as f64 / 100.,
        })
    }
}

pub(crate) fn banner(title: &str) -> String {
    format!("\n#---------------------\n# {title}\n")
}

pub(crate) fn header_section(kind: &str, name: &DesignName, header: &ModelHeader) -> String {
    format!(
        "# AMPL program: {kind}\n# design: {name}\n# written by {}@{} on {}\n",
        header.user, header.host, header.timestamp
    )
}

pub(crate) fn params_section(scalars: &ModelScalars) -> String {
    let ModelScalars {
        n,
        m,
        n_img,
        rad,
        ica,
        oca,
        c,
        bw,
        nlam,
        fpres,
        ls_id,
        ls_od,
        ls_pad,
    } = scalars;
    let mut text = banner("design parameters");
    text.push_str(&format!(
        r#"param pi := 4*atan(1);

param N := {n};
param M := {m};
param Nimg := {n_img};

param Rmask := {rad:.2};
param rho0 := {ica:.1};
param rho1 := {oca:.1};
param c := {c:.1};
param bw := {bw:.2};
param Nlam := {nlam};
param fpres := {fpres};

param lsid := {ls_id:.2};
param lsod := {ls_od:.2};
param lspad := {ls_pad:.2};
"#
    ));
    text
}

pub(crate) fn loads_section(
    files: &DesignFiles,
    pupil_domain: &str,
    fpm_domain: &str,
) -> String {
    let telap = files.telap.display();
    let fpm = files.fpm.display();
    let ls = files.ls.display();
    let mut text = banner("mask data");
    text.push_str(&format!(
        r#"param TelAp {{{pupil_domain}}};
param FPM {{{fpm_domain}}};
param LS {{{pupil_domain}}};

read {{{pupil_domain}}} TelAp[i,j] < "{telap}";
close "{telap}";
read {{{fpm_domain}}} FPM[mx,my] < "{fpm}";
close "{fpm}";
read {{{pupil_domain}}} LS[i,j] < "{ls}";
close "{ls}";
"#
    ));
    text
}

pub(crate) fn wavelengths_line(nlam: i64) -> &'static str {
    if nlam > 1 {
        "set Ls ordered := setof {l in 1..Nlam} 1 - bw/2 + bw*(l-1)/(Nlam-1);"
    } else {
        "set Ls ordered := {1.0};"
    }
}

pub(crate) fn solver_section(options: &SolverOptions) -> String {
    let mut text = banner("solver options");
    text.push_str(&format!(
        "option solver {};\n{}\n",
        options.backend,
        options.option_line()
    ));
    text
}

pub(crate) fn execute_section() -> String {
    let mut text = banner("execute");
    text.push_str("solve;\n\ndisplay solve_result_num, solve_result;\ndisplay throughput;\n");
    text
}

pub(crate) fn store_section(files: &DesignFiles, pupil_domain: &str) -> String {
    let sol = files.sol.display();
    let mut text = banner("store results");
    text.push_str(&format!(
        r#"printf {{{pupil_domain}}}: "%17.10e %17.10e %17.10e\n", xs[i], ys[j], A[i,j] > "{sol}";
close "{sol}";
"#
    ));
    text
}
