//! Resolution of the named locations a design reads from and writes to.
//!
//! A survey file supplies any subset of the recognized [`Slot`]s, the
//! resolver fills the rest: unset directories inherit the work directory and
//! unset file slots stay open until [`FileOrg::for_design`] derives the
//! canonical per-design location from the design name. Supplied input mask
//! paths go through a fallback chain, first taken as given, then retried
//! against the category directory when they carry no directory component, and
//! finally kept with a warning so a run can be prepared before its masks land
//! on disk.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::diagnostics::{Diagnostics, Warning};
use crate::naming::DesignName;

#[derive(Debug, thiserror::Error)]
pub enum FileOrgError {
    #[error("{0:?} is not a recognized file organization slot")]
    UnknownSlot(String),
}

/// The named location slots of a survey
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Slot {
    WorkDir,
    ModelDir,
    TelApDir,
    FpmDir,
    LsDir,
    LogDir,
    JobDir,
    TelApFile,
    FpmFile,
    LsFile,
    ModelFile,
    SolFile,
    LogFile,
    JobFile,
}

impl Slot {
    /// The key under which the slot appears in a survey file
    pub fn key(&self) -> &'static str {
        match self {
            Self::WorkDir => "work dir",
            Self::ModelDir => "model dir",
            Self::TelApDir => "TelAp dir",
            Self::FpmDir => "FPM dir",
            Self::LsDir => "LS dir",
            Self::LogDir => "log dir",
            Self::JobDir => "job dir",
            Self::TelApFile => "TelAp fname",
            Self::FpmFile => "FPM fname",
            Self::LsFile => "LS fname",
            Self::ModelFile => "model fname",
            Self::SolFile => "sol fname",
            Self::LogFile => "log fname",
            Self::JobFile => "job fname",
        }
    }
    pub fn new(key: &str) -> Result<Self, FileOrgError> {
        Self::iter()
            .find(|slot| slot.key() == key)
            .ok_or_else(|| FileOrgError::UnknownSlot(key.to_string()))
    }
    pub fn is_dir(&self) -> bool {
        self.key().ends_with("dir")
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Caller-supplied location mapping, prior to resolution
pub type RawFileOrg = BTreeMap<String, PathBuf>;

/// Fully resolved survey locations
///
/// Directories are absolute. File slots are `Some` only when the caller
/// pinned them, a pinned file slot overrides the canonical per-design
/// location for every design of the survey.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOrg {
    pub work_dir: PathBuf,
    pub model_dir: PathBuf,
    pub telap_dir: PathBuf,
    pub fpm_dir: PathBuf,
    pub ls_dir: PathBuf,
    pub log_dir: PathBuf,
    pub job_dir: PathBuf,
    pub telap_file: Option<PathBuf>,
    pub fpm_file: Option<PathBuf>,
    pub ls_file: Option<PathBuf>,
    pub model_file: Option<PathBuf>,
    pub sol_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub job_file: Option<PathBuf>,
}

impl FileOrg {
    /// Resolve a caller-supplied mapping
    ///
    /// Unknown keys are dropped with a warning. A missing directory is
    /// warned about, never an error, the queue may create it later.
    pub fn resolve(raw: &RawFileOrg, diag: &mut Diagnostics) -> Self {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        // directory slots normalize at intake, file slots keep the supplied
        // form for the fallback chain below
        let mut supplied: Vec<(Slot, PathBuf)> = Vec::new();
        for (key, path) in raw {
            match Slot::new(key) {
                Ok(slot) if slot.is_dir() => {
                    supplied.push((slot, absolute_dir(path, &cwd, slot, diag)));
                }
                Ok(slot) => supplied.push((slot, path.clone())),
                Err(_) => diag.warn(Warning::UnknownSlot { slot: key.clone() }),
            }
        }
        let work_dir = lookup(&supplied, Slot::WorkDir).unwrap_or_else(|| cwd.clone());
        let dir = |slot: Slot| lookup(&supplied, slot).unwrap_or_else(|| work_dir.clone());
        let model_dir = dir(Slot::ModelDir);
        let telap_dir = dir(Slot::TelApDir);
        let fpm_dir = dir(Slot::FpmDir);
        let ls_dir = dir(Slot::LsDir);
        let log_dir = dir(Slot::LogDir);
        let job_dir = dir(Slot::JobDir);
        let telap_file = lookup(&supplied, Slot::TelApFile)
            .map(|path| locate_input(&path, &telap_dir, &cwd, Slot::TelApFile, diag));
        let fpm_file = lookup(&supplied, Slot::FpmFile)
            .map(|path| locate_input(&path, &fpm_dir, &cwd, Slot::FpmFile, diag));
        let ls_file = lookup(&supplied, Slot::LsFile)
            .map(|path| locate_input(&path, &ls_dir, &cwd, Slot::LsFile, diag));
        let model_file =
            lookup(&supplied, Slot::ModelFile).map(|path| place_output(&path, &model_dir, &cwd));
        let sol_file =
            lookup(&supplied, Slot::SolFile).map(|path| place_output(&path, &model_dir, &cwd));
        let log_file =
            lookup(&supplied, Slot::LogFile).map(|path| place_output(&path, &log_dir, &cwd));
        let job_file =
            lookup(&supplied, Slot::JobFile).map(|path| place_output(&path, &job_dir, &cwd));
        Self {
            work_dir,
            model_dir,
            telap_dir,
            fpm_dir,
            ls_dir,
            log_dir,
            job_dir,
            telap_file,
            fpm_file,
            ls_file,
            model_file,
            sol_file,
            log_file,
            job_file,
        }
    }

    /// The concrete locations of one design
    ///
    /// Open file slots derive from the design name: masks from their category
    /// directory and the mask file-name grammar, the model from the model
    /// directory, the solution by swapping the model extension, log and job
    /// script from their directories.
    pub fn for_design(&self, name: &DesignName, aperture: &str) -> DesignFiles {
        let telap = self
            .telap_file
            .clone()
            .unwrap_or_else(|| self.telap_dir.join(name.telap_file_name(aperture)));
        let fpm = self
            .fpm_file
            .clone()
            .unwrap_or_else(|| self.fpm_dir.join(name.fpm_file_name(aperture)));
        let ls = self
            .ls_file
            .clone()
            .unwrap_or_else(|| self.ls_dir.join(name.ls_file_name(aperture)));
        let model = self
            .model_file
            .clone()
            .unwrap_or_else(|| self.model_dir.join(format!("{name}.mod")));
        let sol = self
            .sol_file
            .clone()
            .unwrap_or_else(|| model.with_extension("sol"));
        let log = self
            .log_file
            .clone()
            .unwrap_or_else(|| self.log_dir.join(format!("{name}.log")));
        let job = self
            .job_file
            .clone()
            .unwrap_or_else(|| self.job_dir.join(format!("{name}.sh")));
        DesignFiles {
            telap,
            fpm,
            ls,
            model,
            sol,
            log,
            job,
        }
    }

    /// The resolved locations as a mapping, suitable to feed back to
    /// [`FileOrg::resolve`]
    pub fn to_raw(&self) -> RawFileOrg {
        let mut raw = RawFileOrg::new();
        raw.insert(Slot::WorkDir.key().to_string(), self.work_dir.clone());
        raw.insert(Slot::ModelDir.key().to_string(), self.model_dir.clone());
        raw.insert(Slot::TelApDir.key().to_string(), self.telap_dir.clone());
        raw.insert(Slot::FpmDir.key().to_string(), self.fpm_dir.clone());
        raw.insert(Slot::LsDir.key().to_string(), self.ls_dir.clone());
        raw.insert(Slot::LogDir.key().to_string(), self.log_dir.clone());
        raw.insert(Slot::JobDir.key().to_string(), self.job_dir.clone());
        for (slot, file) in [
            (Slot::TelApFile, &self.telap_file),
            (Slot::FpmFile, &self.fpm_file),
            (Slot::LsFile, &self.ls_file),
            (Slot::ModelFile, &self.model_file),
            (Slot::SolFile, &self.sol_file),
            (Slot::LogFile, &self.log_file),
            (Slot::JobFile, &self.job_file),
        ] {
            if let Some(path) = file {
                raw.insert(slot.key().to_string(), path.clone());
            }
        }
        raw
    }
}

/// The concrete per-design file locations
#[derive(Debug, Clone, PartialEq)]
pub struct DesignFiles {
    pub telap: PathBuf,
    pub fpm: PathBuf,
    pub ls: PathBuf,
    pub model: PathBuf,
    pub sol: PathBuf,
    pub log: PathBuf,
    pub job: PathBuf,
}

impl DesignFiles {
    /// All three input masks were found on disk
    pub fn inputs_present(&self) -> bool {
        self.telap.is_file() && self.fpm.is_file() && self.ls.is_file()
    }
    /// The solver wrote a solution file
    pub fn solution_present(&self) -> bool {
        self.sol.is_file()
    }
    /// The input masks, with the slot each one fills
    pub fn masks(&self) -> [(Slot, &Path); 3] {
        [
            (Slot::TelApFile, &self.telap),
            (Slot::FpmFile, &self.fpm),
            (Slot::LsFile, &self.ls),
        ]
    }
}

fn lookup(supplied: &[(Slot, PathBuf)], slot: Slot) -> Option<PathBuf> {
    supplied
        .iter()
        .find(|(candidate, _)| *candidate == slot)
        .map(|(_, path)| path.clone())
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), env::var_os("HOME")) {
        (Ok(rest), Some(home)) => Path::new(&home).join(rest),
        _ => path.to_path_buf(),
    }
}

fn make_absolute(path: &Path, cwd: &Path) -> PathBuf {
    let expanded = expand_home(path);
    if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    }
}

fn absolute_dir(path: &Path, cwd: &Path, slot: Slot, diag: &mut Diagnostics) -> PathBuf {
    let dir = make_absolute(path, cwd);
    if !dir.is_dir() {
        diag.warn(Warning::MissingDir {
            slot,
            path: dir.clone(),
        });
    }
    dir
}

/// `true` for a bare file name without any directory component
fn is_bare(path: &Path) -> bool {
    path.parent().map_or(true, |parent| parent.as_os_str().is_empty())
}

/// Fallback chain for a supplied input mask path
fn locate_input(
    path: &Path,
    dir: &Path,
    cwd: &Path,
    slot: Slot,
    diag: &mut Diagnostics,
) -> PathBuf {
    let as_given = make_absolute(path, cwd);
    if as_given.is_file() {
        return as_given;
    }
    let target = if is_bare(path) {
        let joined = dir.join(path);
        if joined.is_file() {
            return joined;
        }
        joined
    } else {
        as_given
    };
    diag.warn(Warning::MissingInput {
        slot,
        path: target.clone(),
        siblings: sibling_masks(dir, slot),
    });
    target
}

/// How many other mask files of the same family sit in the category directory
fn sibling_masks(dir: &Path, slot: Slot) -> usize {
    let family = match slot {
        Slot::TelApFile => "TelAp",
        Slot::FpmFile => "FPM",
        Slot::LsFile => "LS",
        _ => return 0,
    };
    dir.join(format!("{family}_*.dat"))
        .to_str()
        .and_then(|pattern| glob::glob(pattern).ok())
        .map(|paths| paths.filter_map(|path| path.ok()).count())
        .unwrap_or(0)
}

/// A supplied output path: a bare name lands in the slot's directory
fn place_output(path: &Path, dir: &Path, cwd: &Path) -> PathBuf {
    if is_bare(path) {
        dir.join(path)
    } else {
        make_absolute(path, cwd)
    }
}
