//! Deterministic short names encoding a design's identity.
//!
//! Every identity-relevant parameter is folded into one fixed-width token per
//! category, so two distinct designs can never share a name and a name sorts
//! next to its neighbours in parameter space. Float parameters are scaled to
//! integers before formatting (one decimal for angular extents, two for the
//! mask radius and the bandwidth), which keeps the tokens free of `.`.

use std::fmt;

use crate::params::{DesignConfig, Result};
use crate::solver::SolverOptions;

/// The identity sub-names of one design
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignName {
    pub mode: &'static str,
    pub pupil: String,
    pub fpm: String,
    pub ls: String,
    pub image: String,
    pub solver: String,
}

impl DesignName {
    /// Derive every sub-name from a validated configuration
    pub fn derive(
        mode: &'static str,
        config: &DesignConfig,
        solver: &SolverOptions,
    ) -> Result<Self> {
        Ok(Self {
            mode,
            pupil: pupil_token(config)?,
            fpm: fpm_token(config)?,
            ls: ls_token(config)?,
            image: image_token(config)?,
            solver: solver.token(),
        })
    }

    /// File name of the telescope aperture mask this design reads
    pub fn telap_file_name(&self, aperture: &str) -> String {
        format!("TelAp_{}_{}.dat", aperture, self.pupil)
    }
    /// File name of the focal-plane mask this design reads
    pub fn fpm_file_name(&self, aperture: &str) -> String {
        format!("FPM_{}_{}.dat", aperture, self.fpm)
    }
    /// File name of the Lyot stop mask this design reads
    pub fn ls_file_name(&self, aperture: &str) -> String {
        format!("LS_{}_{}.dat", aperture, self.ls)
    }
}

impl fmt::Display for DesignName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}_{}",
            self.mode, self.pupil, self.fpm, self.ls, self.image, self.solver
        )
    }
}

fn scale10(x: f64) -> i64 {
    (10. * x).round() as i64
}
fn scale100(x: f64) -> i64 {
    (100. * x).round() as i64
}

fn pupil_token(config: &DesignConfig) -> Result<String> {
    let n = config.int("Pupil", "N")?;
    let ap = config.text("Pupil", "ap")?;
    let obsc = if config.flag("Pupil", "obsc")? { "X" } else { "O" };
    let edge = match config.text("Pupil", "edge")? {
        "gray" => "G",
        "bin" => "B",
        _ => "U",
    };
    Ok(format!("Pup{ap}{obsc}{edge}{n:04}"))
}

fn fpm_token(config: &DesignConfig) -> Result<String> {
    let rad = config.float("FPM", "rad")?;
    let m = config.int("FPM", "M")?;
    Ok(format!("Fpm{:04}M{m:03}", scale100(rad)))
}

fn ls_token(config: &DesignConfig) -> Result<String> {
    let id = config.int("LS", "id")?;
    let od = config.int("LS", "od")?;
    let pad = config.int("LS", "pad")?;
    Ok(format!("Ls{id:02}D{od:02}P{pad:02}"))
}

fn image_token(config: &DesignConfig) -> Result<String> {
    let c = config.float("Image", "c")?;
    let ica = config.float("Image", "ica")?;
    let oca = config.float("Image", "oca")?;
    let bw = config.float("Image", "bw")?;
    let nlam = config.int("Image", "nlam")?;
    let fpres = config.int("Image", "fpres")?;
    Ok(format!(
        "ImgC{:03}I{:03}O{:03}B{:02}L{nlam:02}R{fpres}",
        scale10(c),
        scale10(ica),
        scale10(oca),
        scale100(bw)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::params::{RawConfig, Schema};

    fn config(entries: &[(&str, &str, crate::params::ParamValue)]) -> DesignConfig {
        let mut raw = RawConfig::new();
        for (category, param, value) in entries {
            raw.entry(category.to_string())
                .or_default()
                .insert(param.to_string(), Some(value.clone()));
        }
        let mut diag = Diagnostics::new();
        let config = Schema::lyot()
            .extend(Schema::image_category())
            .validate(&raw, &mut diag);
        assert!(diag.is_empty());
        config
    }

    #[test]
    fn default_design_name() {
        let name = DesignName::derive(
            "AplcFull",
            &config(&[]),
            &SolverOptions::default(),
        )
        .unwrap();
        assert_eq!(name.pupil, "Puphex1XG1000");
        assert_eq!(name.fpm, "Fpm0400M050");
        assert_eq!(name.ls, "Ls25D85P00");
        assert_eq!(name.image, "ImgC100I035O100B10L03R2");
        assert_eq!(name.solver, "linbarpre");
        assert_eq!(
            name.to_string(),
            "AplcFull_Puphex1XG1000_Fpm0400M050_Ls25D85P00_ImgC100I035O100B10L03R2_linbarpre"
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let solver = SolverOptions::default();
        let first = DesignName::derive("AplcFull", &config(&[]), &solver).unwrap();
        let second = DesignName::derive("AplcFull", &config(&[]), &solver).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_parameters_give_distinct_names() {
        let solver = SolverOptions::default();
        let base = DesignName::derive("AplcFull", &config(&[]), &solver).unwrap();
        let other = DesignName::derive(
            "AplcFull",
            &config(&[("FPM", "rad", 3.5.into())]),
            &solver,
        )
        .unwrap();
        assert_ne!(base.to_string(), other.to_string());
        assert_eq!(other.fpm, "Fpm0350M050");
        // fixed-width tokens sort with the parameter
        assert!(other.fpm < base.fpm);
    }

    #[test]
    fn pupil_flags_encode_obscuration_and_edge() {
        let solver = SolverOptions::default();
        let name = DesignName::derive(
            "AplcFull",
            &config(&[
                ("Pupil", "obsc", false.into()),
                ("Pupil", "edge", "bin".into()),
            ]),
            &solver,
        )
        .unwrap();
        assert_eq!(name.pupil, "Puphex1OB1000");
        let name = DesignName::derive(
            "AplcFull",
            &config(&[("Pupil", "edge", "fuzzy".into())]),
            &solver,
        )
        .unwrap();
        assert_eq!(name.pupil, "Puphex1XU1000");
    }

    #[test]
    fn mask_file_names_carry_the_aperture_tag() {
        let name = DesignName::derive(
            "AplcHalf",
            &config(&[]),
            &SolverOptions::default(),
        )
        .unwrap();
        assert_eq!(
            name.telap_file_name("half"),
            "TelAp_half_Puphex1XG1000.dat"
        );
        assert_eq!(name.fpm_file_name("half"), "FPM_half_Fpm0400M050.dat");
        assert_eq!(name.ls_file_name("half"), "LS_half_Ls25D85P00.dat");
    }
}
