use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use aplc_survey::{
    Coronagraph, DesignSurvey, Diagnostics, EmitOptions, EmitOutcome, FullAplc, HalfAplc,
    MaskGrid, RawFileOrg, RawSolverOptions, RawSurveyConfig, Slot,
};
use indicatif::ProgressBar;
use regex::Regex;
use serde::Deserialize;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "aplc-survey",
    about = "Expand an apodizer design survey and generate its optimization programs"
)]
struct Opt {
    /// Survey specification file (TOML)
    #[structopt(parse(from_os_str))]
    survey: PathBuf,
    /// Use the half-plane symmetric coronagraph class
    #[structopt(long)]
    half: bool,
    /// Overwrite existing model files
    #[structopt(short, long)]
    overwrite: bool,
    /// Emit models even when input masks are missing
    #[structopt(short, long)]
    force: bool,
    /// Only emit designs whose name matches the regular expression
    #[structopt(long)]
    filter: Option<String>,
    /// Verify mask grid dimensions before emission
    #[structopt(long = "check-masks")]
    check_masks: bool,
    /// Survey state checkpoint to restore and update
    #[structopt(long, parse(from_os_str))]
    state: Option<PathBuf>,
    /// Write the survey summary table to a CSV file
    #[structopt(long, parse(from_os_str))]
    table: Option<PathBuf>,
    /// List the expanded designs without writing any model file
    #[structopt(short = "n", long = "dry-run")]
    dry_run: bool,
}

/// Layout of a survey specification file
#[derive(Debug, Default, Deserialize)]
struct SurveyFile {
    #[serde(default)]
    params: RawSurveyConfig,
    #[serde(default)]
    fileorg: RawFileOrg,
    #[serde(default)]
    solver: RawSolverOptions,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    let contents = fs::read_to_string(&opt.survey)
        .with_context(|| format!("cannot read the survey file {:?}", opt.survey))?;
    let survey_file: SurveyFile = toml::from_str(&contents)
        .with_context(|| format!("cannot parse the survey file {:?}", opt.survey))?;
    let filter = opt
        .filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("invalid design name filter")?;
    if opt.half {
        run(HalfAplc, survey_file, &opt, filter)
    } else {
        run(FullAplc, survey_file, &opt, filter)
    }
}

fn run<V: Coronagraph>(
    variant: V,
    file: SurveyFile,
    opt: &Opt,
    filter: Option<Regex>,
) -> anyhow::Result<()> {
    let mut diag = Diagnostics::new();
    let mut survey = DesignSurvey::expand(
        variant,
        &file.params,
        &file.fileorg,
        &file.solver,
        &mut diag,
    )?;
    log::info!(
        "survey expanded into {} design(s) with {} warning(s)",
        survey.len(),
        diag.len()
    );
    for axis in survey.varied() {
        log::info!(
            "axis {}/{}: {} candidate(s)",
            axis.category,
            axis.param,
            axis.values.len()
        );
    }
    if let Some(state) = &opt.state {
        if state.is_file() {
            let matched = survey
                .load_state(state)
                .with_context(|| format!("cannot restore the survey state from {state:?}"))?;
            log::info!("state restored for {matched} of {} design(s)", survey.len());
        }
    }
    survey.refresh_status();
    if opt.check_masks {
        check_masks(&survey);
    }

    let emit_options = EmitOptions {
        overwrite: opt.overwrite,
        force: opt.force,
    };
    let (mut written, mut skipped, mut aborted, mut filtered) = (0, 0, 0, 0);
    let progress = ProgressBar::new(survey.len() as u64);
    for design in survey.designs() {
        let name = design.name().to_string();
        if let Some(filter) = &filter {
            if !filter.is_match(&name) {
                filtered += 1;
                progress.inc(1);
                continue;
            }
        }
        if opt.dry_run {
            progress.suspend(|| println!("{name}"));
            progress.inc(1);
            continue;
        }
        match design.write_model(&emit_options) {
            Ok(EmitOutcome::Written(_)) => written += 1,
            Ok(EmitOutcome::Skipped(_)) => skipped += 1,
            Ok(EmitOutcome::Aborted) => aborted += 1,
            Err(error) => {
                log::error!("{name}: {error}");
                aborted += 1;
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    if opt.dry_run {
        log::info!("dry run, no model file written");
    } else {
        log::info!("{written} written, {skipped} skipped, {aborted} aborted, {filtered} filtered out");
    }

    if let Some(table) = &opt.table {
        survey
            .to_csv(table)
            .with_context(|| format!("cannot write the survey table to {table:?}"))?;
        log::info!("survey table written to {table:?}");
    }
    if let Some(state) = &opt.state {
        survey
            .write_state(state)
            .with_context(|| format!("cannot save the survey state to {state:?}"))?;
        log::info!("survey state saved to {state:?}");
    }
    Ok(())
}

/// Compare every distinct mask on disk against the grid its design expects
fn check_masks<V: Coronagraph>(survey: &DesignSurvey<V>) {
    let mut seen = BTreeSet::new();
    for design in survey.designs() {
        let (Ok(n), Ok(m)) = (
            design.config().int("Pupil", "N"),
            design.config().int("FPM", "M"),
        ) else {
            continue;
        };
        for (slot, path) in design.files().masks() {
            if !seen.insert(path.to_path_buf()) || !path.is_file() {
                continue;
            }
            let grid = match MaskGrid::load(path) {
                Ok(grid) => grid,
                Err(error) => {
                    log::warn!("{error}");
                    continue;
                }
            };
            let (rows, cols) = match slot {
                Slot::FpmFile => design.variant().fpm_mask_shape(m),
                _ => design.variant().pupil_mask_shape(n),
            };
            if (grid.rows() as i64, grid.cols() as i64) != (rows, cols) {
                log::warn!(
                    "{path:?}: {}x{} grid, expected {rows}x{cols} for {}",
                    grid.rows(),
                    grid.cols(),
                    design.name()
                );
            } else {
                let (min, max) = grid.minmax();
                log::info!(
                    "{path:?}: {rows}x{cols} grid, transmission {:.4}, range [{min:.3}, {max:.3}]",
                    grid.transmission()
                );
            }
        }
    }
}
