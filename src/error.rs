use crate::design::DesignError;
use crate::fileorg::FileOrgError;
use crate::mask::MaskError;
use crate::model::ModelError;
use crate::params::ParamsError;
use crate::solver::SolverError;
use crate::survey::SurveyError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `params` module")]
    Params(#[from] ParamsError),
    #[error("Error in the `fileorg` module")]
    FileOrg(#[from] FileOrgError),
    #[error("Error in the `solver` module")]
    Solver(#[from] SolverError),
    #[error("Error in the `design` module")]
    Design(#[from] DesignError),
    #[error("Error in the `survey` module")]
    Survey(#[from] SurveyError),
    #[error("Error in the `model` module")]
    Model(#[from] ModelError),
    #[error("Error in the `mask` module")]
    Mask(#[from] MaskError),
}
