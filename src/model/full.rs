//! Optimization program of the quarter-plane symmetric APLC.

use super::{
    banner, execute_section, header_section, loads_section, params_section, solver_section,
    store_section, wavelengths_line, Coronagraph, ModelHeader, ModelScalars, Result,
};
use crate::design::ApodizerDesign;
use crate::params::Schema;
use crate::solver::ConstraintForm;

/// APLC with a pupil symmetric about both axes
///
/// Mask arrays cover one pupil quadrant, the other three enter through the
/// symmetry factors of the cosine transforms, so the propagated field stays
/// real and the program needs a single field variable per plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullAplc;

const PUPIL: &str = "i in 1..N, j in 1..N";
const MASK: &str = "mx in 1..M, my in 1..M";

impl Coronagraph for FullAplc {
    fn mode_tag(&self) -> &'static str {
        "AplcFull"
    }
    fn aperture_tag(&self) -> &'static str {
        "quart"
    }
    fn schema(&self) -> Schema {
        Schema::lyot().extend(Schema::image_category())
    }
    fn pupil_mask_shape(&self, n: i64) -> (i64, i64) {
        (n, n)
    }
    fn fpm_mask_shape(&self, m: i64) -> (i64, i64) {
        (m, m)
    }
    fn model_text(
        &self,
        design: &ApodizerDesign<Self>,
        header: &ModelHeader,
    ) -> Result<String> {
        let scalars = ModelScalars::gather(design.config())?;
        let files = design.files();
        let mut text = String::new();
        text.push_str(&header_section(
            "quarter-plane APLC apodizer",
            design.name(),
            header,
        ));
        text.push_str(&params_section(&scalars));
        text.push_str(&loads_section(files, PUPIL, MASK));
        text.push_str(&grids());
        text.push_str(&sets(scalars.nlam));
        text.push_str(&propagation());
        text.push_str(&constraints(design.solver().constr));
        text.push_str(&solver_section(design.solver()));
        text.push_str(&execute_section());
        text.push_str(&store_section(files, PUPIL));
        Ok(text)
    }
}

fn grids() -> String {
    let mut text = banner("coordinate grids");
    text.push_str(
        r#"param dx := 1/(2*N);
param dy := dx;
param xs {i in 1..N} := (i - 0.5)*dx;
param ys {j in 1..N} := (j - 0.5)*dy;

param dmx := Rmask/M;
param dmy := dmx;
param mxs {mx in 1..M} := (mx - 0.5)*dmx;
param mys {my in 1..M} := (my - 0.5)*dmy;

param dxi := 1/fpres;
param xis {xi in 0..Nimg} := xi*dxi;
param etas {eta in 0..Nimg} := eta*dxi;
"#,
    );
    text
}

fn sets(nlam: i64) -> String {
    let mut text = banner("derived sets");
    text.push_str(
        r#"set Pupil := setof {i in 1..N, j in 1..N: TelAp[i,j] > 0} (i,j);
set Lyot := setof {i in 1..N, j in 1..N: LS[i,j] > 0} (i,j);
set DarkHole := setof {xi in 0..Nimg, eta in 0..Nimg:
    xis[xi]^2 + etas[eta]^2 >= rho0^2 and xis[xi]^2 + etas[eta]^2 <= rho1^2} (xi,eta);
"#,
    );
    text.push_str(wavelengths_line(nlam));
    text.push('\n');
    text
}

fn propagation() -> String {
    let mut text = banner("field propagation");
    text.push_str(
        r#"var A {i in 1..N, j in 1..N} >= 0, <= 1, := 0.5;

var EB1 {mx in 1..M, j in 1..N, lam in Ls} =
    2*sum {i in 1..N} TelAp[i,j]*A[i,j]*cos(2*pi*xs[i]*mxs[mx]/lam)*dx;
var EB {mx in 1..M, my in 1..M, lam in Ls} =
    (2/lam)*sum {j in 1..N} EB1[mx,j,lam]*cos(2*pi*ys[j]*mys[my]/lam)*dy;

var EC1 {i in 1..N, my in 1..M, lam in Ls} =
    2*sum {mx in 1..M} FPM[mx,my]*EB[mx,my,lam]*cos(2*pi*xs[i]*mxs[mx]/lam)*dmx;
var EC {i in 1..N, j in 1..N, lam in Ls} =
    TelAp[i,j]*A[i,j] - (2/lam)*sum {my in 1..M} EC1[i,my,lam]*cos(2*pi*ys[j]*mys[my]/lam)*dmy;

var ED1 {xi in 0..Nimg, j in 1..N, lam in Ls} =
    2*sum {i in 1..N} LS[i,j]*EC[i,j,lam]*cos(2*pi*xs[i]*xis[xi]/lam)*dx;
var ED {xi in 0..Nimg, eta in 0..Nimg, lam in Ls} =
    (2/lam)*sum {j in 1..N} ED1[xi,j,lam]*cos(2*pi*ys[j]*etas[eta]/lam)*dy;

var E00 {lam in Ls} =
    (4/lam)*sum {(i,j) in Pupil} TelAp[i,j]*A[i,j]*dx*dy;
"#,
    );
    text
}

fn constraints(form: ConstraintForm) -> String {
    let mut text = banner("dark-zone constraints");
    match form {
        ConstraintForm::Linear => text.push_str(
            r#"subject to sidelobe_pos {(xi,eta) in DarkHole, lam in Ls}:
    ED[xi,eta,lam] <= 10^(-c/2)*E00[lam]/sqrt(2);
subject to sidelobe_neg {(xi,eta) in DarkHole, lam in Ls}:
    ED[xi,eta,lam] >= -10^(-c/2)*E00[lam]/sqrt(2);
"#,
        ),
        ConstraintForm::Quadratic => text.push_str(
            r#"subject to sidelobe {(xi,eta) in DarkHole, lam in Ls}:
    ED[xi,eta,lam]^2 <= 10^(-c)*E00[lam]^2;
"#,
        ),
    }
    text.push_str("\nmaximize throughput: sum {(i,j) in Pupil} TelAp[i,j]*A[i,j]*dx*dy;\n");
    text
}
