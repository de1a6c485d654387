use crate::interface::{OracleError, Properties, Signature};
use itertools::Itertools;
use ndarray::prelude::*;
use ndarray_stats::QuantileExt;

// number of active orbitals the determinant flip factors are defined for
const ACTIVE_ORBITALS: usize = 2;
// number of determinants of the two-orbital active space
const DETERMINANTS: usize = 3;

/// Resolve the sign indeterminacy of freshly computed couplings and CI/MO
/// vectors against the signature of the previous accepted step and return
/// the corrected signature, which becomes the reference for the next step.
///
/// With no reference (first step of a trajectory) the raw output is taken
/// verbatim. The couplings, CI vectors and MO vectors inside `properties`
/// are corrected in place.
pub fn reconcile(
    reference: Option<&Signature>,
    properties: &mut Properties,
) -> Result<Signature, OracleError> {
    let ci_vectors: Array2<f64> = properties
        .ci_vectors
        .clone()
        .ok_or_else(|| OracleError::Malformed("sign tracking requires CI vectors".to_string()))?;
    let mo_vectors: Array2<f64> = properties
        .mo_vectors
        .clone()
        .ok_or_else(|| OracleError::Malformed("sign tracking requires MO vectors".to_string()))?;

    // the determinant flip factors are only defined for a two-orbital
    // active space; larger active spaces have to disable sign tracking
    if mo_vectors.dim().0 != ACTIVE_ORBITALS {
        return Err(OracleError::Malformed(format!(
            "sign tracking supports {} active orbitals, got {}",
            ACTIVE_ORBITALS,
            mo_vectors.dim().0
        )));
    }
    if ci_vectors.dim().1 != DETERMINANTS {
        return Err(OracleError::Malformed(format!(
            "sign tracking supports CI vectors of length {}, got {}",
            DETERMINANTS,
            ci_vectors.dim().1
        )));
    }

    let reference: &Signature = match reference {
        // the first computed signature becomes the reference without
        // any correction
        None => {
            return Ok(Signature {
                ci_vectors,
                mo_vectors,
            })
        }
        Some(reference) => reference,
    };
    if reference.ci_vectors.dim() != ci_vectors.dim()
        || reference.mo_vectors.dim() != mo_vectors.dim()
    {
        return Err(OracleError::Malformed(format!(
            "signature shapes changed between steps: {:?} vs {:?}",
            (ci_vectors.dim(), mo_vectors.dim()),
            (reference.ci_vectors.dim(), reference.mo_vectors.dim()),
        )));
    }

    let (mo_phases, mo_factors): (Array1<f64>, Array1<f64>) =
        mo_sign_correction(reference.mo_vectors.view(), mo_vectors.view());
    let ci_phases: Array1<f64> =
        ci_sign_correction(reference.ci_vectors.view(), ci_vectors.view(), mo_factors.view());

    // the sign of a coupling vector of the pair (i, j) is the product of
    // the phases of both states
    let n_states: usize = ci_vectors.dim().0;
    for (pair, (i, j)) in (0..n_states).tuple_combinations::<(usize, usize)>().enumerate() {
        let factor: f64 = ci_phases[i] * ci_phases[j];
        properties
            .couplings
            .slice_mut(s![pair, .., ..])
            .mapv_inplace(|val| val * factor);
    }

    let mut new_ci: Array2<f64> = Array2::zeros(ci_vectors.raw_dim());
    for (i, mut row) in new_ci.outer_iter_mut().enumerate() {
        row.assign(&(&ci_vectors.row(i) * &mo_factors * ci_phases[i]));
    }
    let mut new_mo: Array2<f64> = Array2::zeros(mo_vectors.raw_dim());
    for (m, mut row) in new_mo.outer_iter_mut().enumerate() {
        row.assign(&(&mo_vectors.row(m) * mo_phases[m]));
    }

    properties.ci_vectors = Some(new_ci.clone());
    properties.mo_vectors = Some(new_mo.clone());
    Ok(Signature {
        ci_vectors: new_ci,
        mo_vectors: new_mo,
    })
}

/// Correct the MO sign by the overlap with the reference orbitals. The
/// orbital order is assumed to be unchanged between two steps. Returns the
/// sign of every orbital and the flip factors of the three determinants
/// of the active space.
pub fn mo_sign_correction(
    reference: ArrayView2<f64>,
    mo_vectors: ArrayView2<f64>,
) -> (Array1<f64>, Array1<f64>) {
    let overlaps: Array1<f64> = (&mo_vectors * &reference).sum_axis(Axis(1));
    let phases: Array1<f64> = overlaps.mapv(f64::signum);
    let factors: Array1<f64> = array![1.0, (overlaps[0] * overlaps[1]).signum(), 1.0];
    (phases, factors)
}

/// Compute the phase of every computed CI vector from the flip-factor
/// corrected overlap with the reference states. Every computed state is
/// greedily assigned the reference state of maximum absolute overlap; a
/// consumed reference state cannot be selected again, ties break to the
/// first state index.
pub fn ci_sign_correction(
    reference: ArrayView2<f64>,
    ci_vectors: ArrayView2<f64>,
    mo_factors: ArrayView1<f64>,
) -> Array1<f64> {
    let n_states: usize = reference.dim().0;
    let mut phases: Array1<f64> = Array1::ones(n_states);

    let mut overlap: Array2<f64> = Array2::zeros((n_states, n_states));
    for i in 0..n_states {
        for j in 0..n_states {
            overlap[[i, j]] = (&ci_vectors.row(i) * &mo_factors * &reference.row(j)).sum();
        }
    }
    let mut abs_overlap: Array2<f64> = overlap.mapv(f64::abs);

    for i in 0..n_states {
        let selected: usize = abs_overlap.row(i).argmax().unwrap();
        phases[i] = overlap[[i, selected]].signum();
        // clear the overlap of the selected state
        abs_overlap.column_mut(selected).fill(0.0);
    }
    phases
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::AbsDiffEq;

    fn signature() -> Signature {
        Signature {
            ci_vectors: array![[0.9, 0.1, 0.2], [0.2, -0.8, 0.3]],
            mo_vectors: array![[0.7, 0.1, -0.2, 0.1], [0.1, -0.6, 0.3, 0.2]],
        }
    }

    fn properties(signature: &Signature) -> Properties {
        Properties {
            energies: array![-1.0, -0.5],
            gradients: ndarray::Array3::zeros((2, 3, 3)),
            couplings: ndarray::Array3::ones((1, 3, 3)),
            ci_vectors: Some(signature.ci_vectors.clone()),
            mo_vectors: Some(signature.mo_vectors.clone()),
            uncertainty: None,
        }
    }

    #[test]
    fn identical_signatures_yield_unit_factors() {
        let reference = signature();
        let mut props = properties(&reference);
        let new_reference = reconcile(Some(&reference), &mut props).unwrap();
        assert_eq!(new_reference, reference);
        assert_eq!(props.couplings, ndarray::Array3::<f64>::ones((1, 3, 3)));
    }

    #[test]
    fn first_step_takes_raw_output_verbatim() {
        let raw = signature();
        let mut props = properties(&raw);
        let reference = reconcile(None, &mut props).unwrap();
        assert_eq!(reference, raw);
    }

    #[test]
    fn flipped_orbital_and_state_signs_are_recovered() {
        let reference = signature();
        let mut props = properties(&reference);
        // flip the sign of the second orbital and of the first state; the
        // orbital flip negates the mixed determinant of every CI vector
        let flipped_mo: Array2<f64> = {
            let mut mo = reference.mo_vectors.clone();
            mo.row_mut(1).mapv_inplace(|val| -val);
            mo
        };
        let determinant_flip: Array1<f64> = array![1.0, -1.0, 1.0];
        let mut flipped_ci: Array2<f64> = Array2::zeros(reference.ci_vectors.raw_dim());
        for (i, mut row) in flipped_ci.outer_iter_mut().enumerate() {
            row.assign(&(&reference.ci_vectors.row(i) * &determinant_flip));
        }
        flipped_ci.row_mut(0).mapv_inplace(|val| -val);
        props.ci_vectors = Some(flipped_ci);
        props.mo_vectors = Some(flipped_mo);

        let new_reference = reconcile(Some(&reference), &mut props).unwrap();
        // the corrected signature coincides with the reference again
        assert!(new_reference
            .ci_vectors
            .abs_diff_eq(&reference.ci_vectors, 1.0e-12));
        assert!(new_reference
            .mo_vectors
            .abs_diff_eq(&reference.mo_vectors, 1.0e-12));
        // one state flipped, the other not: the pair coupling changes sign
        assert_eq!(props.couplings, -ndarray::Array3::<f64>::ones((1, 3, 3)));
    }

    #[test]
    fn greedy_assignment_is_a_bijection() {
        // swapped states with a unique maximum per row
        let reference = signature();
        let swapped: Array2<f64> = array![
            [0.2, -0.8, 0.3],
            [0.9, 0.1, 0.2]
        ];
        let factors: Array1<f64> = array![1.0, 1.0, 1.0];
        let phases =
            ci_sign_correction(reference.ci_vectors.view(), swapped.view(), factors.view());
        // both rows find their counterpart with positive overlap
        assert_eq!(phases, array![1.0, 1.0]);
    }

    #[test]
    fn large_active_space_is_rejected() {
        let reference = signature();
        let mut props = properties(&reference);
        props.mo_vectors = Some(Array2::zeros((3, 4)));
        assert!(matches!(
            reconcile(Some(&reference), &mut props),
            Err(OracleError::Malformed(_))
        ));
    }
}
