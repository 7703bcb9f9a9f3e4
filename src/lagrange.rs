use blstrs::Scalar;
use ff::Field;
use group::Group;

use crate::bls::{scalar_from_index, G1};
use crate::types::{Error, MemberIndex};

pub fn lagrange_coefficients_at_zero(indices: &[MemberIndex]) -> Result<Vec<Scalar>, Error> {
    if indices.is_empty() {
        return Err(Error::Invalid);
    }
    let mut coeffs = Vec::with_capacity(indices.len());
    for (i, idx_i) in indices.iter().enumerate() {
        let x_i = scalar_from_index(*idx_i)?;
        let mut num = Scalar::ONE;
        let mut den = Scalar::ONE;
        for (j, idx_j) in indices.iter().enumerate() {
            if i == j {
                continue;
            }
            let x_j = scalar_from_index(*idx_j)?;
            num *= -x_j;
            den *= x_i - x_j;
        }
        // A duplicate index produces a zero denominator and is rejected here.
        let den_inv = Option::<Scalar>::from(den.invert()).ok_or(Error::Invalid)?;
        coeffs.push(num * den_inv);
    }
    Ok(coeffs)
}

pub fn combine_g1_at_zero(indices: &[MemberIndex], values: &[G1]) -> Result<G1, Error> {
    if indices.len() != values.len() {
        return Err(Error::Invalid);
    }
    let coeffs = lagrange_coefficients_at_zero(indices)?;
    let mut acc = G1::identity();
    for (coeff, value) in coeffs.iter().zip(values.iter()) {
        acc += *value * coeff;
    }
    Ok(acc)
}
