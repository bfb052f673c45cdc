//! Conversions into polynomials.

use super::{Context, Poly, Representation};
use crate::{Error, Result};
use ndarray::Array2;
use num_bigint::BigInt;
use std::sync::Arc;

/// Conversions from other types into polynomials of a given context.
pub trait TryConvertFrom<T>
where
    Self: Sized,
{
    /// Attempt to convert `value` into a polynomial of context `ctx`. The
    /// values are read as power-basis coefficients, and the polynomial is
    /// returned in the requested `representation`.
    fn try_convert_from(
        value: T,
        ctx: &Arc<Context>,
        representation: Representation,
    ) -> Result<Self>;
}

fn check_length(len: usize, ctx: &Context) -> Result<()> {
    if len > ctx.degree {
        Err(Error::Default(format!(
            "Too many coefficients: got {len}, the degree is {}",
            ctx.degree
        )))
    } else {
        Ok(())
    }
}

impl TryConvertFrom<&[i64]> for Poly {
    fn try_convert_from(
        value: &[i64],
        ctx: &Arc<Context>,
        representation: Representation,
    ) -> Result<Self> {
        check_length(value.len(), ctx)?;

        let mut coefficients = Array2::zeros((ctx.q.len(), ctx.degree));
        for (mut row, qi) in coefficients.outer_iter_mut().zip(ctx.q.iter()) {
            row.iter_mut()
                .zip(value)
                .for_each(|(c, v)| *c = qi.reduce_i64(*v));
        }

        let mut p = Poly {
            ctx: ctx.clone(),
            representation: Representation::PowerBasis,
            coefficients,
        };
        p.change_representation(representation);
        Ok(p)
    }
}

impl TryConvertFrom<&[BigInt]> for Poly {
    fn try_convert_from(
        value: &[BigInt],
        ctx: &Arc<Context>,
        representation: Representation,
    ) -> Result<Self> {
        check_length(value.len(), ctx)?;

        let mut coefficients = Array2::zeros((ctx.q.len(), ctx.degree));
        for (j, v) in value.iter().enumerate() {
            let rests = ctx.rns.project_signed(v);
            coefficients
                .column_mut(j)
                .iter_mut()
                .zip(rests)
                .for_each(|(c, r)| *c = r);
        }

        let mut p = Poly {
            ctx: ctx.clone(),
            representation: Representation::PowerBasis,
            coefficients,
        };
        p.change_representation(representation);
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::TryConvertFrom;
    use crate::rq::{Context, Poly, Representation};
    use num_bigint::BigInt;
    use std::error::Error;

    const MODULI: &[u64; 3] = &[1153, 4611686018326724609, 4611686018309947393];

    #[test]
    fn from_i64() -> Result<(), Box<dyn Error>> {
        let ctx = Context::new_arc(MODULI, 8)?;
        let p = Poly::try_convert_from(&[1i64, -1, 2][..], &ctx, Representation::PowerBasis)?;
        for (row, qi) in p.coefficients().outer_iter().zip(MODULI) {
            assert_eq!(row.to_vec(), vec![1, qi - 1, 2, 0, 0, 0, 0, 0]);
        }

        assert!(Poly::try_convert_from(&[0i64; 9][..], &ctx, Representation::Ntt).is_err());
        Ok(())
    }

    #[test]
    fn from_bigint_matches_i64() -> Result<(), Box<dyn Error>> {
        let ctx = Context::new_arc(MODULI, 8)?;
        let small = [5i64, -7, 1 << 50, -(1 << 61)];
        let big = small.iter().map(|v| BigInt::from(*v)).collect::<Vec<_>>();
        let p = Poly::try_convert_from(&small[..], &ctx, Representation::Ntt)?;
        let q = Poly::try_convert_from(&big[..], &ctx, Representation::Ntt)?;
        assert_eq!(p, q);
        Ok(())
    }
}
