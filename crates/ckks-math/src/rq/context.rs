use num_bigint::BigUint;
use std::{fmt::Debug, sync::Arc};

use crate::{ntt::NttOperator, rns::RnsContext, zq::Modulus, Error, Result};

/// Context of the polynomials of `Z_Q[x]/(x^n + 1)`, where `Q` is a product of
/// NTT-friendly primes.
///
/// A context with `k >= 2` moduli links to the context of its first `k - 1`
/// moduli, which is where rescaling and modulus switching land.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Context {
    pub(crate) moduli: Box<[u64]>,
    pub(crate) q: Box<[Modulus]>,
    pub(crate) rns: Arc<RnsContext>,
    pub(crate) ops: Box<[NttOperator]>,
    pub(crate) degree: usize,
    /// `q_last^-1 mod q_j` for every other modulus `q_j`, with its Shoup
    /// representation.
    pub(crate) inv_last_qi_mod_qj: Box<[u64]>,
    pub(crate) inv_last_qi_mod_qj_shoup: Box<[u64]>,
    pub(crate) next_context: Option<Arc<Context>>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("moduli", &self.moduli)
            .field("degree", &self.degree)
            .finish()
    }
}

impl Context {
    /// Creates the context of a list of moduli for polynomials of a given
    /// degree.
    ///
    /// Fails unless the degree is a power of two at least 8 and every modulus
    /// is a prime supporting the NTT of that size.
    pub fn new(moduli: &[u64], degree: usize) -> Result<Self> {
        if !degree.is_power_of_two() || degree < 8 {
            return Err(Error::Default(format!(
                "the degree {degree} is not a power of two larger or equal to 8"
            )));
        }
        if moduli.is_empty() {
            return Err(Error::Default("the list of moduli is empty".to_string()));
        }

        let q = moduli
            .iter()
            .map(|m| Modulus::new(*m))
            .collect::<Result<Vec<_>>>()?;
        let ops = q
            .iter()
            .map(|qi| {
                NttOperator::new(qi, degree).ok_or_else(|| {
                    Error::Default(format!(
                        "{} does not support an NTT of size {degree}",
                        qi.modulus()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Build the chain from the single-modulus context upwards.
        let mut next_context: Option<Arc<Context>> = None;
        for k in 1..moduli.len() {
            let ctx = Self::link(moduli, &q, &ops, k, degree, next_context)?;
            next_context = Some(Arc::new(ctx));
        }
        Self::link(moduli, &q, &ops, moduli.len(), degree, next_context)
    }

    fn link(
        moduli: &[u64],
        q: &[Modulus],
        ops: &[NttOperator],
        k: usize,
        degree: usize,
        next_context: Option<Arc<Context>>,
    ) -> Result<Self> {
        let q_last = moduli[k - 1];
        let (inv, inv_shoup): (Vec<u64>, Vec<u64>) = q[..k - 1]
            .iter()
            .map(|qj| {
                let inv = qj.inv(qj.reduce(q_last)).ok_or(Error::InvalidModulus(q_last))?;
                Ok((inv, qj.shoup(inv)))
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip();

        Ok(Self {
            moduli: moduli[..k].into(),
            q: q[..k].into(),
            rns: Arc::new(RnsContext::new(&moduli[..k])?),
            ops: ops[..k].into(),
            degree,
            inv_last_qi_mod_qj: inv.into_boxed_slice(),
            inv_last_qi_mod_qj_shoup: inv_shoup.into_boxed_slice(),
            next_context,
        })
    }

    /// Creates a context in an `Arc`.
    pub fn new_arc(moduli: &[u64], degree: usize) -> Result<Arc<Self>> {
        Self::new(moduli, degree).map(Arc::new)
    }

    /// The product of the moduli.
    pub fn modulus(&self) -> &BigUint {
        self.rns.modulus()
    }

    /// The moduli of the context.
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// The moduli of the context, with their arithmetic.
    pub fn moduli_operators(&self) -> &[Modulus] {
        &self.q
    }

    /// The degree of the polynomials.
    pub const fn degree(&self) -> usize {
        self.degree
    }

    /// The context with the last modulus dropped, if any.
    pub fn next_context(&self) -> Option<&Arc<Context>> {
        self.next_context.as_ref()
    }
}
