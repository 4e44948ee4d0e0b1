//! Factors over binary variables.
//!
//! A factor maps every joint assignment of its scope to a non-negative value.
//! The scope is kept sorted by [`VariableId`]; scope position `k` is bit `k`
//! of the assignment index (the first variable is the least significant bit).

use smallvec::SmallVec;

use crate::engine::cpd::{noisy_or_present, Cpt, CptValues};
use crate::engine::network::VariableId;

/// Largest scope a factor may have before allocation is refused
/// (2^20 entries, 8 MiB).
pub const MAX_FACTOR_SCOPE: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    scope: SmallVec<[VariableId; 8]>,
    values: Vec<f64>,
}

impl Factor {
    pub fn constant(value: f64) -> Self {
        Self {
            scope: SmallVec::new(),
            values: vec![value],
        }
    }

    /// Unary factor `[value if absent, value if present]`.
    pub fn unary(variable: VariableId, absent: f64, present: f64) -> Self {
        Self {
            scope: SmallVec::from_slice(&[variable]),
            values: vec![absent, present],
        }
    }

    pub fn scope(&self) -> &[VariableId] {
        &self.scope
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn mentions(&self, variable: VariableId) -> bool {
        self.scope.binary_search(&variable).is_ok()
    }

    /// Restricts `cpt` to the observed states and returns a factor over the
    /// remaining free variables (the table's own variable and its parents).
    ///
    /// `observed` returns the fixed state of a variable, if any. Fails when the
    /// free scope would exceed [`MAX_FACTOR_SCOPE`] or a column is missing.
    pub fn from_cpt<F>(cpt: &Cpt, observed: F) -> Result<Self, String>
    where
        F: Fn(VariableId) -> Option<bool>,
    {
        let mut scope: SmallVec<[VariableId; 8]> = SmallVec::new();
        if observed(cpt.variable()).is_none() {
            scope.push(cpt.variable());
        }
        for &p in cpt.parents() {
            if observed(p).is_none() && !scope.contains(&p) {
                scope.push(p);
            }
        }
        scope.sort_unstable();
        if scope.len() > MAX_FACTOR_SCOPE {
            return Err(format!(
                "factor over {} free variables exceeds the limit of {}",
                scope.len(),
                MAX_FACTOR_SCOPE
            ));
        }

        let state_of = |var: VariableId, assignment: usize| -> bool {
            match observed(var) {
                Some(state) => state,
                None => {
                    let bit = scope.binary_search(&var).unwrap_or_default();
                    (assignment >> bit) & 1 == 1
                }
            }
        };

        let size = 1usize << scope.len();
        let mut values = Vec::with_capacity(size);
        for assignment in 0..size {
            let mut column = 0usize;
            let mut active = 0u32;
            for (k, &p) in cpt.parents().iter().enumerate() {
                if state_of(p, assignment) {
                    active += 1;
                    column |= 1usize
                        .checked_shl(cpt.parent_bit(k) as u32)
                        .ok_or_else(|| "parent index overflows the column index".to_string())?;
                }
            }
            let col = match cpt.values() {
                CptValues::NoisyOr { leak, activation } => {
                    let p = noisy_or_present(active, *leak, *activation);
                    [1.0 - p, p]
                }
                CptValues::Tabular { .. } => cpt
                    .column(column)
                    .ok_or_else(|| format!("table has no column {}", column))?,
            };
            let state = state_of(cpt.variable(), assignment);
            values.push(col[usize::from(state)]);
        }

        Ok(Self { scope, values })
    }

    /// Pointwise product over the union of both scopes.
    pub fn product(&self, other: &Factor) -> Result<Factor, String> {
        let mut scope: SmallVec<[VariableId; 8]> = self.scope.clone();
        for &v in &other.scope {
            if let Err(pos) = scope.binary_search(&v) {
                scope.insert(pos, v);
            }
        }
        if scope.len() > MAX_FACTOR_SCOPE {
            return Err(format!(
                "product over {} variables exceeds the limit of {}",
                scope.len(),
                MAX_FACTOR_SCOPE
            ));
        }

        let left_bits = projection_bits(&scope, &self.scope);
        let right_bits = projection_bits(&scope, &other.scope);
        let size = 1usize << scope.len();
        let mut values = Vec::with_capacity(size);
        for assignment in 0..size {
            let l = project(assignment, &left_bits);
            let r = project(assignment, &right_bits);
            values.push(self.values[l] * other.values[r]);
        }
        Ok(Factor { scope, values })
    }

    /// Sums `variable` out of the factor. A factor that does not mention the
    /// variable is returned unchanged.
    pub fn sum_out(&self, variable: VariableId) -> Factor {
        let Ok(pos) = self.scope.binary_search(&variable) else {
            return self.clone();
        };
        let mut scope = self.scope.clone();
        scope.remove(pos);

        let low_mask = (1usize << pos) - 1;
        let size = 1usize << scope.len();
        let mut values = Vec::with_capacity(size);
        for assignment in 0..size {
            let low = assignment & low_mask;
            let high = (assignment & !low_mask) << 1;
            let off = high | low;
            let on = off | (1 << pos);
            values.push(self.values[off] + self.values[on]);
        }
        Factor { scope, values }
    }

    /// Divides every entry by the largest one. Returns the divisor, or `None`
    /// when the factor is identically zero or not finite.
    pub fn rescale(&mut self) -> Option<f64> {
        let max = self.values.iter().copied().fold(0.0_f64, f64::max);
        if !(max > 0.0) || !max.is_finite() {
            return None;
        }
        for v in &mut self.values {
            *v /= max;
        }
        Some(max)
    }
}

/// For each bit of the target scope, the bit it maps to in `sub` (if any).
fn projection_bits(scope: &[VariableId], sub: &[VariableId]) -> SmallVec<[Option<usize>; 8]> {
    scope
        .iter()
        .map(|v| sub.binary_search(v).ok())
        .collect()
}

fn project(assignment: usize, bits: &[Option<usize>]) -> usize {
    bits.iter().enumerate().fold(0usize, |acc, (k, target)| match target {
        Some(t) if (assignment >> k) & 1 == 1 => acc | (1 << t),
        _ => acc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: VariableId = VariableId(0);
    const B: VariableId = VariableId(1);
    const C: VariableId = VariableId(2);

    #[test]
    fn product_of_disjoint_unaries_is_outer_product() {
        let fa = Factor::unary(A, 0.2, 0.8);
        let fb = Factor::unary(B, 0.6, 0.4);
        let prod = fa.product(&fb).unwrap();
        assert_eq!(prod.scope(), &[A, B]);
        // index bit0 = A, bit1 = B
        let expected = [0.2 * 0.6, 0.8 * 0.6, 0.2 * 0.4, 0.8 * 0.4];
        for (got, want) in prod.values().iter().zip(expected) {
            assert!((got - want).abs() < 1e-15);
        }
    }

    #[test]
    fn sum_out_marginalizes_middle_variable() {
        let fab = Factor::unary(A, 1.0, 2.0)
            .product(&Factor::unary(B, 3.0, 4.0))
            .unwrap()
            .product(&Factor::unary(C, 5.0, 6.0))
            .unwrap();
        let f = fab.sum_out(B);
        assert_eq!(f.scope(), &[A, C]);
        // (A, C) = (0,0): 1*(3+4)*5
        assert_eq!(f.values(), &[35.0, 70.0, 42.0, 84.0]);
        assert_eq!(f.sum_out(B), f);
    }

    #[test]
    fn from_cpt_reduces_observed_child() {
        // P(C | A) with parent A; observe C = present
        let cpt = Cpt::tabular(C, [A], vec![0.9, 0.2], vec![0.1, 0.8]);
        let f = Factor::from_cpt(&cpt, |v| (v == C).then_some(true)).unwrap();
        assert_eq!(f.scope(), &[A]);
        assert_eq!(f.values(), &[0.1, 0.8]);
    }

    #[test]
    fn from_cpt_respects_parent_bit_order() {
        // parents [A, B]: column index has A as the high bit
        let cpt = Cpt::tabular(
            C,
            [A, B],
            vec![0.9, 0.8, 0.7, 0.6],
            vec![0.1, 0.2, 0.3, 0.4],
        );
        let f = Factor::from_cpt(&cpt, |v| (v == C).then_some(true)).unwrap();
        assert_eq!(f.scope(), &[A, B]);
        // factor index bit0 = A, bit1 = B; (A=1,B=0) -> column 0b10 -> 0.3
        assert_eq!(f.values(), &[0.1, 0.3, 0.2, 0.4]);
    }

    #[test]
    fn rescale_rejects_zero_factor() {
        let mut f = Factor::unary(A, 0.0, 0.0);
        assert!(f.rescale().is_none());
        let mut g = Factor::unary(A, 0.5, 2.0);
        assert_eq!(g.rescale(), Some(2.0));
        assert_eq!(g.values(), &[0.25, 1.0]);
    }
}
