//! Field: per-component unknown storage over a partition's DOF index space.
//!
//! A `Field` holds every named unknown component as one contiguous `Vec<f64>`
//! indexed by local DOF id. The first `n_owned` entries of each component are
//! the DOFs this rank owns and updates; the remaining `n_ghost` entries are
//! halo copies of neighbour DOFs and boundary slots written by boundary
//! conditions.
//!
//! The partial and complete views of the unknowns are the *same* buffer with
//! a [`Consistency`] tag:
//! - [`Consistency::LocalOnly`]: owned DOFs are current, ghost DOFs may be stale.
//! - [`Consistency::Synchronized`]: ghost DOFs reflect the neighbours' values
//!   for the current stage. Only [`synchronize`](crate::partition::exchange)
//!   sets this tag; any mutable access to owned values clears it.

use crate::debug_invariants::DebugInvariants;
use crate::partition::DomainPartition;
use crate::solver_error::SolverError;

/// Whether the ghost part of a [`Field`] may be read.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Consistency {
    /// Only owned DOFs are meaningful (the partial view).
    LocalOnly,
    /// Ghost DOFs have been exchanged for the current stage (the complete view).
    Synchronized,
}

/// Named unknown components over owned + ghost DOFs.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    names: Vec<String>,
    values: Vec<Vec<f64>>,
    n_owned: usize,
    consistency: Consistency,
}

impl Field {
    /// Zero-initialised field with the given component names.
    pub fn new<I, S>(names: I, n_owned: usize, n_ghost: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let values = vec![vec![0.0; n_owned + n_ghost]; names.len()];
        Field {
            names,
            values,
            n_owned,
            consistency: Consistency::LocalOnly,
        }
    }

    /// Zero-initialised field shaped for `partition`.
    pub fn for_partition<I, S>(names: I, partition: &DomainPartition) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names, partition.n_owned(), partition.n_ghost())
    }

    pub fn n_components(&self) -> usize {
        self.values.len()
    }

    /// Total DOF count (owned + ghost).
    pub fn len(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_owned(&self) -> usize {
        self.n_owned
    }

    pub fn n_ghost(&self) -> usize {
        self.len() - self.n_owned
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Index of the component called `name`.
    pub fn component_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn consistency(&self) -> Consistency {
        self.consistency
    }

    pub fn is_synchronized(&self) -> bool {
        self.consistency == Consistency::Synchronized
    }

    /// All DOFs (owned + ghost) of component `c`.
    #[inline]
    pub fn component(&self, c: usize) -> &[f64] {
        &self.values[c]
    }

    /// Owned DOFs of component `c`.
    #[inline]
    pub fn owned(&self, c: usize) -> &[f64] {
        &self.values[c][..self.n_owned]
    }

    /// Mutable access to all DOFs of component `c`.
    ///
    /// Drops the field back to [`Consistency::LocalOnly`].
    #[inline]
    pub fn component_mut(&mut self, c: usize) -> &mut [f64] {
        self.consistency = Consistency::LocalOnly;
        &mut self.values[c]
    }

    /// Mutable access to the owned DOFs of component `c`.
    ///
    /// Drops the field back to [`Consistency::LocalOnly`].
    #[inline]
    pub fn owned_mut(&mut self, c: usize) -> &mut [f64] {
        self.consistency = Consistency::LocalOnly;
        let n = self.n_owned;
        &mut self.values[c][..n]
    }

    #[inline]
    pub fn value(&self, c: usize, dof: usize) -> f64 {
        self.values[c][dof]
    }

    /// Copy the state vector (one value per component) at `dof` into `out`.
    #[inline]
    pub fn read_dof(&self, dof: usize, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.n_components());
        for (o, comp) in out.iter_mut().zip(&self.values) {
            *o = comp[dof];
        }
    }

    /// Overwrite the state vector at `dof` without touching the consistency tag.
    ///
    /// Used for boundary slots, which are never exchanged.
    #[inline]
    pub(crate) fn write_dof(&mut self, dof: usize, vals: &[f64]) {
        debug_assert_eq!(vals.len(), self.n_components());
        for (comp, v) in self.values.iter_mut().zip(vals) {
            comp[dof] = *v;
        }
    }

    /// Raw component arrays; the caller owns the consistency tag.
    pub(crate) fn values_mut_raw(&mut self) -> &mut [Vec<f64>] {
        &mut self.values
    }

    pub(crate) fn mark_synchronized(&mut self) {
        self.consistency = Consistency::Synchronized;
    }

    pub(crate) fn mark_local_only(&mut self) {
        self.consistency = Consistency::LocalOnly;
    }

    /// Copy names, values and tag of `other` into `self` (shapes must agree).
    ///
    /// Reuses the existing allocations.
    pub fn copy_from(&mut self, other: &Field) -> Result<(), SolverError> {
        self.check_same_shape(other)?;
        self.names.clone_from(&other.names);
        for (dst, src) in self.values.iter_mut().zip(&other.values) {
            dst.copy_from_slice(src);
        }
        self.consistency = other.consistency;
        Ok(())
    }

    /// Error unless `partition` describes exactly this field's DOF layout.
    pub fn check_partition(&self, partition: &DomainPartition) -> Result<(), SolverError> {
        if self.n_owned != partition.n_owned() || self.len() != partition.n_dofs() {
            return Err(SolverError::FieldShape {
                expected: format!(
                    "{} owned + {} ghost DOFs",
                    partition.n_owned(),
                    partition.n_ghost()
                ),
                got: format!("{} owned + {} ghost DOFs", self.n_owned, self.n_ghost()),
            });
        }
        Ok(())
    }

    fn check_same_shape(&self, other: &Field) -> Result<(), SolverError> {
        if self.n_components() != other.n_components()
            || self.len() != other.len()
            || self.n_owned != other.n_owned
        {
            return Err(SolverError::FieldShape {
                expected: self.shape_string(),
                got: other.shape_string(),
            });
        }
        Ok(())
    }

    fn shape_string(&self) -> String {
        format!(
            "{} component(s) x ({} owned + {} ghost)",
            self.n_components(),
            self.n_owned,
            self.n_ghost()
        )
    }
}

impl DebugInvariants for Field {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Field");
    }

    fn validate_invariants(&self) -> Result<(), SolverError> {
        if self.names.len() != self.values.len() {
            return Err(SolverError::FieldShape {
                expected: format!("{} component(s)", self.names.len()),
                got: format!("{} value array(s)", self.values.len()),
            });
        }
        let len = self.len();
        for comp in &self.values {
            if comp.len() != len {
                return Err(SolverError::FieldShape {
                    expected: format!("{len} DOFs per component"),
                    got: format!("{} DOFs", comp.len()),
                });
            }
        }
        if self.n_owned > len {
            return Err(SolverError::DofOutOfRange {
                dof: self.n_owned,
                len,
            });
        }
        Ok(())
    }
}

/// Time derivative of the owned DOFs, one array per component.
///
/// One `FieldRate` per Runge-Kutta stage is allocated when the integrator is
/// built and reused every step.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRate {
    values: Vec<Vec<f64>>,
}

impl FieldRate {
    pub fn zeros(n_components: usize, n_owned: usize) -> Self {
        FieldRate {
            values: vec![vec![0.0; n_owned]; n_components],
        }
    }

    /// Rate shaped like the owned part of `field`.
    pub fn like(field: &Field) -> Self {
        Self::zeros(field.n_components(), field.n_owned())
    }

    pub fn n_components(&self) -> usize {
        self.values.len()
    }

    pub fn n_owned(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn component(&self, c: usize) -> &[f64] {
        &self.values[c]
    }

    #[inline]
    pub fn component_mut(&mut self, c: usize) -> &mut [f64] {
        &mut self.values[c]
    }

    pub fn fill(&mut self, v: f64) {
        for comp in &mut self.values {
            comp.fill(v);
        }
    }
}

static_assertions::assert_impl_all!(Field: Send, Sync, Clone);
static_assertions::assert_impl_all!(FieldRate: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Field {
        let mut f = Field::new(["h", "hu", "hv"], 3, 2);
        for c in 0..3 {
            for (i, v) in f.component_mut(c).iter_mut().enumerate() {
                *v = (10 * c + i) as f64;
            }
        }
        f
    }

    #[test]
    fn shape_and_views() {
        let f = sample();
        assert_eq!(f.n_components(), 3);
        assert_eq!(f.len(), 5);
        assert_eq!(f.n_owned(), 3);
        assert_eq!(f.n_ghost(), 2);
        assert_eq!(f.owned(1), &[10.0, 11.0, 12.0]);
        assert_eq!(f.component(2), &[20.0, 21.0, 22.0, 23.0, 24.0]);
        assert_eq!(f.component_index("hv"), Some(2));
        assert_eq!(f.component_index("zeta"), None);
        f.debug_assert_invariants();
    }

    #[test]
    fn mutation_drops_synchronized_tag() {
        let mut f = sample();
        f.mark_synchronized();
        assert!(f.is_synchronized());
        f.owned_mut(0)[0] = 1.0;
        assert_eq!(f.consistency(), Consistency::LocalOnly);
    }

    #[test]
    fn boundary_writes_keep_tag() {
        let mut f = sample();
        f.mark_synchronized();
        f.write_dof(4, &[-1.0, -2.0, -3.0]);
        assert!(f.is_synchronized());
        let mut out = [0.0; 3];
        f.read_dof(4, &mut out);
        assert_eq!(out, [-1.0, -2.0, -3.0]);
    }

    #[test]
    fn copy_from_rejects_other_shapes() {
        let mut a = sample();
        let b = Field::new(["h"], 3, 2);
        assert!(matches!(a.copy_from(&b), Err(SolverError::FieldShape { .. })));
        let c = sample();
        a.owned_mut(0).fill(0.0);
        a.copy_from(&c).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn rate_shape() {
        let f = sample();
        let mut r = FieldRate::like(&f);
        assert_eq!(r.n_components(), 3);
        assert_eq!(r.n_owned(), 3);
        r.fill(2.5);
        assert!(r.component(1).iter().all(|v| *v == 2.5));
    }
}
