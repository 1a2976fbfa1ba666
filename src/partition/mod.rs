//! DomainPartition: per-rank DOF ownership, neighbour links and boundary patches.
//!
//! A partition describes one rank's slice of the discretisation:
//! - DOFs `0..n_owned` are owned and advanced by this rank;
//! - DOFs `n_owned..n_owned + n_ghost` are ghost slots, filled either by a
//!   [`NeighborLink`] during synchronisation or by a boundary condition;
//! - every [`NeighborLink`] lists, in matching order on both sides, the owned
//!   DOFs sent to a neighbour and the ghost DOFs received from it;
//! - every [`BoundaryPatch`] names a physical boundary and the slots the
//!   boundary condition of that name writes.
//!
//! Partitions are built once at startup and never mutated afterwards.

pub mod exchange;
pub mod strip;

use std::collections::{BTreeMap, HashSet};

use crate::debug_invariants::DebugInvariants;
use crate::solver_error::SolverError;

pub use exchange::{Exchanger, synchronize};
pub use strip::{StripBlock, decompose_strip};

/// Shared DOFs with one neighbour rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NeighborLink {
    rank: usize,
    send: Vec<usize>,
    recv: Vec<usize>,
}

impl NeighborLink {
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Owned DOFs whose values the neighbour needs.
    pub fn send(&self) -> &[usize] {
        &self.send
    }

    /// Ghost DOFs filled from the neighbour, in the neighbour's send order.
    pub fn recv(&self) -> &[usize] {
        &self.recv
    }
}

/// One slot written by a boundary condition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundaryDof {
    /// Slot overwritten with the boundary value.
    pub dof: usize,
    /// DOF on the boundary edge whose state the condition reads.
    pub interior: usize,
    /// Physical coordinates of the boundary point.
    pub position: [f64; 3],
    /// Unit outward normal of the boundary edge.
    pub normal: [f64; 2],
}

/// Named physical boundary on this rank.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryPatch {
    name: String,
    dofs: Vec<BoundaryDof>,
}

impl BoundaryPatch {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dofs(&self) -> &[BoundaryDof] {
        &self.dofs
    }
}

/// Ownership and exchange topology of one rank.
#[derive(Clone, Debug, PartialEq)]
pub struct DomainPartition {
    rank: usize,
    n_owned: usize,
    n_ghost: usize,
    links: Vec<NeighborLink>,
    boundaries: Vec<BoundaryPatch>,
}

impl DomainPartition {
    /// Start describing rank `rank` with `n_owned` owned DOFs.
    pub fn builder(rank: usize, n_owned: usize) -> DomainPartitionBuilder {
        DomainPartitionBuilder {
            rank,
            n_owned,
            n_ghost: 0,
            links: BTreeMap::new(),
            boundaries: Vec::new(),
        }
    }

    /// A partition with no neighbours and no boundaries.
    pub fn serial(n_owned: usize) -> Self {
        DomainPartition {
            rank: 0,
            n_owned,
            n_ghost: 0,
            links: Vec::new(),
            boundaries: Vec::new(),
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn n_owned(&self) -> usize {
        self.n_owned
    }

    pub fn n_ghost(&self) -> usize {
        self.n_ghost
    }

    /// Owned + ghost DOFs.
    pub fn n_dofs(&self) -> usize {
        self.n_owned + self.n_ghost
    }

    /// Links sorted by neighbour rank.
    pub fn links(&self) -> &[NeighborLink] {
        &self.links
    }

    pub fn neighbor_ranks(&self) -> impl Iterator<Item = usize> + '_ {
        self.links.iter().map(NeighborLink::rank)
    }

    pub fn boundaries(&self) -> &[BoundaryPatch] {
        &self.boundaries
    }

    pub fn boundary(&self, name: &str) -> Option<&BoundaryPatch> {
        self.boundaries.iter().find(|b| b.name == name)
    }

    fn check_dof(&self, dof: usize, range: std::ops::Range<usize>) -> Result<(), SolverError> {
        if range.contains(&dof) {
            Ok(())
        } else {
            Err(SolverError::DofOutOfRange {
                dof,
                len: range.end,
            })
        }
    }
}

impl DebugInvariants for DomainPartition {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "DomainPartition");
    }

    fn validate_invariants(&self) -> Result<(), SolverError> {
        let n_dofs = self.n_dofs();
        let mut received = HashSet::new();
        let mut sent = HashSet::new();
        for link in &self.links {
            if link.rank == self.rank && link.send.len() != link.recv.len() {
                return Err(SolverError::SelfLinkMismatch {
                    rank: self.rank,
                    send: link.send.len(),
                    recv: link.recv.len(),
                });
            }
            for &d in &link.send {
                self.check_dof(d, 0..self.n_owned)?;
                sent.insert(d);
            }
            for &d in &link.recv {
                if d < self.n_owned {
                    // ghosts live after the owned block
                    return Err(SolverError::DofOutOfRange { dof: d, len: n_dofs });
                }
                self.check_dof(d, 0..n_dofs)?;
                if !received.insert(d) {
                    return Err(SolverError::DuplicateGhost(d));
                }
            }
        }
        for patch in &self.boundaries {
            for bd in &patch.dofs {
                self.check_dof(bd.dof, 0..n_dofs)?;
                self.check_dof(bd.interior, 0..n_dofs)?;
                if sent.contains(&bd.dof) || received.contains(&bd.dof) {
                    return Err(SolverError::BoundaryDofShared(bd.dof));
                }
            }
        }
        Ok(())
    }
}

/// Incremental, validating constructor for [`DomainPartition`].
#[derive(Clone, Debug)]
pub struct DomainPartitionBuilder {
    rank: usize,
    n_owned: usize,
    n_ghost: usize,
    links: BTreeMap<usize, NeighborLink>,
    boundaries: Vec<BoundaryPatch>,
}

impl DomainPartitionBuilder {
    /// Reserve `n` ghost slots after the owned DOFs.
    pub fn ghosts(mut self, n: usize) -> Self {
        self.n_ghost = n;
        self
    }

    /// Share DOFs with `rank`; repeated calls for one rank append in order.
    pub fn link(mut self, rank: usize, send: &[usize], recv: &[usize]) -> Self {
        let entry = self.links.entry(rank).or_insert_with(|| NeighborLink {
            rank,
            send: Vec::new(),
            recv: Vec::new(),
        });
        entry.send.extend_from_slice(send);
        entry.recv.extend_from_slice(recv);
        self
    }

    /// Add slots to the boundary patch called `name`.
    pub fn boundary(mut self, name: impl Into<String>, dofs: &[BoundaryDof]) -> Self {
        let name = name.into();
        match self.boundaries.iter_mut().find(|b| b.name == name) {
            Some(patch) => patch.dofs.extend_from_slice(dofs),
            None => self.boundaries.push(BoundaryPatch {
                name,
                dofs: dofs.to_vec(),
            }),
        }
        self
    }

    /// Validate indices and freeze the partition.
    pub fn build(self) -> Result<DomainPartition, SolverError> {
        let partition = DomainPartition {
            rank: self.rank,
            n_owned: self.n_owned,
            n_ghost: self.n_ghost,
            links: self.links.into_values().collect(),
            boundaries: self.boundaries,
        };
        partition.validate_invariants()?;
        Ok(partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bdof(dof: usize, interior: usize) -> BoundaryDof {
        BoundaryDof {
            dof,
            interior,
            position: [0.0; 3],
            normal: [-1.0, 0.0],
        }
    }

    #[test]
    fn builder_sorts_links_and_merges_patches() {
        let p = DomainPartition::builder(1, 4)
            .ghosts(3)
            .link(2, &[3], &[5])
            .link(0, &[0], &[4])
            .boundary("wall", &[bdof(6, 0)])
            .build()
            .unwrap();
        assert_eq!(p.neighbor_ranks().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(p.n_dofs(), 7);
        assert_eq!(p.boundary("wall").unwrap().dofs().len(), 1);
        assert!(p.boundary("inlet").is_none());
    }

    #[test]
    fn send_must_be_owned() {
        let err = DomainPartition::builder(0, 2)
            .ghosts(1)
            .link(1, &[2], &[2])
            .build()
            .unwrap_err();
        assert!(matches!(err, SolverError::DofOutOfRange { dof: 2, .. }));
    }

    #[test]
    fn recv_must_be_ghost_and_unique() {
        let err = DomainPartition::builder(0, 2)
            .ghosts(2)
            .link(1, &[0], &[1])
            .build()
            .unwrap_err();
        assert!(matches!(err, SolverError::DofOutOfRange { dof: 1, .. }));

        let err = DomainPartition::builder(0, 2)
            .ghosts(2)
            .link(1, &[0], &[2])
            .link(2, &[1], &[2])
            .build()
            .unwrap_err();
        assert!(matches!(err, SolverError::DuplicateGhost(2)));
    }

    #[test]
    fn boundary_slot_cannot_be_exchanged() {
        let err = DomainPartition::builder(0, 2)
            .ghosts(1)
            .link(1, &[0], &[2])
            .boundary("left", &[bdof(2, 0)])
            .build()
            .unwrap_err();
        assert!(matches!(err, SolverError::BoundaryDofShared(2)));
    }

    #[test]
    fn self_link_lengths_must_match() {
        let err = DomainPartition::builder(0, 2)
            .ghosts(2)
            .link(0, &[0, 1], &[2])
            .build()
            .unwrap_err();
        assert!(matches!(err, SolverError::SelfLinkMismatch { .. }));
    }
}
