//! Contiguous block decomposition of a 1D strip of cells.
//!
//! Cell `i` of the strip spans `[i*dx, (i+1)*dx]`. Rank `r` owns a contiguous
//! block of cells (the first `n_cells % n_ranks` ranks get one extra) and two
//! ghost slots: the left ghost at local index `n_owned`, the right ghost at
//! `n_owned + 1`. A ghost slot is fed either by the adjacent rank or, at the
//! ends of a non-periodic strip, by the boundary patch `"left"` / `"right"`.

use crate::partition::{BoundaryDof, DomainPartition};
use crate::solver_error::SolverError;

/// Name of the boundary patch at `x = 0`.
pub const LEFT: &str = "left";
/// Name of the boundary patch at `x = n_cells * dx`.
pub const RIGHT: &str = "right";

/// One rank's block of a strip.
#[derive(Clone, Debug, PartialEq)]
pub struct StripBlock {
    /// Exchange and boundary topology for this block.
    pub partition: DomainPartition,
    /// Global index of the first owned cell.
    pub first_cell: usize,
    /// Cell width.
    pub dx: f64,
}

impl StripBlock {
    pub fn n_cells(&self) -> usize {
        self.partition.n_owned()
    }

    /// Global cell indices owned by this block.
    pub fn cells(&self) -> std::ops::Range<usize> {
        self.first_cell..self.first_cell + self.n_cells()
    }

    /// Local index of the left ghost slot.
    pub fn left_ghost(&self) -> usize {
        self.n_cells()
    }

    /// Local index of the right ghost slot.
    pub fn right_ghost(&self) -> usize {
        self.n_cells() + 1
    }

    /// Centre of owned cell `local`.
    pub fn cell_center(&self, local: usize) -> f64 {
        (self.first_cell + local) as f64 * self.dx + 0.5 * self.dx
    }
}

/// Split `n_cells` cells among `n_ranks` ranks.
///
/// With `periodic` the two ends of the strip are linked to each other (a
/// self link when `n_ranks == 1`); otherwise they become the `"left"` and
/// `"right"` boundary patches.
pub fn decompose_strip(
    n_cells: usize,
    n_ranks: usize,
    dx: f64,
    periodic: bool,
) -> Result<Vec<StripBlock>, SolverError> {
    if n_ranks == 0 || n_cells < n_ranks {
        return Err(SolverError::FieldShape {
            expected: format!("at least one cell per rank ({n_ranks} rank(s))"),
            got: format!("{n_cells} cell(s)"),
        });
    }

    let base = n_cells / n_ranks;
    let extra = n_cells % n_ranks;
    let mut starts = Vec::with_capacity(n_ranks + 1);
    let mut acc = 0;
    for r in 0..n_ranks {
        starts.push(acc);
        acc += base + usize::from(r < extra);
    }
    starts.push(acc);

    let mut blocks = Vec::with_capacity(n_ranks);
    for r in 0..n_ranks {
        let first = starts[r];
        let n = starts[r + 1] - first;
        let (lg, rg) = (n, n + 1);
        let left_nbr = match (r, periodic) {
            (0, false) => None,
            (0, true) => Some(n_ranks - 1),
            _ => Some(r - 1),
        };
        let right_nbr = match (r + 1 == n_ranks, periodic) {
            (true, false) => None,
            (true, true) => Some(0),
            _ => Some(r + 1),
        };

        let mut builder = DomainPartition::builder(r, n).ghosts(2);
        // For a neighbour X: send [last if X is on the right, first if X is on
        // the left], receive [left ghost if X is on the left, right ghost if X
        // is on the right]. Both sides of a link then list DOFs in the same order.
        for nbr in neighbour_set(left_nbr, right_nbr) {
            let mut send = Vec::with_capacity(2);
            let mut recv = Vec::with_capacity(2);
            if right_nbr == Some(nbr) {
                send.push(n - 1);
            }
            if left_nbr == Some(nbr) {
                send.push(0);
                recv.push(lg);
            }
            if right_nbr == Some(nbr) {
                recv.push(rg);
            }
            builder = builder.link(nbr, &send, &recv);
        }
        if left_nbr.is_none() {
            builder = builder.boundary(
                LEFT,
                &[BoundaryDof {
                    dof: lg,
                    interior: 0,
                    position: [0.0, 0.0, 0.0],
                    normal: [-1.0, 0.0],
                }],
            );
        }
        if right_nbr.is_none() {
            builder = builder.boundary(
                RIGHT,
                &[BoundaryDof {
                    dof: rg,
                    interior: n - 1,
                    position: [n_cells as f64 * dx, 0.0, 0.0],
                    normal: [1.0, 0.0],
                }],
            );
        }
        blocks.push(StripBlock {
            partition: builder.build()?,
            first_cell: first,
            dx,
        });
    }
    Ok(blocks)
}

fn neighbour_set(left: Option<usize>, right: Option<usize>) -> Vec<usize> {
    let mut v: Vec<usize> = left.into_iter().chain(right).collect();
    v.sort_unstable();
    v.dedup();
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_cover_the_strip() {
        let blocks = decompose_strip(10, 3, 0.1, false).unwrap();
        let sizes: Vec<_> = blocks.iter().map(StripBlock::n_cells).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_eq!(blocks[1].cells(), 4..7);
        assert!((blocks[2].cell_center(0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn open_strip_has_boundary_patches_at_the_ends() {
        let blocks = decompose_strip(6, 2, 1.0, false).unwrap();
        let p0 = &blocks[0].partition;
        let p1 = &blocks[1].partition;
        assert_eq!(p0.boundary(LEFT).unwrap().dofs()[0].dof, 3);
        assert!(p0.boundary(RIGHT).is_none());
        assert_eq!(p1.boundary(RIGHT).unwrap().dofs()[0].interior, 2);
        assert_eq!(p0.links()[0].send(), &[2]);
        assert_eq!(p0.links()[0].recv(), &[4]);
        assert_eq!(p1.links()[0].send(), &[0]);
        assert_eq!(p1.links()[0].recv(), &[3]);
    }

    #[test]
    fn periodic_two_ranks_share_both_ends() {
        let blocks = decompose_strip(4, 2, 1.0, true).unwrap();
        for b in &blocks {
            assert!(b.partition.boundaries().is_empty());
            assert_eq!(b.partition.links().len(), 1);
            let link = &b.partition.links()[0];
            assert_eq!(link.send(), &[1, 0]);
            assert_eq!(link.recv(), &[2, 3]);
        }
    }

    #[test]
    fn periodic_single_rank_links_to_itself() {
        let blocks = decompose_strip(3, 1, 1.0, true).unwrap();
        let link = &blocks[0].partition.links()[0];
        assert_eq!(link.rank(), 0);
        assert_eq!(link.send(), &[2, 0]);
        assert_eq!(link.recv(), &[3, 4]);
    }

    #[test]
    fn more_ranks_than_cells_is_an_error() {
        assert!(decompose_strip(2, 3, 1.0, false).is_err());
        assert!(decompose_strip(2, 0, 1.0, false).is_err());
    }
}
