//! Halo exchange: promote a partial field to a complete one.
//!
//! Every stage, each rank sends the owned values its neighbours ghost and
//! receives its own ghost values, then blocks until every link has been
//! served. The link-size handshake in [`Exchanger::verify_links`] runs once
//! before stepping so that a topology mismatch between ranks becomes a
//! configuration error instead of a corrupted stage.
//!
//! Payloads are component-major: for a link with `k` shared DOFs and `m`
//! components the message is `m * k` little-endian `f64`s.

use crate::algs::communicator::{Communicator, ExchangeTags, Wait};
use crate::algs::wire::{VALUE_BYTES, WireCount, cast_slice, expect_exact_len, pack_f64, unpack_f64};
use crate::data::field::Field;
use crate::partition::DomainPartition;
use crate::solver_error::SolverError;

/// Reusable send buffers and request lists plus the tags of one exchange
/// pattern over communicator `C`.
pub struct Exchanger<C: Communicator> {
    tags: ExchangeTags,
    send_bufs: Vec<Vec<u8>>,
    /// `(link index, expected bytes, handle)`, emptied by every exchange.
    recvs: Vec<(usize, usize, C::RecvHandle)>,
    pending: Vec<C::SendHandle>,
}

impl<C: Communicator> std::fmt::Debug for Exchanger<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchanger")
            .field("tags", &self.tags)
            .field("links", &self.send_bufs.len())
            .finish_non_exhaustive()
    }
}

impl<C: Communicator> Exchanger<C> {
    /// Allocate send buffers for `n_components` components over `partition`'s links.
    pub fn new(partition: &DomainPartition, n_components: usize, tags: ExchangeTags) -> Self {
        let n_links = partition.links().len();
        let send_bufs = partition
            .links()
            .iter()
            .map(|l| Vec::with_capacity(l.send().len() * n_components * VALUE_BYTES))
            .collect();
        Exchanger {
            tags,
            send_bufs,
            recvs: Vec::with_capacity(n_links),
            pending: Vec::with_capacity(n_links),
        }
    }

    pub fn tags(&self) -> ExchangeTags {
        self.tags
    }

    /// Check with every neighbour that both sides agree on the link sizes.
    ///
    /// Collective over the neighbour set: every neighbour must call this too.
    pub fn verify_links(
        &self,
        partition: &DomainPartition,
        comm: &C,
    ) -> Result<(), SolverError> {
        let me = partition.rank();
        let tag = self.tags.sizes.as_u16();

        for link in partition.links() {
            if link.rank() >= comm.size() {
                return Err(SolverError::CommError {
                    neighbor: link.rank(),
                    source: format!("rank {} is outside a world of size {}", link.rank(), comm.size())
                        .into(),
                });
            }
        }

        // 1) post all receives
        let remote: Vec<_> = partition
            .links()
            .iter()
            .filter(|l| l.rank() != me)
            .map(|l| (l, comm.irecv(l.rank(), tag, std::mem::size_of::<WireCount>())))
            .collect();

        // 2) post all sends
        let mut pending = Vec::with_capacity(remote.len());
        for (link, _) in &remote {
            let count = WireCount::new(link.send().len());
            pending.push(comm.isend(link.rank(), tag, cast_slice(std::slice::from_ref(&count))));
        }

        // 3) wait for all recvs; do not early-return before draining
        let mut maybe_err = None;
        for (link, h) in remote {
            let got = h
                .wait()
                .ok_or_else(|| format!("no size header from rank {}", link.rank()))
                .and_then(|bytes| WireCount::from_bytes(&bytes));
            if maybe_err.is_some() {
                continue;
            }
            match got {
                Ok(c) if c.get() == link.recv().len() => {}
                Ok(c) => {
                    maybe_err = Some(SolverError::LinkSizeMismatch {
                        neighbor: link.rank(),
                        expected: link.recv().len(),
                        got: c.get(),
                    })
                }
                Err(msg) => {
                    maybe_err = Some(SolverError::CommError {
                        neighbor: link.rank(),
                        source: msg.into(),
                    })
                }
            }
        }
        for s in pending {
            let _ = s.wait();
        }
        match maybe_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Fill the ghost DOFs of `field` from the neighbours and tag it
    /// [`Synchronized`](crate::data::field::Consistency::Synchronized).
    ///
    /// Blocks until every link has exchanged. Any error is fatal to the run.
    pub fn synchronize(
        &mut self,
        partition: &DomainPartition,
        comm: &C,
        field: &mut Field,
    ) -> Result<(), SolverError> {
        field.check_partition(partition)?;
        let me = partition.rank();
        let tag = self.tags.data.as_u16();
        let n_comp = field.n_components();
        let links = partition.links();

        // 1) post all receives
        self.recvs.clear();
        for (i, link) in links.iter().enumerate().filter(|(_, l)| l.rank() != me) {
            let len = link.recv().len() * n_comp * VALUE_BYTES;
            self.recvs.push((i, len, comm.irecv(link.rank(), tag, len)));
        }

        // 2) pack and send; self links are copied in place
        self.pending.clear();
        for (link, buf) in links.iter().zip(self.send_bufs.iter_mut()) {
            if link.rank() == me {
                for comp in field.values_mut_raw() {
                    for (&src, &dst) in link.send().iter().zip(link.recv()) {
                        comp[dst] = comp[src];
                    }
                }
                continue;
            }
            buf.clear();
            for c in 0..n_comp {
                let comp = field.component(c);
                pack_f64(buf, link.send().iter().map(|&d| comp[d]));
            }
            self.pending.push(comm.isend(link.rank(), tag, buf.as_slice()));
        }
        for s in self.pending.drain(..) {
            let _ = s.wait();
        }

        // 3) wait for every receive, then unpack into the ghost slots
        let mut maybe_err = None;
        for (i, len, h) in self.recvs.drain(..) {
            let link = &links[i];
            let data = h.wait();
            if maybe_err.is_some() {
                continue;
            }
            let checked = data
                .ok_or_else(|| format!("no stage data from rank {}", link.rank()))
                .and_then(|bytes| expect_exact_len(bytes.len(), len).map(|_| bytes));
            match checked {
                Ok(bytes) => {
                    let k = link.recv().len();
                    let mut values = unpack_f64(&bytes);
                    for comp in field.values_mut_raw() {
                        for (&dst, v) in link.recv().iter().zip(values.by_ref().take(k)) {
                            comp[dst] = v;
                        }
                    }
                }
                Err(msg) => {
                    maybe_err = Some(SolverError::CommError {
                        neighbor: link.rank(),
                        source: msg.into(),
                    });
                }
            }
        }
        if let Some(e) = maybe_err {
            field.mark_local_only();
            return Err(e);
        }

        log::trace!("rank {me}: synchronized {} link(s)", partition.links().len());
        field.mark_synchronized();
        Ok(())
    }
}

/// One-off synchronisation with default tags.
///
/// Allocates its own buffers; the integrator keeps an [`Exchanger`]
/// instead.
pub fn synchronize<C: Communicator>(
    field: &mut Field,
    partition: &DomainPartition,
    comm: &C,
) -> Result<(), SolverError> {
    Exchanger::<C>::new(partition, field.n_components(), ExchangeTags::default())
        .synchronize(partition, comm, field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalComm, NoComm};

    #[test]
    fn self_link_copies_locally() {
        // periodic single rank: ghost 2 <- owned 1, ghost 3 <- owned 0
        let p = DomainPartition::builder(0, 2)
            .ghosts(2)
            .link(0, &[1, 0], &[2, 3])
            .build()
            .unwrap();
        let mut f = Field::for_partition(["u", "v"], &p);
        f.owned_mut(0).copy_from_slice(&[1.0, 2.0]);
        f.owned_mut(1).copy_from_slice(&[3.0, 4.0]);
        synchronize(&mut f, &p, &NoComm).unwrap();
        assert!(f.is_synchronized());
        assert_eq!(f.component(0), &[1.0, 2.0, 2.0, 1.0]);
        assert_eq!(f.component(1), &[3.0, 4.0, 4.0, 3.0]);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let p = DomainPartition::builder(0, 2).ghosts(1).build().unwrap();
        let mut f = Field::new(["u"], 2, 0);
        assert!(matches!(
            synchronize(&mut f, &p, &NoComm),
            Err(SolverError::FieldShape { .. })
        ));
    }

    #[test]
    fn two_ranks_exchange_every_component() {
        let world = LocalComm::world(2);
        let parts = [
            DomainPartition::builder(0, 2).ghosts(1).link(1, &[1], &[2]).build().unwrap(),
            DomainPartition::builder(1, 2).ghosts(1).link(0, &[0], &[2]).build().unwrap(),
        ];
        let results: Vec<Field> = std::thread::scope(|s| {
            let handles: Vec<_> = world
                .iter()
                .zip(&parts)
                .map(|(comm, p)| {
                    s.spawn(move || {
                        let mut f = Field::for_partition(["a", "b"], p);
                        let base = 10.0 * p.rank() as f64;
                        f.owned_mut(0).copy_from_slice(&[base, base + 1.0]);
                        f.owned_mut(1).copy_from_slice(&[-base, -base - 1.0]);
                        let mut ex = Exchanger::new(p, 2, ExchangeTags::default());
                        ex.verify_links(p, comm).unwrap();
                        ex.synchronize(p, comm, &mut f).unwrap();
                        f
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0].component(0), &[0.0, 1.0, 10.0]);
        assert_eq!(results[0].component(1), &[-0.0, -1.0, -10.0]);
        assert_eq!(results[1].component(0), &[10.0, 11.0, 1.0]);
        assert_eq!(results[1].component(1), &[-10.0, -11.0, -1.0]);
    }

    #[test]
    fn repeated_exchanges_reuse_request_lists() {
        let world = LocalComm::world(2);
        let parts = [
            DomainPartition::builder(0, 2).ghosts(1).link(1, &[1], &[2]).build().unwrap(),
            DomainPartition::builder(1, 2).ghosts(1).link(0, &[0], &[2]).build().unwrap(),
        ];
        std::thread::scope(|s| {
            for (comm, p) in world.iter().zip(&parts) {
                s.spawn(move || {
                    let mut ex = Exchanger::new(p, 1, ExchangeTags::default());
                    let caps = (ex.recvs.capacity(), ex.pending.capacity());
                    let mut f = Field::for_partition(["a"], p);
                    for round in 0..5 {
                        let v = (10 * p.rank() + round) as f64;
                        f.owned_mut(0).fill(v);
                        ex.synchronize(p, comm, &mut f).unwrap();
                        let peer = (10 * (1 - p.rank()) + round) as f64;
                        assert_eq!(f.value(0, 2), peer);
                        assert!(ex.recvs.is_empty() && ex.pending.is_empty());
                        assert_eq!((ex.recvs.capacity(), ex.pending.capacity()), caps);
                    }
                });
            }
        });
    }

    #[test]
    fn size_handshake_detects_mismatch() {
        let world = LocalComm::world(2);
        let parts = [
            DomainPartition::builder(0, 2).ghosts(1).link(1, &[0, 1], &[2]).build().unwrap(),
            DomainPartition::builder(1, 2).ghosts(1).link(0, &[0], &[2]).build().unwrap(),
        ];
        let errs: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = world
                .iter()
                .zip(&parts)
                .map(|(comm, p)| {
                    s.spawn(move || Exchanger::new(p, 1, ExchangeTags::default()).verify_links(p, comm))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(errs[0].is_ok());
        assert!(matches!(
            errs[1],
            Err(SolverError::LinkSizeMismatch { neighbor: 0, expected: 1, got: 2 })
        ));
    }

    #[test]
    fn neighbour_outside_world_is_comm_error() {
        let p = DomainPartition::builder(0, 1).ghosts(1).link(4, &[0], &[1]).build().unwrap();
        let ex = Exchanger::new(&p, 1, ExchangeTags::default());
        let err = ex.verify_links(&p, &NoComm).unwrap_err();
        assert!(err.is_fatal_comm());
    }

    #[test]
    fn aborted_world_fails_synchronization() {
        let world = LocalComm::world(2);
        let p = DomainPartition::builder(0, 1).ghosts(1).link(1, &[0], &[1]).build().unwrap();
        world[1].abort();
        let mut f = Field::for_partition(["u"], &p);
        let err = synchronize(&mut f, &p, &world[0]).unwrap_err();
        assert!(matches!(err, SolverError::CommError { neighbor: 1, .. }));
        assert!(!f.is_synchronized());
    }
}
