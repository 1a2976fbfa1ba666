//! Message passing and its wire format.

pub mod communicator;
pub mod wire;

pub use communicator::{CommTag, Communicator, ExchangeTags, LocalComm, NoComm, Wait};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
