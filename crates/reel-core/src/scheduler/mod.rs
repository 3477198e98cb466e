//! Status polling.
//!
//! [`PollingScheduler`] decides when a status check is due, tags each run with
//! a [`PollEpoch`], and applies the retry policy to transport failures. It is
//! driven by the job controller and performs no I/O of its own.

mod epoch;
mod poll;

pub use epoch::PollEpoch;
pub use poll::{PollHandle, PollOutcome, PollSettings, PollTicket, PollingScheduler, Tick};
