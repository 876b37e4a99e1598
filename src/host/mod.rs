//! Host building blocks for running a session without a real player or
//! microphone: typed speech and timed, simulated video surfaces

pub mod console;
pub mod simulated;

pub use console::{ConsoleSpeech, Microphone};
pub use simulated::{AutoplayGate, SimulatedSlot, SyntheticSource};
