//! In-process signals shared by independently mounted console components.

pub mod bus;
pub mod in_memory_bus;
pub mod signal;

pub use bus::{RecvError, SignalBus, Subscription};
pub use in_memory_bus::InMemorySignalBus;
pub use signal::ConsoleSignal;
