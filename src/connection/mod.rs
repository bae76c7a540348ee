pub mod lightspeed;
pub mod tracker;
pub mod window;

pub use tracker::{
    ConnectionSnapshot, ConnectionState, ConnectionTracker, StateKind, TickReport, Transition,
    WindowSummary,
};
pub use window::{Sample, SlidingWindowLog};
