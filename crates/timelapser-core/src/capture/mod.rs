//! Scheduled frame capture.

pub mod frame;
pub mod scheduler;

pub use frame::{CaptureSettings, frame_file_name};
pub use scheduler::{
    CaptureScheduler, CaptureState, StopCallback, StopReason, StopSummary, TickOutcome,
};
