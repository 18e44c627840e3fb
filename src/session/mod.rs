// ABOUTME: Interactive session core: orchestration, monitoring loop, output and key input

pub mod driver;
pub mod error;
pub mod events;
pub mod input;
pub mod monitor;
pub mod output;
pub mod state;

pub use driver::{Session, SessionReport};
pub use error::SessionError;
pub use events::QuitKey;
pub use input::{keys_from_reader, TerminalInput};
pub use monitor::{
    default_probe_command, spawn_cancellation_listener, MonitorExit, MonitorReport,
    MonitorSettings, ProbeResult, SessionMonitor, SessionSignal,
};
pub use output::{CapturedOutput, OutputSink};
pub use state::SessionState;
