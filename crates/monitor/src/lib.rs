//! Synchronous host for the g-force monitor: the polling loop plus the
//! sample sources and indicator banks it is usually wired to.

pub mod actuator;
pub mod input;
pub mod monitor_loop;
pub mod sensor;

pub use actuator::{BankCall, ConsoleIndicatorBank, Indicator, IndicatorFrame, RecordingIndicatorBank};
pub use input::{ButtonInputs, ButtonLatch};
pub use monitor_loop::{CycleReport, LoggerTransition, MonitorLoop, MonitorState, RunSummary};
pub use sensor::{ScriptedSampleSource, SimulatedSampleSource};
