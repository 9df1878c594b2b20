//! Core application primitives (clock, shutdown, cycle runtime, scheduler, HTTP)

pub mod clock;
pub mod http;
pub mod runtime;
pub mod scheduler;
pub mod shutdown;

pub use clock::{Clock, FixedClock, SystemClock};
pub use http::{create_router, start_server, AppState, HealthStatus};
pub use runtime::CycleRuntime;
pub use scheduler::{CycleScheduler, SchedulerState};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
