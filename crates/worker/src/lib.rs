//! Async drivers for tether dependency managers.
//!
//! Managers are synchronous; this crate runs the tokio tasks around them:
//! event pumps that forward registry and configuration streams into slots,
//! the periodic retry loop, and deadline-bounded activation.

mod activation;
mod class;
mod drivers;
mod handle;
mod pump;
mod retry;
mod spawn;
#[cfg(test)]
mod test_support;

pub use activation::{activate, activate_within};
pub use class::TaskClass;
pub use drivers::{ComponentDrivers, DriverRecord, DriversReport};
pub use handle::{DriverError, DriverHandle};
pub use pump::{PumpExit, PumpReport, pump_configuration, pump_services, spawn_pump};
pub use retry::{RetryExit, RetryReport, spawn_retry, spawn_retry_every};
pub use spawn::spawn;
