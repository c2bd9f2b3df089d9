pub mod config;
pub mod fabric;
pub mod logging;
pub mod options;
pub mod registry;

use std::{env, ops::Mul as _, sync::LazyLock, time::Duration};

pub use config::HarnessConfig;
pub use fabric::FabricHarness;

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

static IS_SLOW_TEST_ENV: LazyLock<bool> =
    LazyLock::new(|| env::var("SLOW_TEST_ENV").is_ok_and(|s| s == "true"));

/// In slow test environments like Codecov, use 2x timeout.
#[must_use]
pub fn adjust_timeout(d: Duration) -> Duration {
    if *IS_SLOW_TEST_ENV { d.mul(2) } else { d }
}
