//! Options for the adaptive step-size controller and driver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bon::Builder;

use crate::Float;

/// Cooperative cancellation flag, polled once per accepted step.
///
/// Clone the token, hand one copy to another thread (or keep it in the
/// caller), and call [`CancelToken::cancel`]. The driver observes the flag at
/// the next accepted step and returns `SolveError::Cancelled` with the
/// abscissa it reached; partial output is discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Settings for the integrator driver.
#[derive(Builder, Clone)]
pub struct SolveOptions {
    /// Safety factor in step-size prediction.
    #[builder(default = 0.9)]
    pub safety: Float,
    /// Lower bound on the step-size ratio hnew/h.
    #[builder(default = 0.2)]
    pub shrink_limit: Float,
    /// Upper bound on hnew/h after an accepted step. After a rejection the
    /// next accepted step never grows.
    #[builder(default = 5.0)]
    pub growth_limit: Float,
    /// Accepted steps after which a stale Jacobian is refreshed.
    #[builder(default = 20)]
    pub jac_refresh_interval: usize,
    /// Consecutive rejections at a single abscissa before giving up.
    #[builder(default = 10)]
    pub max_rejections: usize,
    /// Hard cap on total steps.
    #[builder(default = 1_000_000)]
    pub max_steps: usize,
    /// Optional cooperative cancellation flag.
    pub cancel: Option<CancelToken>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions::builder().build()
    }
}
