//! Recovery strategies applied at the boundary layer.
//!
//! A strategy describes what a boundary does with a fault routed to it.
//! Every strategy absorbs the fault except [`RecoveryStrategy::Fail`], which
//! hands it to the parent boundary instead.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::fault::Fault;
use crate::severity::Severity;

/// Opaque async callable carried by [`RecoveryStrategy::Custom`].
///
/// Invoked only by the component applying the strategy. The returned future
/// owns its captures so it can outlive the borrowed fault.
pub type CustomRecovery = Arc<dyn Fn(&Fault) -> BoxFuture<'static, ()> + Send + Sync>;

/// What a boundary does with a fault routed to it.
#[derive(Clone)]
pub enum RecoveryStrategy {
    /// Retry the failed operation up to `max_attempts` times, waiting
    /// `delay` between attempts.
    Retry {
        /// Maximum number of retry attempts.
        max_attempts: u32,
        /// Delay between attempts.
        delay: Duration,
    },
    /// Do not absorb; hand the fault to the parent boundary.
    Fail,
    /// Absorb the fault by logging it at the given severity.
    Log(Severity),
    /// Absorb the fault silently.
    Ignore,
    /// Absorb the fault by running a caller-supplied recovery routine.
    Custom {
        /// Stable identifier; custom strategies compare equal by this alone.
        id: String,
        /// The recovery routine.
        handler: CustomRecovery,
    },
}

impl RecoveryStrategy {
    /// Retry strategy with the given attempt budget and inter-attempt delay.
    #[inline]
    #[must_use]
    pub const fn retry(max_attempts: u32, delay: Duration) -> Self {
        Self::Retry {
            max_attempts,
            delay,
        }
    }

    /// Custom strategy wrapping an async recovery routine.
    pub fn custom<F, Fut>(id: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Fault) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        Self::Custom {
            id: id.into(),
            handler: Arc::new(move |fault| Box::pin(handler(fault))),
        }
    }

    /// Whether applying this strategy absorbs the fault.
    ///
    /// [`RecoveryStrategy::Fail`] is the one strategy that refuses, handing
    /// the fault to the parent boundary.
    #[inline]
    #[must_use]
    pub const fn absorbs(&self) -> bool {
        !matches!(self, Self::Fail)
    }

    /// Short variant name for log fields.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Retry { .. } => "retry",
            Self::Fail => "fail",
            Self::Log(_) => "log",
            Self::Ignore => "ignore",
            Self::Custom { .. } => "custom",
        }
    }
}

impl PartialEq for RecoveryStrategy {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Retry {
                    max_attempts: a,
                    delay: a_delay,
                },
                Self::Retry {
                    max_attempts: b,
                    delay: b_delay,
                },
            ) => a == b && a_delay == b_delay,
            (Self::Fail, Self::Fail) | (Self::Ignore, Self::Ignore) => true,
            (Self::Log(a), Self::Log(b)) => a == b,
            (Self::Custom { id: a, .. }, Self::Custom { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for RecoveryStrategy {}

impl fmt::Debug for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry {
                max_attempts,
                delay,
            } => f
                .debug_struct("Retry")
                .field("max_attempts", max_attempts)
                .field("delay", delay)
                .finish(),
            Self::Fail => f.write_str("Fail"),
            Self::Log(severity) => f.debug_tuple("Log").field(severity).finish(),
            Self::Ignore => f.write_str("Ignore"),
            Self::Custom { id, .. } => {
                f.debug_struct("Custom").field("id", id).finish_non_exhaustive()
            }
        }
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
