//! System signal handling for graceful shutdown.
//!
//! * Unix: SIGTERM, SIGHUP, and Ctrl-C (SIGINT)
//! * Windows: Ctrl-C only
//!
//! # Example
//!
//! ```no_run
//! use cssorbot::signal::Handler;
//!
//! async fn example() {
//!     let mut signals = Handler::new().unwrap();
//!     let signal = signals.recv().await.unwrap();
//!     println!("{signal} received, shutting down...");
//! }
//! ```

use std::fmt;

use crate::error::{Error, Result};

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Signal that triggered a shutdown.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[expect(clippy::module_name_repetitions)]
pub enum ShutdownSignal {
    /// Ctrl-C/SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
    /// SIGHUP: the controlling terminal went away
    Hangup,
}

/// Waits for system signals.
pub struct Handler {
    #[cfg(unix)]
    sigterm: Signal,
    #[cfg(unix)]
    sighup: Signal,
}

impl Handler {
    /// Registers the signal handlers.
    ///
    /// # Errors
    ///
    /// Returns error if signal handlers cannot be registered.
    pub fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            Ok(Self {
                sigterm: signal(SignalKind::terminate())?,
                sighup: signal(SignalKind::hangup())?,
            })
        }

        #[cfg(not(unix))]
        Ok(Self {})
    }

    /// Waits for the next signal.
    ///
    /// # Errors
    ///
    /// Returns error if a signal can no longer be listened for.
    pub async fn recv(&mut self) -> Result<ShutdownSignal> {
        #[cfg(unix)]
        {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result.map(|()| ShutdownSignal::Interrupt).map_err(Into::into)
                }
                received = self.sigterm.recv() => delivered(ShutdownSignal::Terminate, received),
                received = self.sighup.recv() => delivered(ShutdownSignal::Hangup, received),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            Ok(ShutdownSignal::Interrupt)
        }
    }
}

/// Maps the end of a signal stream to an error.
#[cfg_attr(not(unix), allow(dead_code))]
fn delivered(signal: ShutdownSignal, received: Option<()>) -> Result<ShutdownSignal> {
    received
        .map(|()| signal)
        .ok_or_else(|| Error::unavailable(format!("no longer listening for {signal}")))
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "Ctrl+C"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Hangup => write!(f, "SIGHUP"),
        }
    }
}
