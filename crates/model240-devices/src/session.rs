/*!
 * Device session for the Model 240 gateway.
 *
 * The session is the only owner of the live instrument handle. The handle sits
 * behind one async mutex and every interaction with the hardware runs while
 * that mutex is held, so calls from concurrent requests are totally ordered and
 * never interleave on the serial link.
 *
 * Device calls block, so they run on tokio's blocking pool. The lock guard is
 * moved into the blocking task: if the caller gives up after the timeout, the
 * lock is still held until the device call actually returns.
 */
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn, Instrument};

use model240_core::error::Error as CoreError;
use model240_core::logging::operation_span;
use model240_core::utils::blocking_with_timeout;

use crate::device::{DeviceError, DeviceFactory, Model240, Result};

type DeviceSlot = Option<Box<dyn Model240>>;

/// Progress of a connect whose caller may stop waiting
const OPEN_PENDING: u8 = 0;
const OPEN_KEPT: u8 = 1;
const OPEN_ABANDONED: u8 = 2;

/// Result of a connect request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectOutcome {
    /// A new connection was opened
    Connected,
    /// A connection already existed; nothing was opened
    AlreadyConnected,
}

/// Result of a disconnect request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectOutcome {
    /// The live connection was released
    Disconnected,
    /// There was nothing to release
    AlreadyDisconnected,
}

/// Exclusive access to the live instrument
///
/// Holding a guard holds the session lock; drop it to let other callers in.
pub struct SessionGuard {
    slot: OwnedMutexGuard<DeviceSlot>,
}

impl SessionGuard {
    /// The live instrument
    pub fn device(&mut self) -> Result<&mut dyn Model240> {
        match self.slot.as_deref_mut() {
            Some(device) => Ok(device),
            None => Err(DeviceError::NotConnected),
        }
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("connected", &self.slot.is_some())
            .finish()
    }
}

/// Owner of the single instrument connection
#[derive(Debug)]
pub struct DeviceSession {
    /// The live handle, if any, and the lock serializing all access to it
    device: Arc<Mutex<DeviceSlot>>,
    /// Mirrors whether the slot holds a handle; only written under the lock
    connected: Arc<AtomicBool>,
    /// Opens new connections
    factory: Arc<dyn DeviceFactory>,
    /// Default bound for one interaction
    call_timeout: Duration,
}

/// A thread-safe reference to a device session
pub type SharedDeviceSession = Arc<DeviceSession>;

impl DeviceSession {
    /// Create a disconnected session
    pub fn new(factory: Arc<dyn DeviceFactory>, call_timeout: Duration) -> Self {
        Self {
            device: Arc::new(Mutex::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
            factory,
            call_timeout,
        }
    }

    /// Default bound for one interaction
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Open a connection unless one is already live
    ///
    /// The lock is held while the factory runs, so two concurrent connects
    /// open at most one handle. The guard moves into the blocking task: if the
    /// caller stops waiting, the lock stays held until the factory returns and
    /// a handle opened after that point is released instead of kept.
    pub async fn connect(&self) -> Result<ConnectOutcome> {
        let mut slot = self.device.clone().lock_owned().await;
        if slot.is_some() {
            debug!("Connect requested while already connected");
            return Ok(ConnectOutcome::AlreadyConnected);
        }

        let target = self.factory.describe();
        info!("Connecting to instrument at {}", target);

        let factory = self.factory.clone();
        let state = Arc::new(AtomicU8::new(OPEN_PENDING));
        let worker_state = state.clone();
        let connected = self.connected.clone();
        let opened = blocking_with_timeout(self.call_timeout, "connect", move || -> Result<()> {
            let mut device = factory.open()?;
            let claimed = worker_state
                .compare_exchange(OPEN_PENDING, OPEN_KEPT, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
            if !claimed {
                warn!("Releasing instrument opened after the connect timed out");
                if let Err(e) = device.disconnect() {
                    warn!("Ignoring error while releasing instrument: {}", e);
                }
                return Err(DeviceError::connection(
                    "instrument opened after the connect timed out",
                ));
            }
            *slot = Some(device);
            connected.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

        let opened = match opened {
            Ok(result) => result,
            Err(CoreError::Timeout(msg)) => {
                let abandoned = state
                    .compare_exchange(
                        OPEN_PENDING,
                        OPEN_ABANDONED,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok();
                if abandoned {
                    Err(DeviceError::Timeout(msg))
                } else {
                    // the handle is being stored just as the caller gave up
                    self.connected.store(true, Ordering::SeqCst);
                    Ok(())
                }
            }
            Err(e) => Err(e.into()),
        }
        .map_err(|e| match e {
            failure @ DeviceError::ConnectionFailure(_) => failure,
            other => DeviceError::connection(other.to_string()),
        });

        match opened {
            Ok(()) => {
                info!("Connected to instrument at {}", target);
                Ok(ConnectOutcome::Connected)
            }
            Err(e) => {
                warn!("Failed to connect to instrument at {}: {}", target, e);
                Err(e)
            }
        }
    }

    /// Release the live connection, if any
    ///
    /// Never fails: the session is disconnected afterwards even when releasing
    /// the hardware reports an error.
    pub async fn disconnect(&self) -> DisconnectOutcome {
        let mut slot = self.device.lock().await;
        let mut device = match slot.take() {
            Some(device) => {
                self.connected.store(false, Ordering::SeqCst);
                device
            }
            None => {
                debug!("Disconnect requested while already disconnected");
                return DisconnectOutcome::AlreadyDisconnected;
            }
        };

        let released =
            blocking_with_timeout(self.call_timeout, "disconnect", move || device.disconnect())
                .await;
        match released {
            Ok(Ok(())) => info!("Disconnected from instrument"),
            Ok(Err(e)) => warn!("Ignoring error while releasing instrument: {}", e),
            Err(e) => warn!("Ignoring failure while releasing instrument: {}", e),
        }

        DisconnectOutcome::Disconnected
    }

    /// Whether a live handle is held
    ///
    /// Answers without waiting for the session lock, so it stays responsive
    /// while a long interaction such as a full-curve read is running.
    pub async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Lock the session and hand out the live instrument
    ///
    /// Fails with [`DeviceError::NotConnected`] when there is none. The lock is
    /// held until the guard is dropped.
    pub async fn current_device(&self) -> Result<SessionGuard> {
        let slot = self.device.clone().lock_owned().await;
        if slot.is_none() {
            return Err(DeviceError::NotConnected);
        }
        Ok(SessionGuard { slot })
    }

    /// Run one device interaction under the session lock
    pub async fn with_exclusive_access<F, T>(&self, name: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Model240) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_exclusive_access_timeout(name, self.call_timeout, f)
            .await
    }

    /// Run one device interaction under the session lock with an explicit bound
    pub async fn with_exclusive_access_timeout<F, T>(
        &self,
        name: &'static str,
        timeout: Duration,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut dyn Model240) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let span = operation_span(name, "session");

        async move {
            let mut guard = self.current_device().await?;
            let worker_span = tracing::Span::current();

            let result = blocking_with_timeout(timeout, name, move || {
                let _entered = worker_span.enter();
                debug!("Device interaction started");
                let result = guard.device().and_then(f);
                if let Err(e) = &result {
                    debug!("Device interaction failed: {}", e);
                }
                result
            })
            .await;

            result?
        }
        .instrument(span)
        .await
    }

    /// Disconnect as part of process shutdown
    pub async fn shutdown(&self) {
        if self.disconnect().await == DisconnectOutcome::Disconnected {
            info!("Instrument released during shutdown");
        }
    }
}
