// src/driver/mod.rs

//! The concurrent driver engine: one [`Device`] per configured sensor.
//!
//! Construction binds a sensor family ([`SensorProtocol`]) to a transport
//! ([`Transport`]) and splits the instance in two: the [`Device`] itself for
//! the consumer side, and a receiver handle for the producer side (the
//! platform's receive interrupt or callback). The two halves share one
//! mutex-guarded staging record with a condition variable for arrival
//! wakeups.
//!
//! ```no_run
//! # use framebus::driver::{Device, UartLink};
//! # use framebus::sensor::tofsense::TofSense;
//! # use framebus::{Channel, DeviceConfig};
//! # fn demo<S: framebus::common::SerialTx>(port: S) -> Result<(), framebus::Error> {
//! let cfg = DeviceConfig::new(0);
//! let (mut device, mut rx) = Device::<TofSense, _>::new(cfg, UartLink::new(port))?;
//! // Wire `rx.on_byte(..)` into the serial receive interrupt, then:
//! device.fetch(Channel::Distance)?;
//! let distance_mm = device.get(Channel::Distance)?;
//! # let _ = distance_mm;
//! # Ok(())
//! # }
//! ```

mod state;
mod transport;

pub use state::{CanReceiver, CanStaging, SharedState, Staging, UartReceiver};
pub use transport::{CanLink, Transport, UartLink};

use crate::common::error::Error;
use crate::common::types::{Channel, DeviceConfig, OperatingMode};
use crate::sensor::SensorProtocol;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

/// Consumer-side handle to one sensor instance.
pub struct Device<P: SensorProtocol, T: Transport<P>> {
    cfg: DeviceConfig,
    transport: T,
    shared: Arc<SharedState<P::Measurement>>,
}

impl<P: SensorProtocol, T: Transport<P>> Device<P, T> {
    /// Binds the transport and returns the device together with the producer
    /// handle to wire into the platform's receive path.
    pub fn new(cfg: DeviceConfig, mut transport: T) -> Result<(Self, T::Receiver), Error> {
        let shared = Arc::new(SharedState::new());
        let receiver = transport.bind(&cfg, Arc::clone(&shared))?;
        info!("sensor id {} bound, mode {:?}", cfg.id, cfg.mode);
        Ok((Device { cfg, transport, shared }, receiver))
    }

    /// Acquires a fresh measurement for `channel`.
    ///
    /// A channel the bound family does not expose fails up front with
    /// [`Error::UnsupportedChannel`], in either operating mode.
    ///
    /// In query mode the request frame is transmitted first; in active mode
    /// the sensor pushes on its own and this only waits. Either way the call
    /// blocks until input staged *after the previous consume* has been
    /// validated and decoded, or until the configured timeout elapses
    /// ([`Error::NoData`]). A frame that fails checksum validation surfaces
    /// as [`Error::ChecksumMismatch`] and leaves the previous measurement in
    /// place.
    ///
    /// On success the staged input is consumed, so a second `fetch` with no
    /// new sensor output times out rather than re-reading stale data.
    pub fn fetch(&mut self, channel: Channel) -> Result<(), Error> {
        if !P::supports(channel) {
            return Err(Error::UnsupportedChannel(channel));
        }
        if self.cfg.mode == OperatingMode::Query {
            self.transport.send_request(&self.cfg, channel)?;
            debug!("request for {:?} sent to sensor id {}", channel, self.cfg.id);
        }

        let deadline = Instant::now() + self.cfg.timeout;
        let mut staging = self.shared.lock();
        loop {
            if let Some(consumed) = T::poll_staging(&mut staging) {
                return consumed;
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "sensor id {} produced no data within {:?}",
                    self.cfg.id, self.cfg.timeout
                );
                return Err(Error::NoData);
            }
            staging = self.shared.wait_arrival(staging, deadline - now);
        }
    }

    /// Reads one channel from the latest validated measurement, in the
    /// channel's native unit. Never blocks beyond the staging lock and never
    /// touches the transport.
    pub fn get(&self, channel: Channel) -> Result<i32, Error> {
        let staging = self.shared.lock();
        P::read_channel(staging.measurement(), channel)
    }

    /// Snapshot of the whole typed measurement record.
    pub fn measurement(&self) -> P::Measurement {
        self.shared.lock().measurement().clone()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.cfg
    }
}

// --- Test doubles ---
#[cfg(test)]
pub(crate) mod mock {
    use crate::common::can::{CanFilter, CanFrame};
    use crate::common::hal_traits::{CanBus, SerialTx};
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct MockError;

    #[derive(Debug, Default)]
    struct SerialLog {
        written: Vec<u8>,
        flushes: usize,
        fail_writes: bool,
    }

    /// Transmit-only serial double recording every written byte. The handle
    /// is a clone sharing the same log, so tests keep visibility after the
    /// mock moves into a link.
    #[derive(Debug, Clone, Default)]
    pub struct MockSerial {
        log: Arc<Mutex<SerialLog>>,
    }

    impl MockSerial {
        pub fn new() -> Self {
            MockSerial::default()
        }

        pub fn handle(&self) -> MockSerial {
            self.clone()
        }

        fn log(&self) -> MutexGuard<'_, SerialLog> {
            self.log.lock().unwrap_or_else(PoisonError::into_inner)
        }

        pub fn written(&self) -> Vec<u8> {
            self.log().written.clone()
        }

        pub fn flushes(&self) -> usize {
            self.log().flushes
        }

        pub fn fail_writes(&self) {
            self.log().fail_writes = true;
        }
    }

    impl SerialTx for MockSerial {
        type Error = MockError;

        fn write_byte(&mut self, byte: u8) -> nb::Result<(), MockError> {
            let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
            if log.fail_writes {
                return Err(nb::Error::Other(MockError));
            }
            log.written.push(byte);
            Ok(())
        }

        fn flush(&mut self) -> nb::Result<(), MockError> {
            self.log().flushes += 1;
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct CanState {
        started: bool,
        filters: Vec<CanFilter>,
        transmitted: Vec<CanFrame>,
        fail_start: bool,
        fail_transmit: bool,
    }

    /// Controller double recording filters and transmitted frames.
    #[derive(Debug, Clone, Default)]
    pub struct MockCan {
        state: Arc<Mutex<CanState>>,
    }

    impl MockCan {
        pub fn new() -> Self {
            MockCan::default()
        }

        pub fn handle(&self) -> MockCan {
            self.clone()
        }

        fn state(&self) -> MutexGuard<'_, CanState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        pub fn started(&self) -> bool {
            self.state().started
        }

        pub fn filters(&self) -> Vec<CanFilter> {
            self.state().filters.clone()
        }

        pub fn transmitted(&self) -> Vec<CanFrame> {
            self.state().transmitted.clone()
        }

        pub fn fail_start(&self) {
            self.state().fail_start = true;
        }

        pub fn fail_transmit(&self) {
            self.state().fail_transmit = true;
        }
    }

    impl CanBus for MockCan {
        type Error = MockError;

        fn start(&mut self) -> Result<(), MockError> {
            let mut state = self.state();
            if state.fail_start {
                return Err(MockError);
            }
            state.started = true;
            Ok(())
        }

        fn add_filter(&mut self, filter: &CanFilter) -> Result<(), MockError> {
            self.state().filters.push(*filter);
            Ok(())
        }

        fn transmit(&mut self, frame: &CanFrame) -> nb::Result<(), MockError> {
            let mut state = self.state();
            if state.fail_transmit {
                return Err(nb::Error::Other(MockError));
            }
            state.transmitted.push(*frame);
            Ok(())
        }
    }
}
