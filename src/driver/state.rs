// src/driver/state.rs

//! Shared state between the producer (receive interrupt/callback) and the
//! consumer (`fetch`/`get` callers).
//!
//! One mutex guards one [`Staging`] record per device; a condition variable
//! signals frame arrival. Producers hold the lock only long enough to copy a
//! completed frame in and notify. Validation and decoding happen on the
//! consumer side, so the producer path stays short enough for interrupt
//! context.

use crate::common::can::CAN_PAYLOAD_LEN;
use crate::common::sync::{FrameSynchronizer, RawFrame};
use crate::sensor::SensorProtocol;
use core::marker::PhantomData;
use log::trace;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A received bus frame awaiting consumer-side decoding: the data-id
/// discriminator extracted from the identifier, plus the payload.
#[derive(Debug, Copy, Clone)]
pub struct CanStaging {
    pub data_id: u8,
    pub payload: [u8; CAN_PAYLOAD_LEN],
}

/// The mutex-guarded record: staged raw input plus the latest validated
/// typed measurement.
///
/// An empty `raw` buffer and an empty `can` slot mean "nothing staged"; a
/// fetch that consumes the staged input clears it, so a second fetch without
/// new sensor output times out instead of re-reading stale bytes. A new
/// frame arriving before the previous one was consumed simply replaces it.
#[derive(Debug, Default)]
pub struct Staging<M> {
    raw: RawFrame,
    can: Option<CanStaging>,
    measurement: M,
}

impl<M> Staging<M> {
    /// The staged byte-stream frame; empty when nothing has arrived since
    /// the last consume.
    pub fn raw_frame(&self) -> &[u8] {
        &self.raw
    }

    /// Clears the staged byte-stream frame.
    pub fn clear_raw(&mut self) {
        self.raw.clear();
    }

    /// Removes and returns the staged bus frame, if any.
    pub fn take_can(&mut self) -> Option<CanStaging> {
        self.can.take()
    }

    /// The latest validated measurement.
    pub fn measurement(&self) -> &M {
        &self.measurement
    }

    /// Replaces the validated measurement. Called with the lock held, so a
    /// concurrent `get` never observes a half-written record.
    pub fn set_measurement(&mut self, measurement: M) {
        self.measurement = measurement;
    }
}

/// Lock-plus-condvar pair shared between a device and its receiver handle.
#[derive(Debug, Default)]
pub struct SharedState<M> {
    staging: Mutex<Staging<M>>,
    arrived: Condvar,
}

impl<M: Default> SharedState<M> {
    pub(crate) fn new() -> Self {
        SharedState { staging: Mutex::new(Staging::default()), arrived: Condvar::new() }
    }
}

impl<M> SharedState<M> {
    /// Locks the staging record. A poisoned lock is taken over rather than
    /// propagated: the record holds plain sensor data and stays internally
    /// consistent even if a holder panicked.
    pub fn lock(&self) -> MutexGuard<'_, Staging<M>> {
        self.staging.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks on the arrival condvar for at most `timeout`, reacquiring the
    /// lock on return. Spurious wakeups are possible; callers re-check the
    /// staging record and their deadline in a loop.
    pub(crate) fn wait_arrival<'a>(
        &self,
        guard: MutexGuard<'a, Staging<M>>,
        timeout: Duration,
    ) -> MutexGuard<'a, Staging<M>> {
        self.arrived
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner)
            .0
    }

    pub(crate) fn publish_raw(&self, frame: RawFrame) {
        let mut staging = self.lock();
        staging.raw = frame;
        drop(staging);
        self.arrived.notify_all();
    }

    pub(crate) fn publish_can(&self, staged: CanStaging) {
        let mut staging = self.lock();
        staging.can = Some(staged);
        drop(staging);
        self.arrived.notify_all();
    }
}

/// Producer handle for a byte-stream transport. The platform's serial
/// receive interrupt feeds every received byte into [`on_byte`](Self::on_byte).
#[derive(Debug)]
pub struct UartReceiver<P: SensorProtocol> {
    synchronizer: FrameSynchronizer,
    shared: Arc<SharedState<P::Measurement>>,
    _family: PhantomData<P>,
}

impl<P: SensorProtocol> UartReceiver<P> {
    pub(crate) fn new(shared: Arc<SharedState<P::Measurement>>) -> Self {
        UartReceiver {
            synchronizer: FrameSynchronizer::new(P::HEADER, P::DATA_FRAME_LEN),
            shared,
            _family: PhantomData,
        }
    }

    /// Feeds one received byte. When the byte completes a frame, the frame
    /// is staged and any waiting fetch is woken. Never blocks beyond the
    /// short staging lock.
    pub fn on_byte(&mut self, byte: u8) {
        if let Some(frame) = self.synchronizer.push(byte) {
            trace!("staging {}-byte frame", frame.len());
            self.shared.publish_raw(frame);
        }
    }

    /// Convenience for platforms that drain a receive FIFO in batches.
    pub fn on_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.on_byte(*byte);
        }
    }
}

/// Producer handle for a bus transport. The platform's CAN receive callback
/// delivers each accepted frame via [`on_frame`](Self::on_frame); acceptance
/// filtering already happened at the controller.
#[derive(Debug)]
pub struct CanReceiver<P: SensorProtocol> {
    shared: Arc<SharedState<P::Measurement>>,
    _family: PhantomData<P>,
}

impl<P: SensorProtocol> CanReceiver<P> {
    pub(crate) fn new(shared: Arc<SharedState<P::Measurement>>) -> Self {
        CanReceiver { shared, _family: PhantomData }
    }

    /// Stages one received bus frame and wakes any waiting fetch.
    pub fn on_frame(&self, id: u32, payload: &[u8; CAN_PAYLOAD_LEN]) {
        self.shared.publish_can(CanStaging { data_id: P::can_data_id(id), payload: *payload });
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::tofsense::{self, TofSense};
    use std::thread;
    use std::time::Instant;

    #[test]
    fn uart_receiver_stages_completed_frame() {
        let shared = Arc::new(SharedState::new());
        let mut rx = UartReceiver::<TofSense>::new(Arc::clone(&shared));

        let frame = tofsense::data_frame(0, 1, 1500, 0, 100);
        rx.on_bytes(&frame[..frame.len() - 1]);
        assert!(shared.lock().raw_frame().is_empty());

        rx.on_byte(frame[frame.len() - 1]);
        assert_eq!(shared.lock().raw_frame(), &frame);
    }

    #[test]
    fn newer_frame_replaces_unconsumed_one() {
        let shared = Arc::new(SharedState::new());
        let mut rx = UartReceiver::<TofSense>::new(Arc::clone(&shared));

        rx.on_bytes(&tofsense::data_frame(0, 1, 100, 0, 0));
        rx.on_bytes(&tofsense::data_frame(0, 2, 200, 0, 0));
        assert_eq!(shared.lock().raw_frame(), &tofsense::data_frame(0, 2, 200, 0, 0));
    }

    #[test]
    fn can_receiver_stages_payload_with_data_id() {
        let shared = Arc::new(SharedState::new());
        let rx = CanReceiver::<TofSense>::new(Arc::clone(&shared));

        rx.on_frame(0x205, &[1, 2, 3, 4, 5, 6, 7, 8]);
        let staged = shared.lock().take_can().expect("frame should be staged");
        assert_eq!(staged.payload, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(shared.lock().take_can().is_none());
    }

    #[test]
    fn publish_wakes_a_waiting_thread() {
        let shared = Arc::new(SharedState::<u32>::default());
        let producer = Arc::clone(&shared);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.publish_can(CanStaging { data_id: 0, payload: [0; CAN_PAYLOAD_LEN] });
        });

        let start = Instant::now();
        let mut guard = shared.lock();
        while guard.take_can().is_none() {
            assert!(start.elapsed() < Duration::from_secs(2), "wakeup never arrived");
            guard = shared.wait_arrival(guard, Duration::from_millis(500));
        }
        drop(guard);
        handle.join().unwrap();
    }
}
