// src/common/hal_traits.rs

use super::can::{CanFilter, CanFrame};
use core::fmt::Debug;

/// Abstraction for the transmit half of a byte-oriented serial line.
///
/// The receive half is interrupt-driven on real hardware: the platform's
/// receive ISR feeds bytes straight into a
/// [`UartReceiver`](crate::driver::UartReceiver), so no read method appears
/// here.
pub trait SerialTx {
    /// Associated error type for communication errors.
    type Error: Debug;

    /// Attempts to write a single byte to the serial interface.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` if the transmit buffer is full;
    /// other errors are returned as `Err(nb::Error::Other(Self::Error))`.
    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error>;

    /// Attempts to flush the transmit buffer, ensuring all written bytes
    /// have been sent.
    fn flush(&mut self) -> nb::Result<(), Self::Error>;
}

/// Abstraction for a CAN controller.
///
/// Received frames are delivered by the platform's receive callback to a
/// [`CanReceiver`](crate::driver::CanReceiver); this trait covers the
/// controller-facing operations the driver itself performs.
pub trait CanBus {
    /// Associated error type for controller errors.
    type Error: Debug;

    /// Brings the controller out of reset/stopped state. Must be idempotent:
    /// starting an already-started controller is not an error.
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Installs an acceptance filter so only matching frames reach the
    /// receive callback. Fails if the controller is out of filter slots.
    fn add_filter(&mut self, filter: &CanFilter) -> Result<(), Self::Error>;

    /// Attempts to queue a frame for transmission.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` while no transmit mailbox is
    /// free.
    fn transmit(&mut self, frame: &CanFrame) -> nb::Result<(), Self::Error>;
}
