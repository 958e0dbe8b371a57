// src/sensor/mod.rs

//! Sensor-family protocol definitions.
//!
//! Each supported module family implements [`SensorProtocol`]: frame
//! constants, request construction, and explicit fixed-offset field decoding
//! for both the byte-stream (UART) and bus-frame (CAN) transports. The
//! driver engine is generic over this trait and contains no family-specific
//! code.

pub mod daly;
pub mod tofsense;

use crate::common::can::{CanFilter, CanFrame, CAN_PAYLOAD_LEN};
use crate::common::error::Error;
use crate::common::types::{Channel, DeviceConfig};
use arrayvec::ArrayVec;
use core::fmt::Debug;

/// Capacity of the request-frame buffer; covers the longest query frame of
/// any supported family.
pub const MAX_QUERY_FRAME_LEN: usize = 8;

/// Outgoing request frame, formatted into a stack buffer.
pub type QueryFrame = ArrayVec<u8, MAX_QUERY_FRAME_LEN>;

/// Wire protocol of one sensor family.
///
/// Frame layouts are fixed per family and are not negotiated at runtime.
/// Decode functions read named fields at fixed offsets; no struct
/// overlaying, no endianness assumptions beyond the family's documented
/// byte order.
pub trait SensorProtocol {
    /// Header sentinel: the constant first byte of every frame.
    const HEADER: u8;

    /// Exact length of a byte-stream data frame, including the trailing
    /// checksum byte.
    const DATA_FRAME_LEN: usize;

    /// Typed view of the latest validated measurement.
    type Measurement: Clone + Default + Debug + Send;

    /// Whether this family exposes `channel` at all.
    ///
    /// Checked up front by `fetch`, so a caller bug surfaces as
    /// `UnsupportedChannel` in both query and active mode rather than only
    /// when a request frame is built.
    fn supports(channel: Channel) -> bool;

    /// Formats the byte-stream request frame for `channel`, checksum
    /// included.
    ///
    /// Families whose requests are channel-independent still validate that
    /// `channel` belongs to them, so an `UnsupportedChannel` error surfaces
    /// at `fetch` time rather than after a pointless bus transaction.
    fn build_query(cfg: &DeviceConfig, channel: Channel) -> Result<QueryFrame, Error>;

    /// Decodes a length-complete, checksum-validated data frame into the
    /// typed measurement.
    ///
    /// Takes the measurement by `&mut` because a single frame may carry
    /// only a subset of the family's fields (the BMS answers one data id
    /// per frame); fields not present in `raw` keep their previous values.
    fn decode_frame(measurement: &mut Self::Measurement, raw: &[u8]);

    /// Reads one channel out of the typed measurement, in the channel's
    /// native unit.
    fn read_channel(measurement: &Self::Measurement, channel: Channel) -> Result<i32, Error>;

    /// Acceptance filter so the bus layer only delivers frames addressed to
    /// this device/host pair.
    fn rx_filter(cfg: &DeviceConfig) -> CanFilter;

    /// Builds the bus request frame for `channel`.
    fn build_can_query(cfg: &DeviceConfig, channel: Channel) -> Result<CanFrame, Error>;

    /// Extracts the data-id discriminator from a received bus identifier
    /// (families without one return 0).
    fn can_data_id(id: u32) -> u8;

    /// Folds a received bus payload into the typed measurement. Bus frames
    /// carry no checksum; they are trusted at the acceptance-filter level.
    fn decode_can_payload(
        measurement: &mut Self::Measurement,
        data_id: u8,
        payload: &[u8; CAN_PAYLOAD_LEN],
    );
}
