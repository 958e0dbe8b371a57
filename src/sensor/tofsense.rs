// src/sensor/tofsense.rs

//! Time-of-flight distance module (NLink frame protocol).
//!
//! UART data frame, 16 bytes, all multi-byte fields little-endian:
//!
//! ```text
//! [0]      header (0x57)
//! [1]      function mark (0x00 for data output)
//! [2]      reserved (0xFF)
//! [3]      module id
//! [4..8]   system time since module boot, ms (u32)
//! [8..11]  distance, mm (u24)
//! [11]     distance status (0 = usable)
//! [12..14] signal strength (u16)
//! [14]     reserved
//! [15]     additive checksum
//! ```
//!
//! In query mode the host sends a 4-byte request
//! `[0x57, 0x10, id, checksum]`; in active mode (factory default) the
//! module pushes data frames at ~30 Hz on its own.

use super::{QueryFrame, SensorProtocol};
use crate::common::can::{CanFilter, CanFrame, CAN_PAYLOAD_LEN};
use crate::common::checksum::additive_checksum;
use crate::common::error::Error;
use crate::common::types::{Channel, DeviceConfig};

/// Constant first byte of every frame.
pub const FRAME_HEADER: u8 = 0x57;
/// Function mark of an output/data frame.
pub const FUNCTION_MARK_DATA: u8 = 0x00;
/// Function mark of a query request.
pub const FUNCTION_MARK_QUERY: u8 = 0x10;
/// Length of the UART data frame.
pub const DATA_FRAME_LEN: usize = 16;
/// Length of the UART query frame.
pub const QUERY_FRAME_LEN: usize = 4;

/// Bus receive identifier base; a module with id `n` transmits on
/// `0x200 + n`.
pub const CAN_RECEIVE_ID_BASE: u32 = 0x200;
/// Identifier the host transmits query requests on.
pub const CAN_QUERY_ID: u32 = 0x402;
/// Payload offset of the module id inside a bus query frame.
const CAN_QUERY_ID_OFFSET: usize = 3;

/// Latest validated measurement of one ToF module.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TofMeasurement {
    /// Module-local timestamp of the frame, ms.
    pub system_time_ms: u32,
    /// Measured distance, mm.
    pub distance_mm: u32,
    /// 0 means the distance reading is usable; out-of-range measurements
    /// report a non-zero status and a jumping distance value.
    pub distance_status: u8,
    /// Raw signal strength.
    pub signal_strength: u16,
}

/// Marker type implementing [`SensorProtocol`] for the ToF family.
#[derive(Debug, Copy, Clone)]
pub struct TofSense;

impl SensorProtocol for TofSense {
    const HEADER: u8 = FRAME_HEADER;
    const DATA_FRAME_LEN: usize = DATA_FRAME_LEN;

    type Measurement = TofMeasurement;

    fn supports(channel: Channel) -> bool {
        matches!(
            channel,
            Channel::Distance
                | Channel::DistanceStatus
                | Channel::SignalStrength
                | Channel::SystemTime
        )
    }

    fn build_query(cfg: &DeviceConfig, channel: Channel) -> Result<QueryFrame, Error> {
        if !Self::supports(channel) {
            return Err(Error::UnsupportedChannel(channel));
        }

        let mut frame = QueryFrame::new();
        frame.push(FRAME_HEADER);
        frame.push(FUNCTION_MARK_QUERY);
        frame.push(cfg.id);
        frame.push(0);
        let sum = additive_checksum(&frame);
        frame[QUERY_FRAME_LEN - 1] = sum;
        Ok(frame)
    }

    fn decode_frame(measurement: &mut TofMeasurement, raw: &[u8]) {
        measurement.system_time_ms = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        measurement.distance_mm = u32::from_le_bytes([raw[8], raw[9], raw[10], 0]);
        measurement.distance_status = raw[11];
        measurement.signal_strength = u16::from_le_bytes([raw[12], raw[13]]);
    }

    fn read_channel(measurement: &TofMeasurement, channel: Channel) -> Result<i32, Error> {
        match channel {
            Channel::Distance => Ok(measurement.distance_mm as i32),
            Channel::DistanceStatus => Ok(i32::from(measurement.distance_status)),
            Channel::SignalStrength => Ok(i32::from(measurement.signal_strength)),
            // Saturates once the module uptime exceeds i32::MAX ms.
            Channel::SystemTime => {
                Ok(i32::try_from(measurement.system_time_ms).unwrap_or(i32::MAX))
            }
            other => Err(Error::UnsupportedChannel(other)),
        }
    }

    fn rx_filter(cfg: &DeviceConfig) -> CanFilter {
        CanFilter {
            id: CAN_RECEIVE_ID_BASE + u32::from(cfg.id),
            mask: 0x7FF,
            extended: false,
        }
    }

    fn build_can_query(cfg: &DeviceConfig, channel: Channel) -> Result<CanFrame, Error> {
        if !Self::supports(channel) {
            return Err(Error::UnsupportedChannel(channel));
        }

        let mut data = [0u8; CAN_PAYLOAD_LEN];
        data[CAN_QUERY_ID_OFFSET] = cfg.id;
        Ok(CanFrame::new(CAN_QUERY_ID, false, data))
    }

    fn can_data_id(_id: u32) -> u8 {
        0
    }

    fn decode_can_payload(
        measurement: &mut TofMeasurement,
        _data_id: u8,
        payload: &[u8; CAN_PAYLOAD_LEN],
    ) {
        measurement.distance_mm = u32::from_le_bytes([payload[0], payload[1], payload[2], 0]);
        measurement.distance_status = payload[3];
        measurement.signal_strength = u16::from_le_bytes([payload[4], payload[5]]);
    }
}

/// Builds a well-formed 16-byte data frame; helper shared with the driver
/// tests.
#[cfg(test)]
pub(crate) fn data_frame(
    id: u8,
    system_time_ms: u32,
    distance_mm: u32,
    status: u8,
    signal: u16,
) -> [u8; DATA_FRAME_LEN] {
    let mut frame = [0u8; DATA_FRAME_LEN];
    frame[0] = FRAME_HEADER;
    frame[1] = FUNCTION_MARK_DATA;
    frame[2] = 0xFF;
    frame[3] = id;
    frame[4..8].copy_from_slice(&system_time_ms.to_le_bytes());
    frame[8..11].copy_from_slice(&distance_mm.to_le_bytes()[..3]);
    frame[11] = status;
    frame[12..14].copy_from_slice(&signal.to_le_bytes());
    frame[15] = additive_checksum(&frame);
    frame
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::checksum::verify_frame;

    #[test]
    fn query_frame_round_trip_validates() {
        let cfg = DeviceConfig::new(0x07);
        let frame = TofSense::build_query(&cfg, Channel::Distance).unwrap();
        assert_eq!(frame.len(), QUERY_FRAME_LEN);
        assert_eq!(frame[0], FRAME_HEADER);
        assert_eq!(frame[1], FUNCTION_MARK_QUERY);
        assert_eq!(frame[2], 0x07);
        assert!(verify_frame(&frame).is_ok());
    }

    #[test]
    fn query_rejects_foreign_channel() {
        let cfg = DeviceConfig::new(0);
        assert!(matches!(
            TofSense::build_query(&cfg, Channel::StateOfCharge),
            Err(Error::UnsupportedChannel(Channel::StateOfCharge))
        ));
    }

    #[test]
    fn data_frame_decodes_at_fixed_offsets() {
        let raw = data_frame(0x00, 123_456, 1500, 0, 812);
        assert!(verify_frame(&raw).is_ok());

        let mut m = TofMeasurement::default();
        TofSense::decode_frame(&mut m, &raw);
        assert_eq!(m.system_time_ms, 123_456);
        assert_eq!(m.distance_mm, 1500);
        assert_eq!(m.distance_status, 0);
        assert_eq!(m.signal_strength, 812);
    }

    #[test]
    fn distance_is_a_24_bit_field() {
        let raw = data_frame(0, 0, 0xFF_FFFF, 0, 0);
        let mut m = TofMeasurement::default();
        TofSense::decode_frame(&mut m, &raw);
        assert_eq!(m.distance_mm, 0xFF_FFFF);
    }

    #[test]
    fn channel_reads() {
        let m = TofMeasurement {
            system_time_ms: 99,
            distance_mm: 1500,
            distance_status: 1,
            signal_strength: 600,
        };
        assert_eq!(TofSense::read_channel(&m, Channel::Distance).unwrap(), 1500);
        assert_eq!(TofSense::read_channel(&m, Channel::DistanceStatus).unwrap(), 1);
        assert_eq!(TofSense::read_channel(&m, Channel::SignalStrength).unwrap(), 600);
        assert_eq!(TofSense::read_channel(&m, Channel::SystemTime).unwrap(), 99);
        assert!(matches!(
            TofSense::read_channel(&m, Channel::Current),
            Err(Error::UnsupportedChannel(Channel::Current))
        ));
    }

    #[test]
    fn channel_support_matches_family() {
        assert!(TofSense::supports(Channel::Distance));
        assert!(TofSense::supports(Channel::SystemTime));
        assert!(!TofSense::supports(Channel::StateOfCharge));
        assert!(!TofSense::supports(Channel::Current));
    }

    #[test]
    fn system_time_read_saturates() {
        let m = TofMeasurement { system_time_ms: u32::MAX, ..Default::default() };
        assert_eq!(TofSense::read_channel(&m, Channel::SystemTime).unwrap(), i32::MAX);
    }

    #[test]
    fn rx_filter_selects_module_receive_id() {
        let cfg = DeviceConfig::new(0x05);
        let filter = TofSense::rx_filter(&cfg);
        assert!(filter.matches(0x205, false));
        assert!(!filter.matches(0x206, false));
        assert!(!filter.matches(0x205, true));
    }

    #[test]
    fn can_query_carries_module_id() {
        let cfg = DeviceConfig::new(0x09);
        let frame = TofSense::build_can_query(&cfg, Channel::Distance).unwrap();
        assert_eq!(frame.id, CAN_QUERY_ID);
        assert!(!frame.extended);
        assert_eq!(frame.data[3], 0x09);
    }

    #[test]
    fn can_payload_decodes() {
        let mut payload = [0u8; CAN_PAYLOAD_LEN];
        payload[..3].copy_from_slice(&2500u32.to_le_bytes()[..3]);
        payload[3] = 0;
        payload[4..6].copy_from_slice(&321u16.to_le_bytes());

        let mut m = TofMeasurement::default();
        TofSense::decode_can_payload(&mut m, 0, &payload);
        assert_eq!(m.distance_mm, 2500);
        assert_eq!(m.distance_status, 0);
        assert_eq!(m.signal_strength, 321);
    }
}
