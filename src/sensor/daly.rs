// src/sensor/daly.rs

//! Battery-management system (Daly protocol).
//!
//! The BMS answers one *data id* per frame; the host names the id in its
//! request and the response carries the matching 8-byte payload. UART data
//! frame, 13 bytes:
//!
//! ```text
//! [0]      header (0xA5)
//! [1]      data id
//! [2]      device id
//! [3]      payload length (always 8)
//! [4..12]  payload (layout per data id, multi-byte fields big-endian)
//! [12]     additive checksum
//! ```
//!
//! UART query frame, 4 bytes: `[0xA5, data_id, id, checksum]`.
//!
//! Over CAN the same payloads travel with the routing information packed
//! into the 29-bit extended identifier (see [`crate::common::can`]); the
//! frames themselves carry no checksum.

use super::{QueryFrame, SensorProtocol};
use crate::common::can::{
    encode_extended_id, CanFilter, CanFrame, CAN_PAYLOAD_LEN, PRIORITY_DEFAULT,
};
use crate::common::checksum::additive_checksum;
use crate::common::error::Error;
use crate::common::types::{Channel, DeviceConfig};
use log::debug;

/// Constant first byte of every frame.
pub const FRAME_HEADER: u8 = 0xA5;
/// Length of the UART data frame.
pub const DATA_FRAME_LEN: usize = 13;
/// Length of the UART query frame.
pub const QUERY_FRAME_LEN: usize = 4;
/// Payload offset inside the UART data frame.
const PAYLOAD_OFFSET: usize = 4;

/// Wire offset of the pack-current field: `0.1 A` steps around 30000.
pub const CURRENT_OFFSET: i32 = 30_000;
/// Wire offset of temperature fields, °C.
pub const TEMPERATURE_OFFSET: i32 = 40;

/// Data ids the BMS exposes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum DataId {
    /// SOC, total voltage, current.
    SocVoltageCurrent = 0x90,
    /// Maximum and minimum cell voltage.
    CellVoltageExtremes = 0x91,
    /// Maximum and minimum probe temperature.
    TemperatureExtremes = 0x92,
    /// Charge/discharge MOS status, BMS life, remaining capacity.
    MosStatus = 0x93,
    /// Status information 1.
    StatusInformation = 0x94,
    /// Per-cell voltages 1–48.
    CellVoltages = 0x95,
    /// Per-cell temperatures 1–16.
    CellTemperatures = 0x96,
    /// Per-cell balance states 1–48.
    CellBalanceStates = 0x97,
    /// Battery failure status.
    FailureStatus = 0x98,
}

/// Pack state as reported in the MOS status payload.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[repr(u8)]
pub enum BmsState {
    #[default]
    Stationary = 0,
    Charge = 1,
    Discharge = 2,
}

impl BmsState {
    fn from_wire(byte: u8) -> Self {
        match byte {
            1 => BmsState::Charge,
            2 => BmsState::Discharge,
            _ => BmsState::Stationary,
        }
    }
}

/// Latest validated measurement of one BMS instance.
///
/// Each data-id payload updates only its own fields; the rest keep their
/// previous values.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BmsMeasurement {
    /// Cumulative total voltage, 0.1 V.
    pub cumulative_voltage: u16,
    /// Gather total voltage, 0.1 V.
    pub gather_voltage: u16,
    /// Pack current as on the wire: 0.1 A with a 30000 offset.
    pub current_raw: u16,
    /// State of charge, 0.1 %.
    pub state_of_charge: u16,

    /// Maximum cell voltage, mV, and the cell reporting it.
    pub max_cell_voltage: u16,
    pub max_cell_number: u8,
    /// Minimum cell voltage, mV, and the cell reporting it.
    pub min_cell_voltage: u16,
    pub min_cell_number: u8,

    /// Probe temperatures as on the wire: °C with a 40 offset.
    pub max_temperature_raw: u8,
    pub max_temperature_probe: u8,
    pub min_temperature_raw: u8,
    pub min_temperature_probe: u8,

    pub state: BmsState,
    pub charge_mos_enabled: bool,
    pub discharge_mos_enabled: bool,
    /// BMS life, 0–255 cycles.
    pub bms_life: u8,
    /// Remaining capacity, mAh.
    pub remaining_capacity_mah: u32,
}

/// Marker type implementing [`SensorProtocol`] for the BMS family.
#[derive(Debug, Copy, Clone)]
pub struct DalyBms;

/// Maps a consumer channel onto the data id whose payload carries it.
pub fn data_id_for(channel: Channel) -> Result<DataId, Error> {
    match channel {
        Channel::StateOfCharge | Channel::CumulativeVoltage | Channel::Current => {
            Ok(DataId::SocVoltageCurrent)
        }
        Channel::MaxCellVoltage | Channel::MinCellVoltage => Ok(DataId::CellVoltageExtremes),
        Channel::MaxTemperature | Channel::MinTemperature => Ok(DataId::TemperatureExtremes),
        Channel::BatteryState | Channel::RemainingCapacity => Ok(DataId::MosStatus),
        other => Err(Error::UnsupportedChannel(other)),
    }
}

fn decode_payload(m: &mut BmsMeasurement, data_id: u8, payload: &[u8; CAN_PAYLOAD_LEN]) {
    match data_id {
        0x90 => {
            m.cumulative_voltage = u16::from_be_bytes([payload[0], payload[1]]);
            m.gather_voltage = u16::from_be_bytes([payload[2], payload[3]]);
            m.current_raw = u16::from_be_bytes([payload[4], payload[5]]);
            m.state_of_charge = u16::from_be_bytes([payload[6], payload[7]]);
        }
        0x91 => {
            m.max_cell_voltage = u16::from_be_bytes([payload[0], payload[1]]);
            m.max_cell_number = payload[2];
            m.min_cell_voltage = u16::from_be_bytes([payload[3], payload[4]]);
            m.min_cell_number = payload[5];
        }
        0x92 => {
            m.max_temperature_raw = payload[0];
            m.max_temperature_probe = payload[1];
            m.min_temperature_raw = payload[2];
            m.min_temperature_probe = payload[3];
        }
        0x93 => {
            m.state = BmsState::from_wire(payload[0]);
            m.charge_mos_enabled = payload[1] != 0;
            m.discharge_mos_enabled = payload[2] != 0;
            m.bms_life = payload[3];
            m.remaining_capacity_mah =
                u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
        }
        other => {
            debug!("ignoring payload for undecoded data id {:#04x}", other);
        }
    }
}

impl SensorProtocol for DalyBms {
    const HEADER: u8 = FRAME_HEADER;
    const DATA_FRAME_LEN: usize = DATA_FRAME_LEN;

    type Measurement = BmsMeasurement;

    fn supports(channel: Channel) -> bool {
        data_id_for(channel).is_ok()
    }

    fn build_query(cfg: &DeviceConfig, channel: Channel) -> Result<QueryFrame, Error> {
        let data_id = data_id_for(channel)?;

        let mut frame = QueryFrame::new();
        frame.push(FRAME_HEADER);
        frame.push(data_id as u8);
        frame.push(cfg.id);
        frame.push(0);
        let sum = additive_checksum(&frame);
        frame[QUERY_FRAME_LEN - 1] = sum;
        Ok(frame)
    }

    fn decode_frame(measurement: &mut BmsMeasurement, raw: &[u8]) {
        let mut payload = [0u8; CAN_PAYLOAD_LEN];
        payload.copy_from_slice(&raw[PAYLOAD_OFFSET..PAYLOAD_OFFSET + CAN_PAYLOAD_LEN]);
        decode_payload(measurement, raw[1], &payload);
    }

    fn read_channel(measurement: &BmsMeasurement, channel: Channel) -> Result<i32, Error> {
        match channel {
            Channel::StateOfCharge => Ok(i32::from(measurement.state_of_charge)),
            Channel::BatteryState => Ok(measurement.state as i32),
            Channel::CumulativeVoltage => Ok(i32::from(measurement.cumulative_voltage)),
            Channel::Current => Ok(i32::from(measurement.current_raw) - CURRENT_OFFSET),
            // Saturates for packs reporting more than i32::MAX mAh.
            Channel::RemainingCapacity => {
                Ok(i32::try_from(measurement.remaining_capacity_mah).unwrap_or(i32::MAX))
            }
            Channel::MaxCellVoltage => Ok(i32::from(measurement.max_cell_voltage)),
            Channel::MinCellVoltage => Ok(i32::from(measurement.min_cell_voltage)),
            Channel::MaxTemperature => {
                Ok(i32::from(measurement.max_temperature_raw) - TEMPERATURE_OFFSET)
            }
            Channel::MinTemperature => {
                Ok(i32::from(measurement.min_temperature_raw) - TEMPERATURE_OFFSET)
            }
            other => Err(Error::UnsupportedChannel(other)),
        }
    }

    fn rx_filter(cfg: &DeviceConfig) -> CanFilter {
        // Responses are addressed destination = host, origin = device; the
        // data-id byte and priority stay unmasked so every answer passes.
        CanFilter {
            id: encode_extended_id(PRIORITY_DEFAULT, 0x00, cfg.host_id, cfg.id),
            mask: 0x0000_FFFF,
            extended: true,
        }
    }

    fn build_can_query(cfg: &DeviceConfig, channel: Channel) -> Result<CanFrame, Error> {
        let data_id = data_id_for(channel)?;
        let id = encode_extended_id(PRIORITY_DEFAULT, data_id as u8, cfg.id, cfg.host_id);
        Ok(CanFrame::new(id, true, [0u8; CAN_PAYLOAD_LEN]))
    }

    fn can_data_id(id: u32) -> u8 {
        crate::common::can::data_id_of(id)
    }

    fn decode_can_payload(
        measurement: &mut BmsMeasurement,
        data_id: u8,
        payload: &[u8; CAN_PAYLOAD_LEN],
    ) {
        decode_payload(measurement, data_id, payload);
    }
}
