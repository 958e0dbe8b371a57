// src/common/can.rs

//! CAN frame, filter, and identifier helpers.
//!
//! The BMS family embeds routing information in a 29-bit extended
//! identifier:
//!
//! ```text
//! bits | 28 - 24  | 23 - 16 | 15 - 8      | 7 - 0  |
//!      | priority | data id | destination | origin |
//! ```
//!
//! The ToF family uses plain standard identifiers (receive id `0x200 + id`).

/// Fixed CAN payload length used by both sensor families.
pub const CAN_PAYLOAD_LEN: usize = 8;

/// Default value of the BMS priority field. The priority occupies the top
/// five identifier bits, so it can never exceed `0x1F`.
pub const PRIORITY_DEFAULT: u8 = 0x18;

const PRIORITY_MASK: u32 = 0x1F;

/// A bus frame as handed to / received from the controller.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CanFrame {
    /// Raw identifier; 11 bits when `extended` is false, 29 bits otherwise.
    pub id: u32,
    /// Extended (29-bit) identifier flag.
    pub extended: bool,
    /// Number of valid payload bytes.
    pub dlc: u8,
    pub data: [u8; CAN_PAYLOAD_LEN],
}

impl CanFrame {
    /// Builds a frame carrying the full 8-byte payload.
    pub fn new(id: u32, extended: bool, data: [u8; CAN_PAYLOAD_LEN]) -> Self {
        CanFrame { id, extended, dlc: CAN_PAYLOAD_LEN as u8, data }
    }
}

/// An acceptance filter: a frame is delivered iff
/// `frame.id & mask == id & mask` and the extended flags agree.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CanFilter {
    pub id: u32,
    pub mask: u32,
    pub extended: bool,
}

impl CanFilter {
    /// Whether a received identifier passes this filter.
    pub fn matches(&self, id: u32, extended: bool) -> bool {
        extended == self.extended && (id & self.mask) == (self.id & self.mask)
    }
}

/// Packs the BMS composite extended identifier.
///
/// The priority field is truncated to its five identifier bits, keeping the
/// result inside the 29-bit extended range.
pub const fn encode_extended_id(priority: u8, data_id: u8, destination: u8, origin: u8) -> u32 {
    ((priority as u32 & PRIORITY_MASK) << 24)
        | ((data_id as u32 & 0xFF) << 16)
        | ((destination as u32 & 0xFF) << 8)
        | (origin as u32 & 0xFF)
}

/// Extracts the data-id byte from a composite extended identifier.
pub const fn data_id_of(id: u32) -> u8 {
    ((id >> 16) & 0xFF) as u8
}

/// Extracts the destination address from a composite extended identifier.
pub const fn destination_of(id: u32) -> u8 {
    ((id >> 8) & 0xFF) as u8
}

/// Extracts the origin address from a composite extended identifier.
pub const fn origin_of(id: u32) -> u8 {
    (id & 0xFF) as u8
}
