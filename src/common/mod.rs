// src/common/mod.rs

// --- Protocol-neutral building blocks ---
pub mod can;
pub mod checksum;
pub mod error;
pub mod hal_traits;
pub mod sync;
pub mod types;

// --- Re-export key types/traits/functions for easier access ---

// From checksum.rs
pub use checksum::{additive_checksum, verify_frame};

// From error.rs
pub use error::Error;

// From types.rs
pub use types::{Channel, DeviceConfig, OperatingMode};

// From hal_traits.rs
pub use hal_traits::{CanBus, SerialTx};

// From can.rs
pub use can::{CanFilter, CanFrame, CAN_PAYLOAD_LEN};

// From sync.rs
pub use sync::{FrameSynchronizer, MAX_DATA_FRAME_LEN};
