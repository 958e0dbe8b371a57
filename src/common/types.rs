// src/common/types.rs

use core::time::Duration;

/// Measurement channels exposed across both sensor families.
///
/// Each family supports a subset; requesting a channel the bound family does
/// not expose yields [`Error::UnsupportedChannel`](super::error::Error).
/// `get` returns the channel value as an `i32` in the unit noted below.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Channel {
    /// Measured distance, millimeters (ToF).
    Distance,
    /// Distance validity status as reported by the module; 0 means the
    /// distance reading is usable (ToF).
    DistanceStatus,
    /// Signal strength, raw module units (ToF).
    SignalStrength,
    /// Module-local timestamp of the last frame, milliseconds, saturating
    /// at `i32::MAX` (ToF).
    SystemTime,
    /// State of charge, 0.1 % steps (BMS).
    StateOfCharge,
    /// Pack state: 0 stationary, 1 charging, 2 discharging (BMS).
    BatteryState,
    /// Cumulative total voltage, 0.1 V steps (BMS).
    CumulativeVoltage,
    /// Pack current, 0.1 A steps, signed after removing the wire offset
    /// (BMS).
    Current,
    /// Remaining capacity, mAh, saturating at `i32::MAX` (BMS).
    RemainingCapacity,
    /// Highest cell voltage, mV (BMS).
    MaxCellVoltage,
    /// Lowest cell voltage, mV (BMS).
    MinCellVoltage,
    /// Highest probe temperature, °C after removing the wire offset (BMS).
    MaxTemperature,
    /// Lowest probe temperature, °C after removing the wire offset (BMS).
    MinTemperature,
}

/// Protocol variant: does the host pull each measurement, or does the sensor
/// push autonomously?
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum OperatingMode {
    /// The sensor pushes measurements at its configured rate; `fetch` only
    /// waits for the next frame to land.
    #[default]
    Active,
    /// The host transmits a request frame before waiting for the response.
    Query,
}

/// Per-instance device context. Immutable after construction; every
/// operation takes it by reference. One record per configured sensor, no
/// process-wide singletons.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Sensor/module identifier on the bus (0–255 for both families).
    pub id: u8,
    /// Host identifier used as the origin address when requesting data over
    /// CAN. The BMS convention for "PC address" is 0x40.
    pub host_id: u8,
    /// Query vs. active protocol variant.
    pub mode: OperatingMode,
    /// How long `fetch` waits for a qualifying frame before reporting
    /// [`Error::NoData`](super::error::Error::NoData).
    pub timeout: Duration,
}

impl DeviceConfig {
    /// Default host address used by the BMS protocol for an upstream PC.
    pub const DEFAULT_HOST_ID: u8 = 0x40;

    /// Default fetch timeout: one period of the ToF module's factory 30 Hz
    /// active-mode output rate, rounded up.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000 / 30 + 1);

    /// Creates a config for the given module id with the default host id,
    /// active mode, and default timeout.
    pub fn new(id: u8) -> Self {
        DeviceConfig {
            id,
            host_id: Self::DEFAULT_HOST_ID,
            mode: OperatingMode::default(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_mode(mut self, mode: OperatingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_host_id(mut self, host_id: u8) -> Self {
        self.host_id = host_id;
        self
    }
}
