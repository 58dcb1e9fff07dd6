//! Fixed GATT layout of the Reverb radio bridge.
//!
//! | Characteristic | UUID                                   | Perms        |
//! |----------------|----------------------------------------|--------------|
//! | Sensor         | `19b10001-e8f2-537e-4f6c-d104768a1214` | Read+Notify  |
//! | LED / command  | `19b10002-e8f2-537e-4f6c-d104768a1214` | Write        |

pub const SERVICE_UUID: u128 = 0x19b10000_e8f2_537e_4f6c_d104768a1214;
pub const CHAR_SENSOR: u128 = 0x19b10001_e8f2_537e_4f6c_d104768a1214;
pub const CHAR_COMMAND: u128 = 0x19b10002_e8f2_537e_4f6c_d104768a1214;

/// Advertised name the firmware ships with.
pub const DEFAULT_DEVICE_NAME: &str = "ESP32";
