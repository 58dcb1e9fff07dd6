//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements         | Connects to                 |
//! |-----------------|--------------------|-----------------------------|
//! | `blob_store`    | StoragePort        | in-memory map / directory   |
//! |                 | ConfigPort         | postcard blob in same store |
//! | `location`      | LocationSource     | fixed position / none       |
//! | `log_sink`      | EventSink          | `log` facade                |
//! | `sim_transport` | DeviceTransport    | in-process simulated bridge |
//! | `time`          | (none)             | system wall clock           |

pub mod blob_store;
pub mod location;
pub mod log_sink;
pub mod sim_transport;
pub mod time;
