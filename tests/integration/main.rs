//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the simulated bridge and in-memory stores.  All tests run on
//! the host with no Bluetooth hardware required.

mod persistence_tests;
mod runtime_tests;
mod transmit_tests;
