//! Application core: pure domain logic, zero direct I/O.
//!
//! This module holds the greenhouse business rules: the wake-cycle
//! coordinator and the irrigation decision.  All interaction with
//! hardware and the network happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod decision;
pub mod events;
pub mod ports;
pub mod service;
