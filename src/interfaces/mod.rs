//! Delivery mechanisms: the OCPP 2.0.1 message adapter.

pub mod ocpp;

pub use ocpp::OcppSmartCharging;
