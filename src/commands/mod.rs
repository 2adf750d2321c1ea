//! IPC command wrappers, one module per screen area.
//!
//! Commands stay thin: parse the payload into a typed DTO, call the domain
//! module, stringify errors at the boundary.

pub mod auth;
pub mod cake_orders;
pub mod customers;
pub mod pos;
pub mod products;
pub mod reports;
pub mod settings;
pub mod shifts;
