//! # Link Budget Module
//!
//! RF link-budget analysis between the fixed receiver and the transmitter.
//!
//! This module handles:
//! - Great-circle distance between receiver and transmitter (Haversine)
//! - Free-space path loss and theoretical received power
//! - Link margin against receiver sensitivity and its qualitative rating
//! - Receiver location, including the default-location fallback

pub mod geodesy;
pub mod budget;
pub mod receiver;

pub use budget::{compute, LinkBudgetResult, LinkParameters, MarginQuality};
pub use geodesy::haversine_km;
pub use receiver::{GeoFix, ReceiverLocation};
