//! # Link Budget Monitor Library
//!
//! Real-time RF link budget analysis from serial telemetry.
//!
//! This library provides the core of the monitor: a reader task that pulls
//! `timestamp,lat,lon,alt,rssi,snr` records off a serial port, a consumer that
//! keeps a bounded history of samples, and a calculator that derives distance,
//! free-space path loss, theoretical received power and link margin relative
//! to a fixed receiver.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod link;
pub mod serial;
pub mod telemetry;
