//! # garmin-sync
//!
//! Everything that happens after login: the authenticated Connect API
//! client, the fixed catalog of daily endpoints, profile and device
//! discovery, the poller that mirrors payloads into the state tree, and the
//! [`Adapter`] that ties them to the host lifecycle.

pub mod adapter;
pub mod client;
pub mod devices;
pub mod endpoints;
pub mod poller;
pub mod profile;

pub use adapter::{Adapter, StateAction};
pub use client::ConnectClient;
pub use devices::DeviceRegistry;
pub use poller::{PollReport, Poller};
