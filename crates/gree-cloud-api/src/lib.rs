// gree-cloud-api: contracts for the Gree cloud collaborators
//
// The cloud login/registry protocol, the broker wire format, and device
// payload encoding live in the vendor SDK. This crate pins down the
// surface the rest of the workspace is written against.

pub mod auth;
pub mod cloud;
pub mod device;
pub mod error;
pub mod mqtt;

pub use auth::{Credentials, GreeServer};
pub use cloud::{CloudApi, CloudDeviceInfo};
pub use device::{CipherVersion, Device, DeviceFactory, DeviceInfo, RawProperties, props};
pub use error::Error;
pub use mqtt::MqttSession;
