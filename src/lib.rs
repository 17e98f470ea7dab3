mod capabilities;
mod catalog;
mod client;
mod codec;
mod command;
mod diff;
mod error;
mod model;
mod protocol;
mod range;
mod store;
mod types;

pub use capabilities::{Capabilities, TemperatureRange};
pub use catalog::{CapabilityFlag, Category};
pub use client::{MelviewClient, MelviewClientBuilder, Unit};
pub use codec::{decode, encode};
pub use command::{Command, EncodeContext, Property, build_delta, normalize, plan_commands};
pub use error::{Error, Result};
pub use model::{CategoryModel, UnitModel};
pub use protocol::Session;
pub use range::{apply_offset, clamp, strip_offset};
pub use store::{FileStore, SNAPSHOT_VERSION, Snapshot, StateStore};
pub use types::*;
