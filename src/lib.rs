mod client;
mod command;
mod coordinator;
mod error;
mod legacy;
mod logger;
mod merge;
mod status;
mod transport;
mod types;

pub use client::{BiostarClient, BiostarClientBuilder, RefreshData};
pub use coordinator::{UpdateCoordinator, UpdateCoordinatorBuilder};
pub use error::{Error, Result};
pub use logger::TrafficLogMode;
pub use types::*;
