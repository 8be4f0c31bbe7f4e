pub mod client;
pub mod error;
pub mod fetcher;
pub mod mapper;
pub mod models;
pub mod params;

pub use crate::client::{HttpLimsService, LimsConfig, LimsService};
pub use crate::fetcher::{derive_run_summary, FlowcellFetcher};
pub use crate::models::{ProcessQuery, SequencingProcess};
pub use crate::params::FlowcellName;
