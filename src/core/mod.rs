pub mod batch;
pub mod destination;
pub mod etl;
pub mod extension;
pub mod mapper;
pub mod xml_tree;

pub use crate::domain::model::{BatchReport, Reservation};
pub use crate::domain::ports::BlobStore;
pub use crate::utils::error::Result;
