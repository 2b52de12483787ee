pub mod studio;

pub use studio::{SaveImagesRequest, StudioHandler};
