pub mod api;
pub mod models;

pub use models::{Comment, Coordinates, Marker, MarkerStatus, User};
