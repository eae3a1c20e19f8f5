mod backend;
mod backends;
pub mod blob;
mod color;
pub mod merge;
mod result;
pub mod segment;

pub use backend::DetectorBackend;
pub use backends::{HsvBlobDetector, ScriptedBackend};
pub use blob::BlobFilter;
pub use color::{ColorClass, ColorProfile, HsvRange};
pub use merge::{merge_nearby, DEFAULT_MERGE_RADIUS};
pub use result::Detection;
