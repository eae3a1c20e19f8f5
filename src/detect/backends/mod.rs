pub mod hsv;
pub mod scripted;

pub use hsv::HsvBlobDetector;
pub use scripted::ScriptedBackend;
