//! Machine state classification and stop interval detection.

mod classifier;
mod stops;

pub use classifier::StateClassifier;
pub use stops::StopDetector;
