//! Shared data structures for plant machine monitoring
//!
//! - `Reading`: one meter sample for one machine
//! - `MachineState`: derived running / stopped / disconnected state
//! - `StopInterval`: a measured stop, closed or still open
//! - `AnomalyEvent`: an out-of-band consumption reading
//! - `AlertFingerprint` / `AlertPayload`: alert identity and rendered content

mod reading;
mod machine;
mod stops;
mod anomaly;
mod alert;

pub use reading::*;
pub use machine::*;
pub use stops::*;
pub use anomaly::*;
pub use alert::*;
