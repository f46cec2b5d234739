pub mod scanner;
pub mod telemetry;

pub use scanner::{discover, MatchCriteria};
pub use telemetry::{connect, heart_rate_characteristic, stream_heart_rate};
