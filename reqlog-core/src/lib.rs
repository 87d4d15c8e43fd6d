pub mod config;
pub mod error;
pub mod sink;
pub mod size;

pub use config::{LoggerSettings, ResponseLoggerConfig};
pub use error::{ConfigError, ReqlogError};
pub use sink::{LogSink, LogSinkConfig, MemorySink};
pub use size::{SizeLimit, SuffixMultiplier, byte_size, parse_byte_size};
