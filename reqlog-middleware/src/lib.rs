pub mod app;
pub mod capture;
pub mod environ;
pub mod format;
pub mod id;
pub mod logger;

pub use app::{Application, BodyWriter, ChunkedBody, Header, ResponseBody, StartResponse, collect_body};
pub use capture::{CapturedResponse, CloseGuard, ResponseCapture, START_RESPONSE_NOT_CALLED};
pub use environ::{EnvValue, Environ, REQLOG_ID, REQLOG_REQUEST_BEGIN, ServerInfo};
pub use format::{Elapsed, TRUNCATION_MARKER};
pub use id::{CorrelationId, IdGenerator, RandomIdGenerator};
pub use logger::{RequestContext, ResponseLogger, ResponseLoggerBuilder, make_middleware};
