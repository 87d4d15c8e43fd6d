//! The response logging middleware.
//!
//! ```text
//! caller ──▶ ResponseLogger::call
//!              ├─ attach reqlog.id / reqlog.request_begin
//!              ├─ write REQUEST entry
//!              ├─ app.call(environ, capture)
//!              ├─ drain body into capture, close body
//!              ├─ write RESPONSE entry
//!              └─ return body as one chunk
//! ```

use crate::app::{Application, ChunkedBody, ResponseBody, StartResponse};
use crate::capture::{CloseGuard, ResponseCapture};
use crate::environ::{EnvValue, Environ, REQLOG_ID, REQLOG_REQUEST_BEGIN};
use crate::format::{self, Elapsed, ResponseRecord};
use crate::id::{CorrelationId, IdGenerator, RandomIdGenerator};
use reqlog_core::config::ResponseLoggerConfig;
use reqlog_core::error::ReqlogError;
use reqlog_core::sink::LogSink;
use reqlog_core::size::SizeLimit;
use reqlog_observability::RotatingFileWriter;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-call bookkeeping, attached to the environ so downstream code sees it.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    pub id: CorrelationId,
    pub started_at: f64,
}

impl RequestContext {
    pub fn begin(id: CorrelationId) -> Self {
        Self {
            id,
            started_at: format::unix_now(),
        }
    }

    pub fn attach(&self, environ: &mut Environ) {
        environ.insert(REQLOG_ID, self.id.get());
        environ.insert(REQLOG_REQUEST_BEGIN, self.started_at);
    }

    /// Time since the start recorded in `environ`, if it is still there.
    pub fn elapsed(environ: &Environ) -> Elapsed {
        match environ.get(REQLOG_REQUEST_BEGIN).and_then(EnvValue::as_f64) {
            Some(start) => Elapsed::Seconds((format::unix_now() - start).max(0.0)),
            None => Elapsed::Unknown,
        }
    }
}

/// Wraps an application and logs every request/response pair it serves.
pub struct ResponseLogger<A> {
    app: A,
    sink: Arc<dyn LogSink>,
    ids: Arc<dyn IdGenerator>,
    body_limit: SizeLimit,
}

impl<A: Application> ResponseLogger<A> {
    pub fn new(app: A, sink: Arc<dyn LogSink>, body_limit: SizeLimit) -> Self {
        Self {
            app,
            sink,
            ids: Arc::new(RandomIdGenerator),
            body_limit,
        }
    }

    pub fn builder(app: A, sink: Arc<dyn LogSink>) -> ResponseLoggerBuilder<A> {
        ResponseLoggerBuilder {
            app,
            sink,
            ids: None,
            body_limit: SizeLimit::UNLIMITED,
        }
    }

    pub fn inner(&self) -> &A {
        &self.app
    }

    pub fn body_limit(&self) -> SizeLimit {
        self.body_limit
    }

    fn emit(&self, id: CorrelationId, entry: &str) {
        if let Err(e) = self.sink.write_entry(entry) {
            warn!(request_id = %id, error = %e, "Failed to write response log entry");
        }
    }
}

impl<A: Application> Application for ResponseLogger<A> {
    fn call(
        &self,
        environ: &mut Environ,
        start_response: &mut dyn StartResponse,
    ) -> anyhow::Result<Box<dyn ResponseBody>> {
        let ctx = RequestContext::begin(self.ids.next_id());
        ctx.attach(environ);

        self.emit(ctx.id, &format::request_entry(ctx.id, &format::ctime_now(), environ));

        let mut capture = ResponseCapture::new(start_response);
        let body = match self.app.call(environ, &mut capture) {
            Ok(body) => body,
            Err(e) => {
                debug!(request_id = %ctx.id, error = %e, "Application failed before producing a body");
                return Err(e);
            }
        };

        {
            let mut guard = CloseGuard::new(body);
            while let Some(chunk) = guard.next_chunk(&mut capture) {
                match chunk {
                    Ok(bytes) => capture.push(&bytes),
                    Err(e) => {
                        debug!(request_id = %ctx.id, error = %e, "Application failed while streaming");
                        return Err(e);
                    }
                }
            }
        }

        let captured = capture.finish();
        if !captured.started {
            warn!(request_id = %ctx.id, "Application never called start_response");
        }

        let at = format::ctime_now();
        let record = ResponseRecord {
            id: ctx.id,
            at: &at,
            elapsed: RequestContext::elapsed(environ),
            status: &captured.status,
            headers: &captured.headers,
            body: &captured.body,
        };
        self.emit(ctx.id, &format::response_entry(&record, self.body_limit));

        debug!(
            request_id = %ctx.id,
            status = %captured.status,
            bodylen = captured.body.len(),
            "Logged response"
        );

        Ok(Box::new(ChunkedBody::single(captured.body)))
    }
}

/// Builder for [`ResponseLogger`] with injectable collaborators.
pub struct ResponseLoggerBuilder<A> {
    app: A,
    sink: Arc<dyn LogSink>,
    ids: Option<Arc<dyn IdGenerator>>,
    body_limit: SizeLimit,
}

impl<A: Application> ResponseLoggerBuilder<A> {
    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    pub fn body_limit(mut self, limit: SizeLimit) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn build(self) -> ResponseLogger<A> {
        ResponseLogger {
            app: self.app,
            sink: self.sink,
            ids: self.ids.unwrap_or_else(|| Arc::new(RandomIdGenerator)),
            body_limit: self.body_limit,
        }
    }
}

/// Wrap `app` with a logger writing to the rotating file described by
/// `config`.
pub fn make_middleware<A: Application>(
    app: A,
    config: &ResponseLoggerConfig,
) -> Result<ResponseLogger<A>, ReqlogError> {
    let settings = config.resolve()?;
    let writer = RotatingFileWriter::new(settings.sink)?;
    Ok(ResponseLogger::new(app, Arc::new(writer), settings.body_limit))
}
