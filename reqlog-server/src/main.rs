// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  reqlog: request/response logging middleware
//
//  check:  validate a logger config and print the parsed settings
//  probe:  push one synthetic request through the logger
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use reqlog_core::config::ResponseLoggerConfig;
use reqlog_middleware::{
    Application, BodyWriter, ChunkedBody, Environ, Header, ResponseBody, ServerInfo,
    StartResponse, collect_body, make_middleware,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "reqlog", version, about = "Request/response logging middleware")]
struct Cli {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a config file and print the resolved settings
    Check {
        /// Path to the logger config (YAML or TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Print settings as JSON
        #[arg(long)]
        json: bool,
    },
    /// Send one request through the logger to an echo application
    Probe {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(long, default_value = "/")]
        path: String,

        #[arg(long, default_value = "GET")]
        method: String,

        /// Request body, echoed back as the response body
        #[arg(long, default_value = "")]
        body: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Tracing ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Command::Check { config, json } => check(&config, json),
        Command::Probe {
            config,
            path,
            method,
            body,
        } => probe(&config, &path, &method, body),
    }
}

fn load(path: &Path) -> anyhow::Result<ResponseLoggerConfig> {
    info!(path = %path.display(), "Loading config file");
    ResponseLoggerConfig::load(path)
        .with_context(|| format!("failed to load config {}", path.display()))
}

fn check(path: &Path, json: bool) -> anyhow::Result<()> {
    let settings = load(path)?.resolve()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        println!("filename:     {}", settings.sink.path.display());
        println!("body limit:   {}", settings.body_limit);
        println!("max logsize:  {} bytes", settings.sink.max_bytes);
        println!("backup count: {}", settings.sink.backup_count);
        println!(
            "rotation:     {}",
            if settings.sink.rotation_enabled() { "enabled" } else { "disabled" }
        );
    }
    Ok(())
}

fn probe(path: &Path, uri: &str, method: &str, body: String) -> anyhow::Result<()> {
    let config = load(path)?;
    let app = make_middleware(EchoApp, &config)?;

    let request = http::Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Length", body.len().to_string())
        .body(Bytes::from(body))
        .context("invalid probe request")?;

    let mut environ = Environ::from_request(&request, &ServerInfo::default());
    environ.insert(ECHO_BODY, String::from_utf8_lossy(request.body()).into_owned());

    let mut response = ServerResponse::default();
    let returned = app.call(&mut environ, &mut response)?;
    let mut bytes = std::mem::take(&mut response.written);
    bytes.extend(collect_body(returned, &mut response)?);

    info!(
        status = %response.status,
        bodylen = bytes.len(),
        log = %config.filename.display(),
        "Probe finished"
    );
    println!("{}", response.status);
    for (name, value) in &response.headers {
        println!("{name}: {value}");
    }
    println!("bodylen: {}", bytes.len());
    println!();
    println!("{}", String::from_utf8_lossy(&bytes));
    Ok(())
}

// ── Probe plumbing ──

const ECHO_BODY: &str = "probe.body";

/// Replies with the request body.
struct EchoApp;

impl Application for EchoApp {
    fn call(
        &self,
        environ: &mut Environ,
        start_response: &mut dyn StartResponse,
    ) -> anyhow::Result<Box<dyn ResponseBody>> {
        let body = environ.get_str(ECHO_BODY).unwrap_or_default().to_string();
        let headers = vec![
            ("Content-Type".to_string(), "text/plain".to_string()),
            ("Content-Length".to_string(), body.len().to_string()),
        ];
        start_response.start_response("200 OK", &headers, None);
        Ok(Box::new(ChunkedBody::single(body)))
    }
}

/// What a real server would put on the wire.
#[derive(Default)]
struct ServerResponse {
    status: String,
    headers: Vec<Header>,
    written: Vec<u8>,
}

impl StartResponse for ServerResponse {
    fn start_response(
        &mut self,
        status: &str,
        headers: &[Header],
        _exc_info: Option<&anyhow::Error>,
    ) -> &mut dyn BodyWriter {
        self.status = status.to_string();
        self.headers = headers.to_vec();
        self
    }
}

impl BodyWriter for ServerResponse {
    fn write(&mut self, chunk: &[u8]) {
        self.written.extend_from_slice(chunk);
    }
}
