//! HTTP surface for the monitoring daemon.
//!
//! Deliberately small: a raw `TcpListener`, hand-parsed requests, one
//! thread per connection. Stream connections are long-lived (one
//! orchestrator loop per viewer, cancelled by the client disconnecting);
//! everything else is request/response.
//!
//! Routes:
//! - `GET /health`         liveness probe
//! - `GET /stream`         multipart MJPEG stream (`boundary=frame`)
//! - `GET /api/stats`      latest stats snapshot + recent incidents
//! - `POST /api/monitor`   `{"action":"start"|"stop"}` toggles monitoring
//!
//! Authentication/session handling belongs to the outer web layer, not
//! this core.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::alert::{AlertManager, SharedIncidentStore};
use crate::classify::{Classifier, FrameStats, PpeConfig};
use crate::config::DetectorSettings;
use crate::frame::FrameSlot;
use crate::store::{Incident, IncidentStore};
use crate::stream::{MonitorState, StreamOrchestrator};

const MAX_REQUEST_BYTES: usize = 8192;
/// Pacing between multipart frames, bounding re-encode cost when the
/// producer is slower than the stream loop.
const STREAM_FRAME_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    /// How many incidents the stats endpoint returns.
    pub recent_incidents: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:5000".to_string(),
            recent_incidents: 5,
        }
    }
}

/// Everything a connection needs, shared across all connection threads.
#[derive(Clone)]
pub struct ApiContext {
    pub slot: Arc<FrameSlot>,
    pub state: Arc<MonitorState>,
    pub alerts: Arc<Mutex<AlertManager>>,
    pub store: SharedIncidentStore,
    pub detector: DetectorSettings,
    pub zone_fraction: f32,
    pub ppe: PpeConfig,
}

impl ApiContext {
    /// Fresh orchestrator for one stream viewer. Each viewer runs its own
    /// classifier; the alert manager (and so the cooldown) stays global.
    fn new_orchestrator(&self) -> Result<StreamOrchestrator> {
        let backend = crate::detect::build_backend(&self.detector)?;
        let classifier = Classifier::new(backend, self.zone_fraction, self.ppe.clone());
        Ok(StreamOrchestrator::new(
            self.slot.clone(),
            self.state.clone(),
            classifier,
            self.alerts.clone(),
        ))
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    ctx: ApiContext,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, ctx: ApiContext) -> Self {
        Self { cfg, ctx }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let cfg = self.cfg.clone();
        let ctx = self.ctx.clone();
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, cfg, ctx, shutdown_thread) {
                log::error!("api server stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    cfg: ApiConfig,
    ctx: ApiContext,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                log::debug!("connection from {}", peer);
                let cfg = cfg.clone();
                let ctx = ctx.clone();
                // One thread per connection; stream viewers hold theirs
                // until they disconnect.
                std::thread::spawn(move || {
                    if let Err(err) = handle_connection(stream, &cfg, &ctx) {
                        log::debug!("connection {} ended: {:#}", peer, err);
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, cfg: &ApiConfig, ctx: &ApiContext) -> Result<()> {
    let request = read_request(&mut stream)?;
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        ("GET", "/stream") => serve_stream(stream, ctx),
        ("GET", "/api/stats") => serve_stats(&mut stream, cfg, ctx),
        ("POST", "/api/monitor") => serve_monitor_toggle(&mut stream, ctx, &request.body),
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

// ----------------------------------------------------------------------------
// Route handlers
// ----------------------------------------------------------------------------

/// Unbounded multipart JPEG sequence, one part per orchestrator iteration,
/// until the viewer's transport closes.
fn serve_stream(mut stream: TcpStream, ctx: &ApiContext) -> Result<()> {
    let mut orchestrator = match ctx.new_orchestrator() {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            write_json_response(&mut stream, 500, r#"{"error":"detector_unavailable"}"#)?;
            return Err(err);
        }
    };

    stream.set_read_timeout(None)?;
    stream.write_all(
        b"HTTP/1.1 200 OK\r\n\
          Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\
          Cache-Control: no-store\r\n\r\n",
    )?;

    loop {
        let jpeg = orchestrator.next_jpeg()?;
        let header = format!(
            "--frame\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            jpeg.len()
        );
        // A failed write means the viewer went away; that is the loop's
        // only exit.
        if stream.write_all(header.as_bytes()).is_err()
            || stream.write_all(&jpeg).is_err()
            || stream.write_all(b"\r\n\r\n").is_err()
        {
            break;
        }
        std::thread::sleep(STREAM_FRAME_INTERVAL);
    }
    Ok(())
}

#[derive(Serialize)]
struct StatsResponse {
    total_persons: u32,
    violations: u32,
    alerts: Vec<String>,
    recent_incidents: Vec<Incident>,
}

fn serve_stats(stream: &mut TcpStream, cfg: &ApiConfig, ctx: &ApiContext) -> Result<()> {
    let FrameStats {
        total_persons,
        violations,
        alerts,
        ..
    } = ctx.state.stats_snapshot();

    let recent_incidents = {
        let mut store = ctx.store.lock().unwrap_or_else(|e| e.into_inner());
        match store.recent(cfg.recent_incidents) {
            Ok(incidents) => incidents,
            Err(err) => {
                log::warn!("failed to read recent incidents: {:#}", err);
                Vec::new()
            }
        }
    };

    let payload = serde_json::to_vec(&StatsResponse {
        total_persons,
        violations,
        alerts,
        recent_incidents,
    })?;
    write_response(stream, 200, "application/json", &payload)
}

#[derive(Deserialize)]
struct MonitorDirective {
    action: Option<String>,
}

fn serve_monitor_toggle(stream: &mut TcpStream, ctx: &ApiContext, body: &[u8]) -> Result<()> {
    let directive: MonitorDirective = match serde_json::from_slice(body) {
        Ok(directive) => directive,
        Err(_) => MonitorDirective { action: None },
    };

    // Unrecognized directives leave the state unchanged; the caller gets
    // the resulting (unchanged) state rather than an error.
    match directive.action.as_deref() {
        Some("start") => {
            ctx.state.set_active(true);
            log::info!("monitoring started via api");
        }
        Some("stop") => {
            ctx.state.set_active(false);
            log::info!("monitoring paused via api");
        }
        other => {
            log::debug!("ignoring monitor directive {:?}", other);
        }
    }

    let body = format!(
        r#"{{"status":"ok","active":{}}}"#,
        ctx.state.is_active()
    );
    write_json_response(stream, 200, &body)
}

// ----------------------------------------------------------------------------
// Minimal HTTP plumbing
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    let header_end = loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break find_header_end(&data).ok_or_else(|| anyhow!("truncated request"))?;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if let Some(end) = find_header_end(&data) {
            break end;
        }
    };

    let request = parse_request(&data[..header_end])?;
    let content_length = request
        .headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    if content_length > MAX_REQUEST_BYTES {
        return Err(anyhow!("request body too large"));
    }

    let mut body = data[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    Ok(HttpRequest { body, ..request })
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn parse_request(head: &[u8]) -> Result<HttpRequest> {
    let text = String::from_utf8_lossy(head);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        headers,
        body: Vec::new(),
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line_and_headers() -> Result<()> {
        let head = b"POST /api/monitor HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 20\r\n";
        let request = parse_request(head)?;
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/api/monitor");
        assert_eq!(
            request.headers.get("content-length").map(String::as_str),
            Some("20")
        );
        Ok(())
    }

    #[test]
    fn query_string_is_stripped_from_path() -> Result<()> {
        let request = parse_request(b"GET /stream?viewer=1 HTTP/1.1\r\n")?;
        assert_eq!(request.path, "/stream");
        Ok(())
    }

    #[test]
    fn header_end_detection() {
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n\r\nrest"), Some(18));
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n"), None);
    }
}
