//! HTTP surface tests against a real listener on an ephemeral port.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use safeguard_vision::{
    api::{ApiConfig, ApiContext, ApiHandle, ApiServer},
    AlertManager, DetectorSettings, Frame, FrameSlot, FrameStats, Incident, IncidentStore,
    InMemoryIncidentStore, MonitorState, PpeConfig, SharedIncidentStore, DEFAULT_ZONE_FRACTION,
};

fn spawn_server(active: bool) -> Result<(ApiHandle, Arc<MonitorState>, SharedIncidentStore)> {
    let slot = Arc::new(FrameSlot::new());
    slot.publish(Frame::black(64, 64, 1));
    let state = MonitorState::new(active);
    let store: SharedIncidentStore = Arc::new(Mutex::new(InMemoryIncidentStore::new()));
    let dir = tempfile::tempdir()?.keep();
    let alerts = Arc::new(Mutex::new(AlertManager::new(
        store.clone(),
        &dir,
        Duration::from_secs(30),
    )?));

    let handle = ApiServer::new(
        ApiConfig {
            addr: "127.0.0.1:0".to_string(),
            ..ApiConfig::default()
        },
        ApiContext {
            slot,
            state: state.clone(),
            alerts,
            store: store.clone(),
            detector: DetectorSettings::default(),
            zone_fraction: DEFAULT_ZONE_FRACTION,
            ppe: PpeConfig::default(),
        },
    )
    .spawn()?;
    Ok((handle, state, store))
}

fn request(addr: std::net::SocketAddr, raw: &str) -> Result<(String, String)> {
    let mut stream = TcpStream::connect(addr)?;
    stream.write_all(raw.as_bytes())?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    let mut parts = response.splitn(2, "\r\n\r\n");
    let head = parts.next().unwrap_or_default().to_string();
    let body = parts.next().unwrap_or_default().to_string();
    Ok((head, body))
}

#[test]
fn health_endpoint_responds() -> Result<()> {
    let (handle, _state, _store) = spawn_server(true)?;
    let (head, body) = request(handle.addr, "GET /health HTTP/1.1\r\n\r\n")?;
    assert!(head.starts_with("HTTP/1.1 200"), "head: {}", head);
    assert_eq!(body, r#"{"status":"ok"}"#);
    handle.stop()
}

#[test]
fn unknown_route_is_404() -> Result<()> {
    let (handle, _state, _store) = spawn_server(true)?;
    let (head, _) = request(handle.addr, "GET /nope HTTP/1.1\r\n\r\n")?;
    assert!(head.starts_with("HTTP/1.1 404"), "head: {}", head);
    handle.stop()
}

#[test]
fn stats_reports_snapshot_and_recent_incidents() -> Result<()> {
    let (handle, state, store) = spawn_server(true)?;
    state.publish_stats(FrameStats {
        total_persons: 3,
        violations: 1,
        alerts: vec!["Peligro: SIN CASCO".to_string()],
        violation_reasons: vec!["SIN CASCO".to_string()],
    });
    for n in 0..7 {
        store.lock().unwrap().append(&Incident {
            timestamp: format!("2026-08-30T10:00:0{}", n),
            kind: "SIN CASCO".to_string(),
            image_path: format!("captures/capture_{}.jpg", n),
            details: "Violación detectada: SIN CASCO".to_string(),
        })?;
    }

    let (head, body) = request(handle.addr, "GET /api/stats HTTP/1.1\r\n\r\n")?;
    assert!(head.starts_with("HTTP/1.1 200"), "head: {}", head);
    let parsed: Value = serde_json::from_str(&body)?;
    assert_eq!(parsed["total_persons"], 3);
    assert_eq!(parsed["violations"], 1);
    assert_eq!(parsed["alerts"][0], "Peligro: SIN CASCO");
    // Capped at the five most recent, newest first.
    let incidents = parsed["recent_incidents"].as_array().unwrap();
    assert_eq!(incidents.len(), 5);
    assert_eq!(incidents[0]["image_path"], "captures/capture_6.jpg");
    assert_eq!(incidents[0]["type"], "SIN CASCO");
    handle.stop()
}

#[test]
fn monitor_toggle_flips_the_active_flag() -> Result<()> {
    let (handle, state, _store) = spawn_server(true)?;

    let body = r#"{"action":"stop"}"#;
    let raw = format!(
        "POST /api/monitor HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let (head, response) = request(handle.addr, &raw)?;
    assert!(head.starts_with("HTTP/1.1 200"), "head: {}", head);
    assert_eq!(response, r#"{"status":"ok","active":false}"#);
    assert!(!state.is_active());

    let body = r#"{"action":"start"}"#;
    let raw = format!(
        "POST /api/monitor HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let (_, response) = request(handle.addr, &raw)?;
    assert_eq!(response, r#"{"status":"ok","active":true}"#);
    assert!(state.is_active());
    handle.stop()
}

#[test]
fn unrecognized_monitor_action_leaves_state_unchanged() -> Result<()> {
    let (handle, state, _store) = spawn_server(true)?;

    let body = r#"{"action":"reverse"}"#;
    let raw = format!(
        "POST /api/monitor HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let (_, response) = request(handle.addr, &raw)?;
    assert_eq!(response, r#"{"status":"ok","active":true}"#);
    assert!(state.is_active());
    handle.stop()
}

#[test]
fn stream_delivers_multipart_jpeg_parts() -> Result<()> {
    let (handle, _state, _store) = spawn_server(true)?;

    let mut stream = TcpStream::connect(handle.addr)?;
    stream.write_all(b"GET /stream HTTP/1.1\r\n\r\n")?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;

    // Read enough to cover the response header and the first part header.
    let mut collected = Vec::new();
    let mut buf = [0u8; 4096];
    while collected.len() < 2048 {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&buf[..n]);
    }
    drop(stream);

    let text = String::from_utf8_lossy(&collected);
    assert!(
        text.starts_with("HTTP/1.1 200 OK"),
        "unexpected head: {}",
        &text[..text.len().min(120)]
    );
    assert!(text.contains("multipart/x-mixed-replace; boundary=frame"));
    assert!(text.contains("--frame\r\nContent-Type: image/jpeg"));
    // The JPEG payload itself starts with the SOI marker.
    let soi = collected.windows(2).any(|w| w == [0xFF, 0xD8]);
    assert!(soi, "no JPEG start-of-image marker in the stream");
    handle.stop()
}
