//! Local HTTP dashboard for the biosignal monitor.
//!
//! This module provides an HTTP server that:
//! - Serves a small live dashboard page at `/`
//! - Exposes the latest filtered amplitude via `GET /data`
//! - Exposes heart rate, quality and monitor state via `GET /status`
//!
//! The sampling loop consumes the pipeline's one-shot beat flag and counts
//! beats in the monitor report. `/data` turns that count back into a one-shot
//! flag for the page: a beat is reported by the first poll after it happens.
//!
//! # Architecture
//!
//! ```text
//! sensor thread ──→ Runner ──→ SharedPipeline ◀── GET /data, /status ◀── browser
//!                     │                                   ▲
//!                     └──→ MonitorReport ─────────────────┘
//! ```

use crate::config::ServerSettings;
use crate::core::{QualityLevel, SharedPipeline};
use crate::monitor::{MonitorCondition, SystemStatus};
use crate::runner::{read_report, SharedReport};
use crate::telemetry::{SharedSessionStats, StatsSnapshot};
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode, Uri},
    response::Html,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// How often the dashboard page polls `/data`
    pub data_update_interval: Duration,
    /// How often the dashboard page polls `/status`
    pub status_update_interval: Duration,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self::from_settings(&ServerSettings {
            port,
            ..ServerSettings::default()
        })
    }

    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            port: settings.port,
            data_update_interval: settings.data_update_interval,
            status_update_interval: settings.status_update_interval,
        }
    }
}

/// Shared server state
pub struct DashboardState {
    pipeline: SharedPipeline,
    report: SharedReport,
    stats: SharedSessionStats,
    sample_rate_hz: u32,
    started: Instant,
    device: String,
    session_id: Uuid,
    /// Beat count last reported by `/data`
    beats_reported: AtomicU64,
    page: String,
}

impl DashboardState {
    pub fn new(
        config: &ServerConfig,
        pipeline: SharedPipeline,
        report: SharedReport,
        stats: SharedSessionStats,
        sample_rate_hz: u32,
    ) -> Self {
        let device = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-device".to_string());

        Self {
            pipeline,
            report,
            stats,
            sample_rate_hz,
            started: Instant::now(),
            device,
            session_id: Uuid::new_v4(),
            beats_reported: AtomicU64::new(0),
            page: render_page(config),
        }
    }

    fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Waveform sample response
#[derive(Debug, Clone, Serialize)]
pub struct DataResponse {
    pub ecg_value: u16,
    /// A beat happened since the previous `/data` response
    pub beat_detected: bool,
    pub beat_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_beat_ms: Option<u64>,
    pub timestamp_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_ms: Option<u64>,
}

/// Status response
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub heart_rate: u16,
    pub signal_quality: u8,
    pub quality_level: QualityLevel,
    pub signal_good: bool,
    pub leads_connected: bool,
    pub condition: MonitorCondition,
    pub condition_code: u8,
    pub system_status: SystemStatus,
    pub sample_rate: u32,
    pub uptime_ms: u64,
    pub mean: u16,
    pub variance: u32,
    pub device: String,
    pub session_id: String,
    pub stats: StatsSnapshot,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// GET /
async fn index(State(state): State<Arc<DashboardState>>) -> Html<String> {
    Html(state.page.clone())
}

/// GET /data
async fn data(State(state): State<Arc<DashboardState>>) -> Json<DataResponse> {
    let snapshot = state.pipeline.snapshot();
    let report = read_report(&state.report);
    let previous = state
        .beats_reported
        .fetch_max(report.beat_count, Ordering::SeqCst);

    Json(DataResponse {
        ecg_value: snapshot.filtered,
        beat_detected: report.beat_count > previous,
        beat_count: report.beat_count,
        last_beat_ms: report.last_beat_ms,
        timestamp_ms: state.uptime_ms(),
        sample_ms: report.last_sample_ms,
    })
}

/// GET /status
async fn status(State(state): State<Arc<DashboardState>>) -> Json<StatusResponse> {
    let (snapshot, level, good, stats) = state.pipeline.with(|p| {
        (
            p.snapshot(),
            p.quality_level(),
            p.is_signal_good(),
            p.statistics(),
        )
    });
    let report = read_report(&state.report);

    Json(StatusResponse {
        heart_rate: snapshot.bpm,
        signal_quality: snapshot.quality,
        quality_level: level,
        signal_good: good,
        leads_connected: report.leads_connected,
        condition: report.condition,
        condition_code: report.condition.code(),
        system_status: report.status,
        sample_rate: state.sample_rate_hz,
        uptime_ms: state.uptime_ms(),
        mean: stats.mean,
        variance: stats.variance,
        device: state.device.clone(),
        session_id: state.session_id.to_string(),
        stats: state.stats.stats(),
    })
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn not_found(uri: Uri) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("No route for {}", uri.path()),
            code: "NOT_FOUND".to_string(),
        }),
    )
}

/// Build the dashboard router.
pub fn router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/data", get(data))
        .route("/status", get(status))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    state: Arc<DashboardState>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Dashboard listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}

fn render_page(config: &ServerConfig) -> String {
    DASHBOARD_HTML
        .replace(
            "__DATA_MS__",
            &config.data_update_interval.as_millis().to_string(),
        )
        .replace(
            "__STATUS_MS__",
            &config.status_update_interval.as_millis().to_string(),
        )
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Biosignal Monitor</title>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <style>
    body { font-family: sans-serif; margin: 2em; background: #f4f6f8; color: #2c3e50; }
    .cards { display: flex; gap: 1em; margin-bottom: 1em; }
    .card { background: #fff; border-radius: 8px; padding: 1em 1.5em; min-width: 9em; }
    .value { font-size: 2em; font-weight: bold; }
    canvas { background: #fff; border-radius: 8px; width: 100%; height: 240px; }
    .beat { color: #e74c3c; }
  </style>
</head>
<body>
  <h1>Biosignal Monitor</h1>
  <div class="cards">
    <div class="card"><div>Heart rate</div><div class="value" id="bpm">--</div></div>
    <div class="card"><div>Signal quality</div><div class="value" id="quality">--</div></div>
    <div class="card"><div>Leads</div><div class="value" id="leads">--</div></div>
    <div class="card"><div>Condition</div><div class="value" id="condition">--</div></div>
  </div>
  <canvas id="trace" width="1000" height="240"></canvas>
  <p>Not a medical device. Readings are for bench and educational use only.</p>
  <script>
    const trace = [];
    const canvas = document.getElementById('trace');
    const ctx = canvas.getContext('2d');

    function draw() {
      ctx.clearRect(0, 0, canvas.width, canvas.height);
      ctx.beginPath();
      trace.forEach((v, i) => {
        const y = canvas.height - (v / 4095) * canvas.height;
        if (i === 0) { ctx.moveTo(i, y); } else { ctx.lineTo(i, y); }
      });
      ctx.strokeStyle = '#2980b9';
      ctx.stroke();
    }

    async function pollData() {
      try {
        const d = await (await fetch('/data')).json();
        trace.push(d.ecg_value);
        if (trace.length > canvas.width) { trace.shift(); }
        document.getElementById('bpm').className = d.beat_detected ? 'value beat' : 'value';
        draw();
      } catch (e) {}
    }

    async function pollStatus() {
      try {
        const s = await (await fetch('/status')).json();
        document.getElementById('bpm').textContent = s.heart_rate > 0 ? s.heart_rate : '--';
        document.getElementById('quality').textContent = s.signal_quality + '%';
        document.getElementById('leads').textContent = s.leads_connected ? 'on' : 'off';
        document.getElementById('condition').textContent = s.condition;
      } catch (e) {}
    }

    setInterval(pollData, __DATA_MS__);
    setInterval(pollStatus, __STATUS_MS__);
  </script>
</body>
</html>
"#;
