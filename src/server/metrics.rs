/// Statement metrics and the Prometheus text exporter
///
/// `Metrics` owns a Prometheus recorder of its own rather than the global
/// one, so every server counts independently. The exporter serves
/// `Metrics::render()` to every TCP connection on its port from a
/// background thread; it does not parse the request.
use super::Service;
use crate::core::{Result, SqlFrontError};
use metrics::{counter, describe_counter, with_local_recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

const STATEMENTS_TOTAL: &str = "sqlfront_statements_total";
const ERRORS_TOTAL: &str = "sqlfront_statement_errors_total";

#[derive(Debug)]
pub struct Metrics {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        with_local_recorder(&recorder, || {
            describe_counter!(STATEMENTS_TOTAL, "Statements dispatched by kind.");
            describe_counter!(ERRORS_TOTAL, "Statements that failed.");
            counter!(ERRORS_TOTAL).absolute(0);
        });
        Metrics { recorder, handle }
    }

    /// Records one dispatched statement of `kind`.
    pub fn record(&self, kind: &'static str, ok: bool) {
        with_local_recorder(&self.recorder, || {
            counter!(STATEMENTS_TOTAL, "kind" => kind).increment(1);
            if !ok {
                counter!(ERRORS_TOTAL).increment(1);
            }
        });
    }

    pub fn statement_count(&self, kind: &str) -> u64 {
        self.sample(&format!("{}{{kind=\"{}\"}}", STATEMENTS_TOTAL, kind))
    }

    pub fn error_count(&self) -> u64 {
        self.sample(ERRORS_TOTAL)
    }

    /// Renders every counter in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Current value of one rendered series, zero when it was never recorded.
    fn sample(&self, series: &str) -> u64 {
        self.render()
            .lines()
            .filter_map(|line| line.strip_prefix(series)?.strip_prefix(' '))
            .find_map(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// Serves rendered metrics over TCP.
#[derive(Debug)]
pub struct PrometheusExporter {
    port: u16,
    metrics: Arc<Metrics>,
    shutdown: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
    worker: Option<JoinHandle<()>>,
}

impl PrometheusExporter {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        PrometheusExporter {
            port: 9181,
            metrics,
            shutdown: Arc::new(AtomicBool::new(false)),
            local_addr: None,
            worker: None,
        }
    }

    /// Port to bind on start; 0 picks an ephemeral port.
    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn serve(listener: TcpListener, metrics: Arc<Metrics>, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "metrics scrape");
                    if let Err(e) = Self::respond(stream, &metrics) {
                        warn!("failed to serve metrics: {}", e);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    warn!("metrics listener error: {}", e);
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }

    fn respond(mut stream: TcpStream, metrics: &Metrics) -> Result<()> {
        stream.set_nonblocking(false)?;
        let body = metrics.render();
        write!(
            stream,
            "HTTP/1.0 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )?;
        stream.flush()?;
        Ok(())
    }
}

impl Service for PrometheusExporter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let listener = TcpListener::bind(("127.0.0.1", self.port))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        self.shutdown.store(false, Ordering::SeqCst);

        let metrics = Arc::clone(&self.metrics);
        let shutdown = Arc::clone(&self.shutdown);
        let worker = thread::Builder::new()
            .name("sqlfront-metrics".to_string())
            .spawn(move || Self::serve(listener, metrics, shutdown))?;

        self.local_addr = Some(addr);
        self.worker = Some(worker);
        info!(%addr, "metrics exporter listening");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => return Ok(()),
        };
        self.shutdown.store(true, Ordering::SeqCst);
        self.local_addr = None;
        worker
            .join()
            .map_err(|_| SqlFrontError::App("metrics exporter thread panicked".to_string()))
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for PrometheusExporter {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
