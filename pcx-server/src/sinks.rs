//! Output sink implementations
//!
//! Sinks receive every reading the driver produces: console status lines,
//! the local JSON-array log, and an optional remote publish channel.

use crate::config::{AppConfig, PublishConfig};
use anyhow::{anyhow, Context, Result};
use pcx_core::log_format::JsonArrayWriter;
use pcx_core::SensorReading;
use std::fs::File;
use std::io::{Stdout, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Trait for output sinks
pub trait Sink: Send {
    fn name(&self) -> &str;

    fn send(&mut self, reading: &SensorReading) -> Result<()>;

    /// Flush and release resources; called once when the driver stops
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    /// Background sends the driver waits for after `shutdown`
    fn in_flight(&self) -> Option<TaskTracker> {
        None
    }
}

/// Workload label for a console line
pub fn session_label(reading: &SensorReading) -> &'static str {
    if !reading.gaming_session {
        "IDLE"
    } else if reading.gaming_intensity > 0.8 {
        "INTENSE GAMING"
    } else if reading.gaming_intensity > 0.5 {
        "ACTIVE GAMING"
    } else {
        "LIGHT GAMING"
    }
}

/// Thermal label from the hotter of CPU and GPU
pub fn temperature_label(reading: &SensorReading) -> &'static str {
    let hottest = reading.cpu_temp.0.max(reading.gpu_temp.0);
    if hottest > 75.0 {
        "HOT"
    } else if hottest > 60.0 {
        "WARM"
    } else {
        "COOL"
    }
}

/// Human-readable status line per reading
pub struct ConsoleSink<W = Stdout> {
    out: W,
    last_gaming: Option<bool>,
}

impl ConsoleSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_gaming: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Sink for ConsoleSink<W> {
    fn name(&self) -> &str {
        "console"
    }

    fn send(&mut self, r: &SensorReading) -> Result<()> {
        match self.last_gaming {
            Some(false) if r.gaming_session => writeln!(self.out, ">> gaming session detected")?,
            Some(true) if !r.gaming_session => writeln!(self.out, ">> gaming session ended")?,
            _ => {}
        }
        self.last_gaming = Some(r.gaming_session);

        let time = r
            .datetime()
            .map(|dt| dt.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| r.timestamp.to_string());
        writeln!(
            self.out,
            "[{}] [{}] [{}] CPU {:.1}°C GPU {:.1}°C SSD {:.1}°C MB {:.1}°C | fans {}/{}/{} rpm | load {:.0}%",
            time,
            session_label(r),
            temperature_label(r),
            r.cpu_temp.0,
            r.gpu_temp.0,
            r.ssd_temp.0,
            r.motherboard_temp.0,
            r.cpu_fan_rpm,
            r.gpu_fan_rpm,
            r.case_fan_rpm,
            r.gaming_intensity * 100.0,
        )?;
        self.out.flush()?;
        Ok(())
    }
}

/// Local sensor log as a JSON array, valid after every append
pub struct JsonLogSink {
    path: PathBuf,
    writer: JsonArrayWriter<File>,
}

impl JsonLogSink {
    /// Create (truncating) the log file and open the array
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("cannot create sensor log {}", path.display()))?;
        let writer = JsonArrayWriter::new(file)
            .with_context(|| format!("cannot write sensor log {}", path.display()))?;
        info!(path = %path.display(), "local sensor log opened");
        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn records(&self) -> usize {
        self.writer.records()
    }
}

impl Sink for JsonLogSink {
    fn name(&self) -> &str {
        "json_log"
    }

    fn send(&mut self, reading: &SensorReading) -> Result<()> {
        self.writer.append(reading)?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.writer.finish()?;
        info!(
            path = %self.path.display(),
            records = self.writer.records(),
            "local sensor log closed"
        );
        Ok(())
    }
}

/// HTTP POST publish sink
pub struct HttpPublishSink {
    url: String,
    client: reqwest::Client,
    tasks: TaskTracker,
}

impl HttpPublishSink {
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PUBLISH_TIMEOUT)
            .build()?;
        Ok(Self {
            url,
            client,
            tasks: TaskTracker::new(),
        })
    }
}

impl Sink for HttpPublishSink {
    fn name(&self) -> &str {
        "http_publish"
    }

    fn send(&mut self, reading: &SensorReading) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| anyhow!("no async runtime to publish on"))?;
        let json = serde_json::to_string(reading)?;

        // Non-blocking; the tracker lets shutdown wait for the POST
        let url = self.url.clone();
        let client = self.client.clone();
        let publish = async move {
            let result = client
                .post(&url)
                .header("content-type", "application/json")
                .body(json)
                .send()
                .await
                .and_then(|resp| resp.error_for_status());
            if let Err(e) = result {
                warn!("HTTP publish error: {}", e);
            }
        };
        self.tasks.spawn_on(publish, &handle);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.tasks.close();
        if !self.tasks.is_empty() {
            info!(pending = self.tasks.len(), "waiting for HTTP publishes");
        }
        Ok(())
    }

    fn in_flight(&self) -> Option<TaskTracker> {
        Some(self.tasks.clone())
    }
}

/// UDP datagram publish sink
pub struct UdpPublishSink {
    socket: std::net::UdpSocket,
    addr: std::net::SocketAddr,
}

impl UdpPublishSink {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        let addr = format!("{}:{}", host, port).parse()?;
        Ok(Self { socket, addr })
    }
}

impl Sink for UdpPublishSink {
    fn name(&self) -> &str {
        "udp_publish"
    }

    fn send(&mut self, reading: &SensorReading) -> Result<()> {
        let json = serde_json::to_vec(reading)?;
        self.socket.send_to(&json, self.addr)?;
        Ok(())
    }
}

/// Create a publish sink from configuration
pub fn create_publish_sink(config: &PublishConfig) -> Result<Box<dyn Sink>> {
    match config {
        PublishConfig::Http { url } => Ok(Box::new(HttpPublishSink::new(url.clone())?)),
        PublishConfig::Udp { host, port } => Ok(Box::new(UdpPublishSink::new(host, *port)?)),
    }
}

/// Build every sink the configuration enables
///
/// A log file that cannot be created is fatal. A publish channel that
/// cannot be set up is dropped with a warning and local output continues.
pub fn create_sinks(config: &AppConfig) -> Result<Vec<Box<dyn Sink>>> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();

    if config.console_output {
        sinks.push(Box::new(ConsoleSink::stdout()));
    }
    if config.local_logging {
        sinks.push(Box::new(JsonLogSink::create(&config.log_file)?));
    }
    if let Some(publish) = &config.publish {
        match create_publish_sink(publish) {
            Ok(sink) => {
                info!(sink = sink.name(), "publish channel enabled");
                sinks.push(sink);
            }
            Err(e) => warn!("publish channel unavailable, continuing locally: {:#}", e),
        }
    }

    Ok(sinks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcx_core::units::Celsius;

    fn reading(gaming: bool, intensity: f64, cpu: f64, gpu: f64) -> SensorReading {
        SensorReading {
            timestamp: 1_750_263_292,
            device_id: "GamingPC4".to_string(),
            cpu_temp: Celsius(cpu),
            gpu_temp: Celsius(gpu),
            ssd_temp: Celsius(36.0),
            motherboard_temp: Celsius(33.0),
            cpu_fan_rpm: 1200,
            gpu_fan_rpm: 1000,
            case_fan_rpm: 800,
            gaming_session: gaming,
            gaming_intensity: intensity,
        }
    }

    #[test]
    fn test_session_labels() {
        assert_eq!(session_label(&reading(false, 0.0, 40.0, 40.0)), "IDLE");
        assert_eq!(session_label(&reading(true, 0.3, 40.0, 40.0)), "LIGHT GAMING");
        assert_eq!(session_label(&reading(true, 0.6, 40.0, 40.0)), "ACTIVE GAMING");
        assert_eq!(session_label(&reading(true, 0.9, 40.0, 40.0)), "INTENSE GAMING");
    }

    #[test]
    fn test_temperature_labels_use_hotter_component() {
        assert_eq!(temperature_label(&reading(false, 0.0, 45.0, 40.0)), "COOL");
        assert_eq!(temperature_label(&reading(false, 0.0, 45.0, 65.0)), "WARM");
        assert_eq!(temperature_label(&reading(false, 0.0, 80.0, 50.0)), "HOT");
    }

    #[test]
    fn test_console_announces_session_transitions() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.send(&reading(false, 0.0, 42.0, 38.0)).unwrap();
        sink.send(&reading(true, 0.9, 78.0, 70.0)).unwrap();
        sink.send(&reading(false, 0.0, 60.0, 50.0)).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("[IDLE]") && lines[0].contains("[COOL]"));
        assert_eq!(lines[1], ">> gaming session detected");
        assert!(lines[2].contains("[INTENSE GAMING]") && lines[2].contains("[HOT]"));
        assert_eq!(lines[3], ">> gaming session ended");
        assert!(lines[2].contains("CPU 78.0°C"));
    }

    #[test]
    fn test_json_log_sink_writes_valid_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensor_data_log.json");

        let mut sink = JsonLogSink::create(&path).unwrap();
        sink.send(&reading(false, 0.0, 42.0, 38.0)).unwrap();
        sink.send(&reading(true, 0.5, 50.0, 45.0)).unwrap();
        assert_eq!(sink.records(), 2);
        sink.shutdown().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<SensorReading> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed[1].gaming_session);
    }

    #[test]
    fn test_json_log_sink_bad_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("log.json");
        assert!(JsonLogSink::create(&path).is_err());
    }

    #[test]
    fn test_udp_sink_delivers_datagram() {
        let receiver = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut sink = UdpPublishSink::new("127.0.0.1", port).unwrap();
        sink.send(&reading(true, 0.7, 70.0, 65.0)).unwrap();

        let mut buf = [0u8; 1024];
        let n = receiver.recv(&mut buf).unwrap();
        let parsed: SensorReading = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(parsed.device_id, "GamingPC4");
    }

    #[test]
    fn test_http_sink_without_runtime_errors() {
        let mut sink = HttpPublishSink::new("http://127.0.0.1:9/ingest".to_string()).unwrap();
        assert!(sink.send(&reading(false, 0.0, 40.0, 40.0)).is_err());
    }

    #[test]
    fn test_create_sinks_skips_bad_publish_target() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            console_output: false,
            log_file: dir.path().join("log.json"),
            publish: Some(PublishConfig::Udp {
                host: "not a host".to_string(),
                port: 1,
            }),
            ..AppConfig::default()
        };
        let sinks = create_sinks(&config).unwrap();
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].name(), "json_log");
    }

    #[test]
    fn test_create_sinks_fails_without_writable_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            console_output: false,
            log_file: dir.path().join("no").join("such").join("log.json"),
            ..AppConfig::default()
        };
        assert!(create_sinks(&config).is_err());
    }
}
