//! Trace sinks.
//!
//! The session's trace loop hands every diagnostic line to a [`TraceSink`].
//! [`StdoutSink`] prints them; [`TraceLogger`] appends them to a daily log
//! file named `<label>_<date>.log` in the configured directory (default:
//! `~/.local/share/crabwire/logs/`).

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::config::LoggingConfig;

/// Destination for trace-loop output.
pub trait TraceSink: Send + 'static {
    fn emit(&mut self, line: &str);

    /// Called once when the trace loop stops.
    fn flush(&mut self) {}
}

/// Prints each trace line to standard output.
///
/// Write errors (a closed pipe, say) are logged once; later lines are
/// dropped quietly until a write succeeds again.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink {
    broken: bool,
}

impl StdoutSink {
    fn write_to<W: Write>(&mut self, out: &mut W, line: &str) {
        match writeln!(out, "{}", line.trim_end_matches('\n')) {
            Ok(()) => self.broken = false,
            Err(e) => {
                if !self.broken {
                    warn!(error = %e, "stdout trace write failed");
                }
                self.broken = true;
            }
        }
    }
}

impl TraceSink for StdoutSink {
    fn emit(&mut self, line: &str) {
        self.write_to(&mut std::io::stdout().lock(), line);
    }

    fn flush(&mut self) {
        let _ = std::io::stdout().lock().flush();
    }
}

/// Keeps trace lines in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl TraceSink for MemorySink {
    fn emit(&mut self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Appends timestamped trace lines to per-day files.
///
/// The current file handle is cached and swapped when the date rolls over.
/// If the file cannot be opened the line is dropped with a warning.
pub struct TraceLogger {
    label: String,
    log_dir: PathBuf,
    timestamp_format: String,
    current: Option<(String, File)>,
}

impl TraceLogger {
    /// `label` names the log file, usually the server host.
    pub fn new(config: &LoggingConfig, label: &str) -> Self {
        Self {
            label: sanitize_label(label),
            log_dir: expand_home(&config.log_dir),
            timestamp_format: config.timestamp_format.clone(),
            current: None,
        }
    }

    fn file_for(&mut self, date: &str) -> Option<&mut File> {
        let filename = format!("{}_{}.log", self.label, date);
        let stale = self
            .current
            .as_ref()
            .map_or(true, |(name, _)| *name != filename);
        if stale {
            if let Err(e) = fs::create_dir_all(&self.log_dir) {
                warn!(dir = %self.log_dir.display(), error = %e, "cannot create log directory");
                return None;
            }
            let path = self.log_dir.join(&filename);
            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => self.current = Some((filename, file)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot open trace log");
                    return None;
                }
            }
        }
        self.current.as_mut().map(|(_, file)| file)
    }
}

impl TraceSink for TraceLogger {
    fn emit(&mut self, line: &str) {
        let now = chrono::Local::now();
        let date = now.format("%Y-%m-%d").to_string();
        let stamp = now.format(&self.timestamp_format).to_string();
        if let Some(file) = self.file_for(&date) {
            if let Err(e) = writeln!(file, "[{}] {}", stamp, line.trim_end_matches('\n')) {
                warn!(error = %e, "trace log write failed");
            }
        }
    }

    fn flush(&mut self) {
        if let Some((_, file)) = self.current.as_mut() {
            let _ = file.flush();
        }
    }
}

/// Keep a label safe for use as a filename.
fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// Expand a leading `~/` to the home directory.
fn expand_home(dir: &str) -> PathBuf {
    match dir.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(dir)),
        None => PathBuf::from(dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("crabwire-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("irc.libera.chat"), "irc.libera.chat");
        assert_eq!(sanitize_label("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_label("host:6697"), "host_6697");
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/var/log/x"), PathBuf::from("/var/log/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/logs"), home.join("logs"));
        }
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stdout_sink_survives_closed_pipe() {
        let mut sink = StdoutSink::default();
        sink.write_to(&mut ClosedPipe, "lost");
        sink.write_to(&mut ClosedPipe, "also lost");
        assert!(sink.broken);

        let mut out = Vec::new();
        sink.write_to(&mut out, "back\n");
        assert!(!sink.broken);
        assert_eq!(out, b"back\n");
    }

    #[test]
    fn test_memory_sink_shares_buffer() {
        let sink = MemorySink::default();
        let mut writer = sink.clone();
        writer.emit("one");
        writer.emit("two");
        assert_eq!(sink.lines(), ["one", "two"]);
    }

    #[test]
    fn test_trace_logger_appends_daily_file() {
        let dir = temp_dir("trace");
        let config = LoggingConfig {
            enabled: true,
            log_dir: dir.to_string_lossy().into_owned(),
            timestamp_format: "%H:%M:%S".into(),
        };
        let mut logger = TraceLogger::new(&config, "irc.test");
        logger.emit("first");
        logger.emit("second\n");
        logger.flush();

        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let contents = fs::read_to_string(dir.join(format!("irc.test_{}.log", date))).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] first"));
        assert!(lines[1].ends_with("] second"));
        let _ = fs::remove_dir_all(&dir);
    }
}
