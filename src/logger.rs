use crate::models::CorpusStats;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

const SESSION_PREFIX: &str = "session-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "error")]
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    pub context: Option<serde_json::Value>,
}

/// Summary of one session: counters, final corpus shape and every entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub timestamp: String,
    pub errors: usize,
    pub warnings: usize,
    pub corpus: CorpusStats,
    pub entries: Vec<LogEntry>,
}

/// JSON-lines session log. Clones share the same file and counters.
#[derive(Clone)]
pub struct DiagnosticLogger {
    log_dir: PathBuf,
    log_file: Arc<Mutex<Option<BufWriter<File>>>>,
    session_id: String,
    entries: Arc<Mutex<Vec<LogEntry>>>,
    error_count: Arc<AtomicUsize>,
    warning_count: Arc<AtomicUsize>,
}

impl DiagnosticLogger {
    pub fn new(log_dir: &Path) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

        let session_id = Utc::now().format("%Y%m%d-%H%M%S%.3f").to_string();
        let log_file_path = log_dir.join(format!("{}{}.jsonl", SESSION_PREFIX, session_id));

        let log_file = BufWriter::new(
            File::create(&log_file_path)
                .with_context(|| format!("Failed to create log file: {:?}", log_file_path))?,
        );

        Ok(DiagnosticLogger {
            log_dir: log_dir.to_path_buf(),
            log_file: Arc::new(Mutex::new(Some(log_file))),
            session_id,
            entries: Arc::new(Mutex::new(Vec::new())),
            error_count: Arc::new(AtomicUsize::new(0)),
            warning_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Logger that only keeps entries in memory
    pub fn in_memory() -> Self {
        DiagnosticLogger {
            log_dir: PathBuf::new(),
            log_file: Arc::new(Mutex::new(None)),
            session_id: Utc::now().format("%Y%m%d-%H%M%S%.3f").to_string(),
            entries: Arc::new(Mutex::new(Vec::new())),
            error_count: Arc::new(AtomicUsize::new(0)),
            warning_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn log(&self, level: LogLevel, message: String, context: Option<serde_json::Value>) {
        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            level: level.clone(),
            message,
            context,
        };

        match level {
            LogLevel::Error => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
            }
            LogLevel::Warning => {
                self.warning_count.fetch_add(1, Ordering::Relaxed);
            }
            LogLevel::Info => {}
        }

        if let Ok(mut file_opt) = self.log_file.lock() {
            if let Some(ref mut file) = *file_opt {
                if let Ok(json) = serde_json::to_string(&entry) {
                    let _ = writeln!(file, "{}", json);
                }
            }
        }

        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    pub fn info(&self, message: String) {
        self.log(LogLevel::Info, message, None);
    }

    pub fn info_with(&self, message: String, context: serde_json::Value) {
        self.log(LogLevel::Info, message, Some(context));
    }

    pub fn warning(&self, message: String, context: Option<serde_json::Value>) {
        self.log(LogLevel::Warning, message, context);
    }

    pub fn error(&self, message: String, context: Option<serde_json::Value>) {
        self.log(LogLevel::Error, message, context);
    }

    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count.load(Ordering::Relaxed)
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn generate_report(&self, corpus: CorpusStats) -> Result<SessionReport> {
        if let Ok(mut file_opt) = self.log_file.lock() {
            if let Some(ref mut file) = *file_opt {
                file.flush()
                    .context("Failed to flush log file before generating report")?;
            }
        }

        Ok(SessionReport {
            session_id: self.session_id.clone(),
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            errors: self.error_count(),
            warnings: self.warning_count(),
            corpus,
            entries: self.entries(),
        })
    }

    /// Deletes the oldest session logs so that at most `max_sessions` remain
    pub fn rotate_logs(&self, max_sessions: usize) -> Result<()> {
        if self.log_dir.as_os_str().is_empty() {
            return Ok(());
        }

        let mut session_files: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();

        for entry in WalkDir::new(&self.log_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if let Some(file_name) = entry.file_name().to_str() {
                if file_name.starts_with(SESSION_PREFIX) && file_name.ends_with(".jsonl") {
                    if let Ok(metadata) = entry.metadata() {
                        if let Ok(modified) = metadata.modified() {
                            let datetime: DateTime<Utc> = modified.into();
                            session_files.push((entry.path().to_path_buf(), datetime));
                        }
                    }
                }
            }
        }

        if session_files.len() > max_sessions {
            session_files.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

            let to_delete = session_files.len() - max_sessions;
            for (path, _) in session_files.iter().take(to_delete) {
                fs::remove_file(path)
                    .with_context(|| format!("Failed to delete old log file: {:?}", path))?;
            }
        }

        Ok(())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for DiagnosticLogger {
    fn drop(&mut self) {
        if let Ok(mut file_opt) = self.log_file.lock() {
            if let Some(ref mut file) = *file_opt {
                let _ = file.flush();
            }
        }
    }
}
