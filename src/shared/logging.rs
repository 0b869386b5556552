use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn automation_log_path(state_root: &Path) -> PathBuf {
    state_root.join("logs/automation.log")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Append-only JSON-lines log. A sink without a path drops every line.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    path: Option<PathBuf>,
}

impl LogSink {
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn append(&self, level: LogLevel, event: &str, case_id: Option<&str>, message: &str) {
        let Some(path) = &self.path else {
            return;
        };
        let payload = serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": level.as_str(),
            "event": event,
            "case_id": case_id,
            "message": message,
        });

        let Ok(line) = serde_json::to_string(&payload) else {
            return;
        };

        if let Some(parent) = path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        let Ok(mut file) = fs::OpenOptions::new().create(true).append(true).open(path) else {
            return;
        };
        let _ = writeln!(file, "{line}");
    }

    pub fn info(&self, event: &str, case_id: Option<&str>, message: &str) {
        self.append(LogLevel::Info, event, case_id, message);
    }

    pub fn warn(&self, event: &str, case_id: Option<&str>, message: &str) {
        self.append(LogLevel::Warn, event, case_id, message);
    }

    pub fn error(&self, event: &str, case_id: Option<&str>, message: &str) {
        self.append(LogLevel::Error, event, case_id, message);
    }
}
