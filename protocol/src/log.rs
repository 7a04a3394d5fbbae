//! 注入式日志
//!
//! 会话层和走法引擎通过 [`GameLog`] 输出日志，具体实现由进程启动时创建并传入。

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// 对应的 EnvFilter 指令
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// 日志分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Board,
    Moves,
    Protocol,
    Session,
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogCategory::Board => "board",
            LogCategory::Moves => "moves",
            LogCategory::Protocol => "protocol",
            LogCategory::Session => "session",
        };
        f.write_str(name)
    }
}

/// 日志能力
pub trait GameLog: Send + Sync {
    fn log(&self, level: LogLevel, category: LogCategory, message: &str);

    fn debug(&self, category: LogCategory, message: &str) {
        self.log(LogLevel::Debug, category, message);
    }

    fn info(&self, category: LogCategory, message: &str) {
        self.log(LogLevel::Info, category, message);
    }

    fn warn(&self, category: LogCategory, message: &str) {
        self.log(LogLevel::Warn, category, message);
    }

    fn error(&self, category: LogCategory, message: &str) {
        self.log(LogLevel::Error, category, message);
    }
}

/// 共享的日志句柄
pub type SharedLog = Arc<dyn GameLog>;

/// 转发到 tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl GameLog for TracingLog {
    fn log(&self, level: LogLevel, category: LogCategory, message: &str) {
        let category = category.to_string();
        match level {
            LogLevel::Debug => tracing::debug!(%category, "{}", message),
            LogLevel::Info => tracing::info!(%category, "{}", message),
            LogLevel::Warn => tracing::warn!(%category, "{}", message),
            LogLevel::Error => tracing::error!(%category, "{}", message),
        }
    }
}

/// 一条日志记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
}

/// 内存日志，测试中用于断言输出
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// 是否存在包含指定文本的记录
    pub fn contains(&self, text: &str) -> bool {
        self.entries().iter().any(|e| e.message.contains(text))
    }

    /// 指定文本出现的次数
    pub fn count(&self, text: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.message.contains(text))
            .count()
    }
}

impl GameLog for MemoryLog {
    fn log(&self, level: LogLevel, category: LogCategory, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(LogEntry {
                level,
                category,
                message: message.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_records() {
        let log = MemoryLog::new();
        log.warn(LogCategory::Protocol, "Unhandled message: \"HELLO\"");
        log.info(LogCategory::Session, "轮到主机走棋");

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert_eq!(entries[0].category, LogCategory::Protocol);
        assert!(log.contains("HELLO"));
        assert_eq!(log.count("走棋"), 1);
    }

    #[test]
    fn test_shared_log_is_object_safe() {
        let memory = MemoryLog::new();
        let shared: SharedLog = memory.clone();
        shared.error(LogCategory::Session, "连接已断开");
        assert!(memory.contains("连接已断开"));
    }

    #[test]
    fn test_level_serde() {
        let json = serde_json::to_string(&LogLevel::Warn).unwrap();
        assert_eq!(json, "\"warn\"");
        let level: LogLevel = serde_json::from_str("\"debug\"").unwrap();
        assert_eq!(level, LogLevel::Debug);
    }
}
