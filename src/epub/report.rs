//! 报告输出模块
//!
//! 打包与修复流程中的每一次修改、跳过和问题都以 [`Record`] 的形式交给
//! [`ReportSink`]，收集逻辑不直接打印任何内容。

use serde::Serialize;
use std::fmt;

/// 记录的严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// 记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// 已应用的修改
    Fix,
    /// 被有意跳过的操作
    Skip,
    /// 发现的问题
    Issue,
}

/// 一条报告记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub kind: RecordKind,
    pub severity: Severity,
    /// 相关文件（相对路径或文件名）
    pub file: String,
    pub message: String,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.message)
    }
}

/// 报告接收器
pub trait ReportSink {
    /// 接收一条记录
    fn record(&mut self, record: Record);

    /// 记录一次修改
    fn fix(&mut self, file: &str, change: &str) {
        self.record(Record {
            kind: RecordKind::Fix,
            severity: Severity::Info,
            file: file.to_string(),
            message: change.to_string(),
        });
    }

    /// 记录一次带警告的跳过
    fn skip(&mut self, file: &str, reason: &str) {
        self.record(Record {
            kind: RecordKind::Skip,
            severity: Severity::Warning,
            file: file.to_string(),
            message: reason.to_string(),
        });
    }

    /// 记录一个问题
    fn issue(&mut self, severity: Severity, file: &str, message: &str) {
        self.record(Record {
            kind: RecordKind::Issue,
            severity,
            file: file.to_string(),
            message: message.to_string(),
        });
    }
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    fn record(&mut self, record: Record) {
        (**self).record(record);
    }
}

fn log_record(record: &Record) {
    match (record.kind, record.severity) {
        (RecordKind::Fix, _) => log::info!("Fixed {}", record),
        (_, Severity::Info) => log::info!("{}", record),
        (_, Severity::Warning) => log::warn!("{}", record),
        (_, Severity::Error) => log::error!("{}", record),
    }
}

/// 只把记录写入日志的接收器
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn record(&mut self, record: Record) {
        log_record(&record);
    }
}

/// 在内存中收集记录的接收器，同时写入日志
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Vec<Record>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全部记录，按接收顺序
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// 已应用的修改
    pub fn fixes(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| r.kind == RecordKind::Fix)
    }

    /// 跳过的操作
    pub fn skips(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| r.kind == RecordKind::Skip)
    }

    /// 指定严重程度及以上的问题
    pub fn issues_at_least(&self, severity: Severity) -> impl Iterator<Item = &Record> {
        self.records
            .iter()
            .filter(move |r| r.kind == RecordKind::Issue && r.severity >= severity)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ReportSink for MemorySink {
    fn record(&mut self, record: Record) {
        log_record(&record);
        self.records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_filters() {
        let mut sink = MemorySink::new();
        sink.fix("a.xhtml", "Renamed to b.xhtml");
        sink.skip("c.css", "destination exists");
        sink.issue(Severity::Warning, "d.xhtml", "Missing DOCTYPE");
        sink.issue(Severity::Error, "e.xhtml", "not well-formed");

        assert_eq!(sink.len(), 4);
        assert_eq!(sink.fixes().count(), 1);
        assert_eq!(sink.skips().count(), 1);
        assert_eq!(sink.issues_at_least(Severity::Warning).count(), 2);
        assert_eq!(sink.issues_at_least(Severity::Error).count(), 1);
    }

    #[test]
    fn test_sink_through_mut_reference() {
        fn touch(mut sink: impl ReportSink) {
            sink.fix("x", "y");
        }

        let mut sink = MemorySink::new();
        touch(&mut sink);
        assert_eq!(sink.records()[0].to_string(), "x: y");
    }
}
