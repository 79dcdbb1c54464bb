use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tp_core::{Outcome, SystemLogLevel};

pub const BUILD_COLUMN: usize = 2;
pub const START_COLUMN: usize = 3;
pub const COLUMN_COUNT: usize = 6;

pub const NO_BUILD_COMMANDS: &str = "No build commands";
pub const NO_BUILD_LOGS: &str = "No build logs available";
pub const NO_START_LOGS: &str = "No start logs available";
pub const NO_SYSTEM_LOGS: &str = "No system logs available";
pub const NO_WORKERS: &str = "No tentacles found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modal {
    WorkerLogs,
    Restart,
    SystemLogs,
}

impl Modal {
    pub fn element_id(&self) -> &'static str {
        match self {
            Modal::WorkerLogs => "logsModal",
            Modal::Restart => "restartModal",
            Modal::SystemLogs => "systemLogsModal",
        }
    }
}

pub const BUILD_LOG_TAB: &str = "build-log-tab";
pub const START_LOG_TAB: &str = "start-log-tab";

pub fn build_tab_id(index: usize) -> String {
    format!("build-command-{index}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub key: String,
    pub cells: [String; COLUMN_COUNT],
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableView {
    pub rows: Vec<TableRow>,
    pub error: Option<String>,
    /// Table pulls in flight; the refresh button is busy while non-zero.
    pub refreshing: u32,
}

impl TableView {
    pub fn row(&self, key: &str) -> Option<&TableRow> {
        self.rows.iter().find(|row| row.key == key)
    }

    pub fn row_mut(&mut self, key: &str) -> Option<&mut TableRow> {
        self.rows.iter_mut().find(|row| row.key == key)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing > 0
    }

    pub fn begin_refresh(&mut self) {
        self.refreshing = self.refreshing.saturating_add(1);
    }

    pub fn end_refresh(&mut self) {
        self.refreshing = self.refreshing.saturating_sub(1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTab {
    pub id: String,
    pub label: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTabs {
    pub tabs: Vec<BuildTab>,
    pub active: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BuildLogPane {
    #[default]
    Loading,
    /// The worker ran no build commands.
    Empty,
    Tabs(BuildTabs),
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StartLogPane {
    #[default]
    Loading,
    Empty,
    Lines(Vec<String>),
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerLogsView {
    pub worker: Option<String>,
    pub build: BuildLogPane,
    pub start: StartLogPane,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemLogLine {
    pub level: SystemLogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemLogsView {
    pub loading: bool,
    pub entries: Vec<SystemLogLine>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLevel::Success => "success",
            NotificationLevel::Error => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notifications {
    next_id: u64,
    items: Vec<Notification>,
}

impl Notifications {
    pub fn push(
        &mut self,
        level: NotificationLevel,
        message: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> u64 {
        self.next_id += 1;
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(5));
        self.items.push(Notification {
            id: self.next_id,
            level,
            message: message.into(),
            expires_at: now + ttl,
        });
        self.next_id
    }

    /// Drop expired toasts. Returns true when something was removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.expires_at > now);
        self.items.len() != before
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionIndicator {
    Online,
    #[default]
    Offline,
}

impl ConnectionIndicator {
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            ConnectionIndicator::Online
        } else {
            ConnectionIndicator::Offline
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardView {
    pub connection: ConnectionIndicator,
    pub table: TableView,
    pub worker_logs: WorkerLogsView,
    pub restart_target: Option<String>,
    pub system_logs: SystemLogsView,
    pub notifications: Notifications,
}

pub fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Success => "OK",
        Outcome::Failure => "FAIL",
        Outcome::Pending => "WAIT",
    }
}
