use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use tp_core::{
    BuildLogEntry, ClientEvent, Outcome, SystemLogEntry, SystemLogLevel, WorkerRecord,
};

use crate::api::PullApi;
use crate::error::ApiError;
use crate::transport::{PushChannel, PushEvent, PushEventKind};

#[derive(Default)]
pub struct FakeApi {
    pub fail_logs: bool,
    pub fail_table: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeApi {
    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

pub fn worker(name: &str, build: Outcome, start: Outcome) -> WorkerRecord {
    WorkerRecord {
        name: name.to_string(),
        url: format!("{name}.local:8000"),
        is_build_success: build,
        is_start_success: start,
        last_commit: None,
    }
}

#[async_trait]
impl PullApi for FakeApi {
    async fn list_workers(&self) -> Result<Vec<WorkerRecord>, ApiError> {
        self.record("list".to_string());
        if self.fail_table {
            return Err(ApiError::Network("connection refused".to_string()));
        }
        Ok(vec![worker("A", Outcome::Success, Outcome::Success)])
    }

    async fn build_logs(&self, worker: &str) -> Result<Vec<BuildLogEntry>, ApiError> {
        self.record(format!("build {worker}"));
        if self.fail_logs {
            return Err(ApiError::Status { status: 500 });
        }
        Ok(vec![BuildLogEntry {
            command: Some("npm ci".to_string()),
            output: Some("ok".to_string()),
        }])
    }

    async fn start_logs(&self, worker: &str) -> Result<Vec<String>, ApiError> {
        self.record(format!("start {worker}"));
        if self.fail_logs {
            return Err(ApiError::Status { status: 500 });
        }
        Ok(vec!["listening".to_string()])
    }

    async fn restart(&self, worker: &str, clean: bool) -> Result<Value, ApiError> {
        self.record(format!("restart {worker} {clean}"));
        Ok(serde_json::json!({"ok": true}))
    }

    async fn system_logs(&self) -> Result<Vec<SystemLogEntry>, ApiError> {
        self.record("system".to_string());
        Ok(vec![SystemLogEntry {
            message: "Update".to_string(),
            log_type: SystemLogLevel::Header,
        }])
    }
}

#[derive(Default)]
pub struct FakePush {
    pub connected: bool,
    pub epoch: u64,
    pub connects: Vec<bool>,
    pub emitted: Mutex<Vec<ClientEvent>>,
}

impl FakePush {
    pub fn emitted(&self) -> Vec<ClientEvent> {
        self.emitted.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl PushChannel for FakePush {
    fn connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self, force: bool) {
        self.connects.push(force);
        if force || !self.connected {
            self.connected = false;
            self.epoch += 1;
        }
    }

    fn emit(&self, event: ClientEvent) -> bool {
        if !self.connected {
            return false;
        }
        if let Ok(mut emitted) = self.emitted.lock() {
            emitted.push(event);
        }
        true
    }

    fn observe(&mut self, event: &PushEvent) -> bool {
        if event.epoch != self.epoch {
            return false;
        }
        match event.kind {
            PushEventKind::Connected => self.connected = true,
            PushEventKind::Disconnected { .. } | PushEventKind::ConnectError(_) => {
                self.connected = false
            }
            PushEventKind::Server(_) => {}
        }
        true
    }
}
