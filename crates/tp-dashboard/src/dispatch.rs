use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tp_core::{BuildLogEntry, ClientEvent, LogKind, LogPayload, SystemLogEntry, WorkerRecord};
use tracing::{debug, info, warn};

use crate::api::PullApi;
use crate::error::ApiError;
use crate::reconcile;
use crate::state::AppState;
use crate::surface::Widgets;
use crate::transport::PushChannel;
use crate::view::{BuildLogPane, Modal, NotificationLevel, WorkerLogsView, BUILD_LOG_TAB};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    RefreshTable,
    RefreshLogs,
    ViewLogs(String),
    PromptRestart(String),
    ConfirmRestart { clean: bool },
    ViewSystemLogs,
    RefreshSystemLogs,
    SelectBuildTab(usize),
    CloseModal(Modal),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Result of a spawned request, delivered back to the runtime loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PullResult {
    Table(Result<Vec<WorkerRecord>, ApiError>),
    BuildLogs {
        worker: String,
        result: Result<Vec<BuildLogEntry>, ApiError>,
    },
    StartLogs {
        worker: String,
        result: Result<Vec<String>, ApiError>,
    },
    SystemLogs(Result<Vec<SystemLogEntry>, ApiError>),
    Restart {
        worker: String,
        clean: bool,
        result: Result<Value, ApiError>,
    },
}

pub struct Dispatcher {
    api: Arc<dyn PullApi>,
    results: mpsc::Sender<PullResult>,
    notification_ttl: Duration,
}

impl Dispatcher {
    pub fn new(
        api: Arc<dyn PullApi>,
        results: mpsc::Sender<PullResult>,
        notification_ttl: Duration,
    ) -> Self {
        Self {
            api,
            results,
            notification_ttl,
        }
    }

    pub fn dispatch(
        &self,
        action: Action,
        state: &mut AppState,
        widgets: &mut dyn Widgets,
        push: &mut dyn PushChannel,
    ) -> Flow {
        debug!(event = "action", action = ?action);
        match action {
            Action::RefreshTable => {
                self.pull_table(state);
                push.connect(true);
            }
            Action::RefreshLogs => match state.selection.current_worker.clone() {
                Some(worker) => self.pull_logs(&worker),
                None => debug!(event = "refresh_logs_skipped"),
            },
            Action::ViewLogs(worker) => self.view_logs(worker, state, widgets, &*push),
            Action::PromptRestart(worker) => {
                state.view.restart_target = Some(worker);
                widgets.show(Modal::Restart);
            }
            Action::ConfirmRestart { clean } => {
                widgets.hide(Modal::Restart);
                match state.view.restart_target.take() {
                    Some(worker) => self.restart(worker, clean),
                    None => warn!(event = "restart_without_target", clean),
                }
            }
            Action::ViewSystemLogs => {
                reconcile::clear_system_logs(state);
                widgets.show(Modal::SystemLogs);
                self.pull_system_logs();
            }
            Action::RefreshSystemLogs => {
                reconcile::clear_system_logs(state);
                self.pull_system_logs();
            }
            Action::SelectBuildTab(index) => select_build_tab(state, widgets, index),
            Action::CloseModal(modal) => {
                widgets.hide(modal);
                match modal {
                    Modal::WorkerLogs => {
                        state.selection.current_worker = None;
                        state.view.worker_logs = WorkerLogsView::default();
                    }
                    Modal::Restart => state.view.restart_target = None,
                    Modal::SystemLogs => {}
                }
            }
            Action::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Full worker list pull. Used by startup, the refresh action and the
    /// poll scheduler.
    pub fn pull_table(&self, state: &mut AppState) {
        state.view.table.begin_refresh();
        let api = Arc::clone(&self.api);
        let results = self.results.clone();
        tokio::spawn(async move {
            let result = api.list_workers().await;
            let _ = results.send(PullResult::Table(result)).await;
        });
    }

    fn pull_logs(&self, worker: &str) {
        for kind in [LogKind::Build, LogKind::Start] {
            let api = Arc::clone(&self.api);
            let results = self.results.clone();
            let worker = worker.to_string();
            tokio::spawn(async move {
                let message = match kind {
                    LogKind::Build => {
                        let result = api.build_logs(&worker).await;
                        PullResult::BuildLogs { worker, result }
                    }
                    LogKind::Start => {
                        let result = api.start_logs(&worker).await;
                        PullResult::StartLogs { worker, result }
                    }
                };
                let _ = results.send(message).await;
            });
        }
    }

    fn pull_system_logs(&self) {
        let api = Arc::clone(&self.api);
        let results = self.results.clone();
        tokio::spawn(async move {
            let result = api.system_logs().await;
            let _ = results.send(PullResult::SystemLogs(result)).await;
        });
    }

    fn restart(&self, worker: String, clean: bool) {
        info!(event = "restart_requested", tentacle = %worker, clean);
        let api = Arc::clone(&self.api);
        let results = self.results.clone();
        tokio::spawn(async move {
            let result = api.restart(&worker, clean).await;
            let _ = results
                .send(PullResult::Restart {
                    worker,
                    clean,
                    result,
                })
                .await;
        });
    }

    fn view_logs(
        &self,
        worker: String,
        state: &mut AppState,
        widgets: &mut dyn Widgets,
        push: &dyn PushChannel,
    ) {
        state.selection.current_worker = Some(worker.clone());
        state.selection.active_build_tab = 0;
        state.view.worker_logs = WorkerLogsView {
            worker: Some(worker.clone()),
            ..WorkerLogsView::default()
        };
        widgets.activate(BUILD_LOG_TAB);
        widgets.show(Modal::WorkerLogs);
        self.pull_logs(&worker);
        if push.connected() {
            for log_type in [LogKind::Start, LogKind::Build] {
                push.emit(ClientEvent::RequestLogs {
                    tentacle: worker.clone(),
                    log_type,
                });
            }
        }
    }

    pub fn complete(
        &self,
        result: PullResult,
        state: &mut AppState,
        widgets: &mut dyn Widgets,
        now: DateTime<Utc>,
    ) {
        match result {
            PullResult::Table(result) => {
                if let Err(err) = &result {
                    warn!(event = "table_pull_error", error = %err);
                    state.view.notifications.push(
                        NotificationLevel::Error,
                        format!("Error refreshing tentacles: {err}"),
                        now,
                        self.notification_ttl,
                    );
                }
                reconcile::apply_table_pull(state, result);
            }
            PullResult::BuildLogs { worker, result } => match result {
                Ok(entries) => {
                    reconcile::apply_logs(state, widgets, &worker, LogPayload::Build(entries))
                }
                Err(err) => {
                    warn!(event = "log_pull_error", tentacle = %worker, log_type = "build", error = %err);
                    reconcile::apply_log_error(state, &worker, LogKind::Build, &err);
                }
            },
            PullResult::StartLogs { worker, result } => match result {
                Ok(lines) => reconcile::apply_logs(state, widgets, &worker, LogPayload::Start(lines)),
                Err(err) => {
                    warn!(event = "log_pull_error", tentacle = %worker, log_type = "start", error = %err);
                    reconcile::apply_log_error(state, &worker, LogKind::Start, &err);
                }
            },
            PullResult::SystemLogs(result) => {
                if let Err(err) = &result {
                    warn!(event = "system_logs_pull_error", error = %err);
                    state.view.notifications.push(
                        NotificationLevel::Error,
                        format!("Cannot fetch system logs: {err}"),
                        now,
                        self.notification_ttl,
                    );
                }
                reconcile::apply_system_logs(state, result);
            }
            PullResult::Restart {
                worker,
                clean,
                result,
            } => {
                let (level, message) = match &result {
                    Ok(_) => {
                        info!(event = "restart_ok", tentacle = %worker, clean);
                        (NotificationLevel::Success, format!("Restart of {worker} requested"))
                    }
                    Err(err) => {
                        warn!(event = "restart_error", tentacle = %worker, clean, error = %err);
                        (NotificationLevel::Error, format!("Restart of {worker} failed: {err}"))
                    }
                };
                state
                    .view
                    .notifications
                    .push(level, message, now, self.notification_ttl);
            }
        }
    }
}

fn select_build_tab(state: &mut AppState, widgets: &mut dyn Widgets, index: usize) {
    let BuildLogPane::Tabs(build) = &mut state.view.worker_logs.build else {
        debug!(event = "select_tab_ignored", index);
        return;
    };
    let Some(tab) = build.tabs.get(index) else {
        debug!(event = "select_tab_out_of_range", index, len = build.tabs.len());
        return;
    };
    widgets.activate(&tab.id);
    build.active = index;
    state.selection.active_build_tab = index;
}
