use tp_core::{
    BuildLogEntry, LogKind, LogPayload, Outcome, ServerEvent, StatusUpdate, SystemLogEntry,
    WorkerRecord,
};
use tracing::debug;

use crate::error::ApiError;
use crate::render::{status_badge, table_row};
use crate::state::AppState;
use crate::surface::Widgets;
use crate::view::{
    build_tab_id, BuildLogPane, BuildTab, BuildTabs, StartLogPane, SystemLogLine, BUILD_COLUMN,
    START_COLUMN,
};

pub fn apply_server_event(state: &mut AppState, widgets: &mut dyn Widgets, event: ServerEvent) {
    match event {
        ServerEvent::StatusUpdate(StatusUpdate::Snapshot { tentacles }) => {
            apply_snapshot(state, &tentacles);
        }
        ServerEvent::StatusUpdate(StatusUpdate::Delta {
            tentacle,
            build_status,
            start_status,
        }) => {
            apply_delta(state, &tentacle, build_status, start_status);
        }
        ServerEvent::LogsUpdate(update) => match update.payload() {
            Some(payload) => apply_logs(state, widgets, &update.tentacle, payload),
            None => debug!(
                event = "logs_update_ignored",
                tentacle = %update.tentacle,
                log_type = %update.log_type,
                stream = update.stream
            ),
        },
        ServerEvent::SystemLogsUpdate(entry) => append_system_log(state, entry),
        ServerEvent::ConnectionStatus(payload) => {
            debug!(event = "connection_status", payload = %payload);
        }
    }
}

pub fn apply_table_pull(state: &mut AppState, result: Result<Vec<WorkerRecord>, ApiError>) {
    state.view.table.end_refresh();
    match result {
        Ok(workers) => apply_snapshot(state, &workers),
        Err(err) => state.view.table.error = Some(err.to_string()),
    }
}

/// Rebuild the table from a full list. Rows are keyed by name; a repeated
/// name keeps its first position and takes the last record.
pub fn apply_snapshot(state: &mut AppState, workers: &[WorkerRecord]) {
    let table = &mut state.view.table;
    table.error = None;
    table.rows.clear();
    for worker in workers {
        let row = table_row(worker);
        match table.row_mut(&worker.name) {
            Some(existing) => *existing = row,
            None => table.rows.push(row),
        }
    }
}

pub fn apply_delta(state: &mut AppState, name: &str, build: Outcome, start: Outcome) -> bool {
    match state.view.table.row_mut(name) {
        Some(row) => {
            row.cells[BUILD_COLUMN] = status_badge(build);
            row.cells[START_COLUMN] = status_badge(start);
            true
        }
        None => {
            debug!(event = "status_delta_unknown", tentacle = %name);
            false
        }
    }
}

/// Merge a log payload for `worker`. Dropped unless it is the current worker.
pub fn apply_logs(state: &mut AppState, widgets: &mut dyn Widgets, worker: &str, payload: LogPayload) {
    if !state.selection.is_current(worker) {
        debug!(event = "logs_dropped", tentacle = %worker, log_type = %payload.kind());
        return;
    }
    match payload {
        LogPayload::Build(entries) => replace_build_logs(state, widgets, &entries),
        LogPayload::Start(lines) => {
            state.view.worker_logs.start = if lines.is_empty() {
                StartLogPane::Empty
            } else {
                StartLogPane::Lines(lines)
            };
        }
        LogPayload::StartLine(line) => match &mut state.view.worker_logs.start {
            StartLogPane::Lines(lines) => lines.push(line),
            pane => *pane = StartLogPane::Lines(vec![line]),
        },
    }
}

/// Index of the tab to select after the build list changed length.
/// Growth past the selection jumps to the newest command; otherwise the
/// selection is kept, clamped to the new length.
pub fn next_active_tab(previous: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else if len > previous + 1 {
        len - 1
    } else {
        previous.min(len - 1)
    }
}

fn replace_build_logs(state: &mut AppState, widgets: &mut dyn Widgets, entries: &[BuildLogEntry]) {
    if entries.is_empty() {
        state.selection.active_build_tab = 0;
        state.view.worker_logs.build = BuildLogPane::Empty;
        return;
    }
    let active = next_active_tab(state.selection.active_build_tab, entries.len());
    let tabs: Vec<BuildTab> = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| BuildTab {
            id: build_tab_id(idx),
            label: entry.label(idx),
            output: entry.output_text().to_string(),
        })
        .collect();
    let ids: Vec<String> = tabs.iter().map(|tab| tab.id.clone()).collect();
    state.selection.active_build_tab = active;
    state.view.worker_logs.build = BuildLogPane::Tabs(BuildTabs { tabs, active });
    widgets.bind_tabs(&ids);
    widgets.activate(&ids[active]);
}

pub fn apply_log_error(state: &mut AppState, worker: &str, kind: LogKind, err: &ApiError) {
    if !state.selection.is_current(worker) {
        debug!(event = "log_error_dropped", tentacle = %worker, log_type = %kind);
        return;
    }
    let message = err.to_string();
    match kind {
        LogKind::Build => state.view.worker_logs.build = BuildLogPane::Failed(message),
        LogKind::Start => state.view.worker_logs.start = StartLogPane::Failed(message),
    }
}

pub fn clear_system_logs(state: &mut AppState) {
    let pane = &mut state.view.system_logs;
    pane.entries.clear();
    pane.error = None;
    pane.loading = true;
}

pub fn apply_system_logs(state: &mut AppState, result: Result<Vec<SystemLogEntry>, ApiError>) {
    state.view.system_logs.loading = false;
    match result {
        Ok(entries) => {
            for entry in entries {
                append_system_log(state, entry);
            }
        }
        Err(err) => state.view.system_logs.error = Some(err.to_string()),
    }
}

/// Append in arrival order. Empty messages are skipped.
pub fn append_system_log(state: &mut AppState, entry: SystemLogEntry) {
    if entry.message.is_empty() {
        return;
    }
    state.view.system_logs.entries.push(SystemLogLine {
        level: entry.log_type,
        message: entry.message,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render;
    use crate::surface::HtmlSurface;
    use crate::view::DashboardView;
    use serde_json::json;
    use tp_core::{LogsUpdate, SystemLogLevel};

    fn worker(name: &str, build: Outcome, start: Outcome) -> WorkerRecord {
        WorkerRecord {
            name: name.to_string(),
            url: format!("{name}.local:8000"),
            is_build_success: build,
            is_start_success: start,
            last_commit: None,
        }
    }

    fn watching(name: &str) -> AppState {
        let mut state = AppState::default();
        state.selection.current_worker = Some(name.to_string());
        state
    }

    fn build_entries(count: usize) -> Vec<BuildLogEntry> {
        (0..count)
            .map(|idx| BuildLogEntry {
                command: Some(format!("step {idx}")),
                output: Some(format!("output {idx}")),
            })
            .collect()
    }

    #[test]
    fn snapshot_twice_renders_identically() {
        let workers = vec![
            worker("A", Outcome::Success, Outcome::Pending),
            worker("B", Outcome::Failure, Outcome::Success),
        ];
        let mut once = AppState::default();
        apply_snapshot(&mut once, &workers);
        let mut twice = once.clone();
        apply_snapshot(&mut twice, &workers);
        assert_eq!(once, twice);
        assert_eq!(twice.view.table.rows.len(), 2);
    }

    #[test]
    fn duplicate_names_collapse_to_last_record() {
        let mut state = AppState::default();
        apply_snapshot(
            &mut state,
            &[
                worker("A", Outcome::Failure, Outcome::Failure),
                worker("B", Outcome::Success, Outcome::Success),
                worker("A", Outcome::Success, Outcome::Success),
            ],
        );
        let keys: Vec<&str> = state.view.table.rows.iter().map(|row| row.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(
            state.view.table.rows[0].cells[BUILD_COLUMN],
            status_badge(Outcome::Success)
        );
    }

    #[test]
    fn unknown_delta_is_a_no_op() {
        let mut state = AppState::default();
        apply_snapshot(&mut state, &[worker("A", Outcome::Success, Outcome::Success)]);
        let before = state.clone();
        assert!(!apply_delta(&mut state, "ghost", Outcome::Failure, Outcome::Failure));
        assert_eq!(state, before);
    }

    #[test]
    fn delta_patches_only_its_row() {
        let mut state = AppState::default();
        apply_snapshot(
            &mut state,
            &[
                worker("A", Outcome::Success, Outcome::Success),
                worker("B", Outcome::Success, Outcome::Success),
            ],
        );
        let mut surface = HtmlSurface::default();
        let event = ServerEvent::decode(
            "status_update",
            Some(json!({"tentacle": "B", "build_status": false, "start_status": null})),
        )
        .expect("decode");
        apply_server_event(&mut state, &mut surface, event);

        let a = state.view.table.row("A").expect("row A");
        assert!(a.cells[BUILD_COLUMN].contains("OK"));
        assert!(a.cells[START_COLUMN].contains("OK"));
        let b = state.view.table.row("B").expect("row B");
        assert!(b.cells[BUILD_COLUMN].contains("FAIL"));
        assert!(b.cells[START_COLUMN].contains("WAIT"));
    }

    #[test]
    fn missing_status_renders_as_pending() {
        let event = ServerEvent::decode(
            "status_update",
            Some(json!({"tentacles": [{"name": "A", "url": "a:1", "is_build_success": "weird"}]})),
        )
        .expect("decode");
        let mut state = AppState::default();
        apply_server_event(&mut state, &mut HtmlSurface::default(), event);
        let row = state.view.table.row("A").expect("row");
        assert_eq!(row.cells[BUILD_COLUMN], status_badge(Outcome::Pending));
        assert_eq!(row.cells[START_COLUMN], status_badge(Outcome::Pending));
    }

    #[test]
    fn logs_for_other_worker_are_ignored() {
        let mut state = watching("A");
        let mut surface = HtmlSurface::default();
        let before = state.clone();
        apply_logs(&mut state, &mut surface, "B", LogPayload::Build(build_entries(2)));
        apply_logs(&mut state, &mut surface, "B", LogPayload::StartLine("hi".to_string()));
        apply_log_error(&mut state, "B", LogKind::Start, &ApiError::Status { status: 500 });
        assert_eq!(state, before);
        assert_eq!(surface.generation(), 0);

        let mut idle = AppState::default();
        apply_logs(&mut idle, &mut surface, "A", LogPayload::Start(vec!["x".to_string()]));
        assert_eq!(idle, AppState::default());
    }

    #[test]
    fn build_log_growth_follows_newest_command() {
        let mut state = watching("A");
        let mut surface = HtmlSurface::default();
        apply_logs(&mut state, &mut surface, "A", LogPayload::Build(build_entries(3)));
        state.selection.active_build_tab = 2;
        apply_logs(&mut state, &mut surface, "A", LogPayload::Build(build_entries(3)));
        assert_eq!(state.selection.active_build_tab, 2);

        apply_logs(&mut state, &mut surface, "A", LogPayload::Build(build_entries(4)));
        assert_eq!(state.selection.active_build_tab, 3);
        match &state.view.worker_logs.build {
            BuildLogPane::Tabs(build) => {
                assert_eq!(build.active, 3);
                assert_eq!(build.tabs.len(), 4);
                assert_eq!(build.tabs[3].id, "build-command-3");
            }
            other => panic!("expected tabs, got {other:?}"),
        }
        assert_eq!(surface.bound_tabs().len(), 4);
        assert_eq!(surface.active_tab(), Some("build-command-3"));
    }

    #[test]
    fn active_tab_heuristic_keeps_or_clamps_selection() {
        assert_eq!(next_active_tab(0, 1), 0);
        assert_eq!(next_active_tab(0, 3), 2);
        assert_eq!(next_active_tab(1, 2), 1);
        assert_eq!(next_active_tab(4, 2), 1);
        assert_eq!(next_active_tab(3, 0), 0);
    }

    #[test]
    fn empty_build_list_shows_placeholder() {
        let mut state = watching("A");
        state.selection.active_build_tab = 2;
        apply_logs(&mut state, &mut HtmlSurface::default(), "A", LogPayload::Build(Vec::new()));
        assert_eq!(state.view.worker_logs.build, BuildLogPane::Empty);
        assert_eq!(state.selection.active_build_tab, 0);
    }

    #[test]
    fn build_entries_fall_back_to_defaults() {
        let mut state = watching("A");
        let entries = vec![BuildLogEntry {
            command: None,
            output: Some(String::new()),
        }];
        apply_logs(&mut state, &mut HtmlSurface::default(), "A", LogPayload::Build(entries));
        match &state.view.worker_logs.build {
            BuildLogPane::Tabs(build) => {
                assert_eq!(build.tabs[0].label, "cmd-0");
                assert_eq!(build.tabs[0].output, "(No output)");
            }
            other => panic!("expected tabs, got {other:?}"),
        }
    }

    #[test]
    fn start_stream_replaces_placeholder_then_appends() {
        let mut state = watching("A");
        let mut surface = HtmlSurface::default();
        assert_eq!(state.view.worker_logs.start, StartLogPane::Loading);

        let update: LogsUpdate = serde_json::from_value(json!({
            "tentacle": "A", "log_type": "start", "stream": true, "logs": {"output": "listening"}
        }))
        .expect("update");
        apply_server_event(&mut state, &mut surface, ServerEvent::LogsUpdate(update));
        apply_logs(&mut state, &mut surface, "A", LogPayload::StartLine("ready".to_string()));
        assert_eq!(
            state.view.worker_logs.start,
            StartLogPane::Lines(vec!["listening".to_string(), "ready".to_string()])
        );

        apply_logs(&mut state, &mut surface, "A", LogPayload::Start(Vec::new()));
        assert_eq!(state.view.worker_logs.start, StartLogPane::Empty);
    }

    #[test]
    fn system_logs_keep_arrival_order() {
        let mut state = AppState::default();
        clear_system_logs(&mut state);
        apply_system_logs(
            &mut state,
            Ok(vec![
                SystemLogEntry {
                    message: "Update".to_string(),
                    log_type: SystemLogLevel::Header,
                },
                SystemLogEntry {
                    message: String::new(),
                    log_type: SystemLogLevel::Warning,
                },
                SystemLogEntry {
                    message: "pulled".to_string(),
                    log_type: SystemLogLevel::Info,
                },
            ]),
        );
        let pushed = ServerEvent::decode(
            "system_logs_update",
            Some(json!({"message": "build failed", "log_type": "error"})),
        )
        .expect("decode");
        apply_server_event(&mut state, &mut HtmlSurface::default(), pushed);

        let lines: Vec<String> = state
            .view
            .system_logs
            .entries
            .iter()
            .map(render::system_log_line)
            .collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("system-logs-header") && lines[0].contains("Update"));
        assert!(lines[1].contains("system-logs-info") && lines[1].contains("pulled"));
        assert!(lines[2].contains("system-logs-error") && lines[2].contains("build failed"));
        assert!(!state.view.system_logs.loading);
    }

    #[test]
    fn failed_log_pull_leaves_table_intact() {
        let mut state = watching("A");
        apply_snapshot(&mut state, &[worker("A", Outcome::Success, Outcome::Failure)]);
        let table = state.view.table.clone();
        apply_log_error(&mut state, "A", LogKind::Build, &ApiError::Status { status: 502 });
        assert_eq!(state.view.table, table);
        assert_eq!(
            state.view.worker_logs.build,
            BuildLogPane::Failed("HTTP 502".to_string())
        );
        assert_eq!(state.view.worker_logs.start, StartLogPane::Loading);
    }

    #[test]
    fn failed_table_pull_keeps_rows_and_reenables_refresh() {
        let mut state = AppState::default();
        apply_snapshot(&mut state, &[worker("A", Outcome::Success, Outcome::Success)]);
        state.view.table.begin_refresh();
        apply_table_pull(&mut state, Err(ApiError::Network("refused".to_string())));
        assert_eq!(state.view.table.rows.len(), 1);
        assert!(!state.view.table.is_refreshing());
        assert_eq!(
            state.view.table.error.as_deref(),
            Some("network error: refused")
        );

        state.view.table.begin_refresh();
        apply_table_pull(&mut state, Ok(Vec::new()));
        assert!(state.view.table.error.is_none());
        assert_eq!(state.view, DashboardView::default());
    }
}
