use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::fmt::Write as _;
use tp_core::{Outcome, SystemLogLevel, WorkerRecord};

use crate::view::{
    outcome_label, BuildLogPane, ConnectionIndicator, DashboardView, Modal,
    Notification, StartLogPane, SystemLogLine, TableRow, TableView, BUILD_LOG_TAB, NO_BUILD_COMMANDS,
    NO_BUILD_LOGS, NO_START_LOGS, NO_SYSTEM_LOGS, NO_WORKERS, START_LOG_TAB,
};

const SPINNER: &str = r#"<div class="spinner-border spinner-border-sm text-primary" role="status"><span class="visually-hidden">Loading...</span></div>"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct Chrome<'a> {
    pub open_modals: &'a [Modal],
    pub active_pane: Option<&'a str>,
}

pub fn status_badge(outcome: Outcome) -> String {
    let (status, icon) = match outcome {
        Outcome::Success => ("success", "bi-check-circle"),
        Outcome::Failure => ("danger", "bi-x-circle"),
        Outcome::Pending => ("warning", "bi-clock"),
    };
    format!(
        r#"<span class="badge status-badge" data-status="{status}"><i class="bi {icon}"></i> {}</span>"#,
        outcome_label(outcome)
    )
}

pub fn connection_badge(indicator: ConnectionIndicator) -> String {
    match indicator {
        ConnectionIndicator::Online => {
            r#"<span id="connection-status" class="badge bg-success">Online</span>"#.to_string()
        }
        ConnectionIndicator::Offline => {
            r#"<span id="connection-status" class="badge bg-danger">Offline</span>"#.to_string()
        }
    }
}

pub fn refresh_button(busy: bool) -> String {
    if busy {
        r#"<button id="refreshButton" class="btn btn-primary" disabled><i class="bi bi-arrow-clockwise spin"></i> Refreshing...</button>"#.to_string()
    } else {
        r#"<button id="refreshButton" class="btn btn-primary"><i class="bi bi-arrow-clockwise"></i> Refresh</button>"#.to_string()
    }
}

pub fn table_row(record: &WorkerRecord) -> TableRow {
    let name = record.name.as_str();
    let encoded = urlencoding::encode(name);
    TableRow {
        key: name.to_string(),
        cells: [
            format!(
                r#"<a href="/tentacle/{encoded}/" class="text-decoration-none fw-bold"><i class="bi bi-box-arrow-up-right"></i> {}</a>"#,
                text(name)
            ),
            format!(
                r#"<a href="http://{}" target="_blank" class="text-muted text-decoration-none"><i class="bi bi-globe"></i> {}</a>"#,
                attr(&record.url),
                text(&record.url)
            ),
            status_badge(record.is_build_success),
            status_badge(record.is_start_success),
            format!(
                r#"<button class="btn btn-sm btn-outline-info logs-btn" data-tentacle="{name_attr}"><i class="bi bi-file-text"></i> Logs</button> <button class="btn btn-sm restart-btn" data-tentacle="{name_attr}"><i class="bi bi-arrow-repeat"></i> Restart</button>"#,
                name_attr = attr(name)
            ),
            text(record.last_commit.as_deref().unwrap_or_default()).into_owned(),
        ],
    }
}

pub fn table_body(table: &TableView) -> String {
    let mut out = String::new();
    if let Some(error) = &table.error {
        let _ = write!(
            out,
            r#"<tr class="table-error"><td colspan="6" class="text-center text-danger">Error loading data: {}</td></tr>"#,
            text(error)
        );
    }
    if table.rows.is_empty() {
        if table.error.is_none() {
            let _ = write!(out, r#"<tr><td colspan="6" class="text-center text-muted">{NO_WORKERS}</td></tr>"#);
        }
        return out;
    }
    for row in &table.rows {
        let _ = write!(out, r#"<tr data-tentacle="{}">"#, attr(&row.key));
        for (idx, cell) in row.cells.iter().enumerate() {
            let class = if idx == 0 || idx == 5 { r#" class="tr-left""# } else { "" };
            let _ = write!(out, "<td{class}>{cell}</td>");
        }
        out.push_str("</tr>");
    }
    out
}

/// Tab strip and pane container of the build log.
pub fn build_log(pane: &BuildLogPane) -> (String, String) {
    match pane {
        BuildLogPane::Loading => (
            format!(r#"<li class="nav-item" role="presentation"><span class="nav-link active">{SPINNER}</span></li>"#),
            String::new(),
        ),
        BuildLogPane::Empty => (
            format!(r#"<li class="nav-item" role="presentation"><span class="nav-link active text-muted">{NO_BUILD_COMMANDS}</span></li>"#),
            format!(r#"<div class="text-muted text-center p-4"><i class="bi bi-info-circle"></i> {NO_BUILD_LOGS}</div>"#),
        ),
        BuildLogPane::Failed(message) => (String::new(), inline_error(message)),
        BuildLogPane::Tabs(build) => {
            let mut tabs = String::new();
            let mut panes = String::new();
            for (idx, tab) in build.tabs.iter().enumerate() {
                let active = idx == build.active;
                let _ = write!(
                    tabs,
                    r##"<li class="nav-item" role="presentation"><button class="nav-link{}" id="{id}-tab" type="button" data-bs-toggle="tab" data-bs-target="#{id}" role="tab" aria-controls="{id}" aria-selected="{active}" title="{title}">{label}</button></li>"##,
                    if active { " active" } else { "" },
                    id = tab.id,
                    title = attr(&tab.label),
                    label = text(&tab.label),
                );
                let _ = write!(
                    panes,
                    r#"<div class="tab-pane fade{}" id="{id}" role="tabpanel" aria-labelledby="{id}-tab"><div class="build-command-content"><pre>{}</pre></div></div>"#,
                    if active { " show active" } else { "" },
                    text(&tab.output),
                    id = tab.id,
                );
            }
            (tabs, panes)
        }
    }
}

pub fn start_log(pane: &StartLogPane) -> String {
    match pane {
        StartLogPane::Loading => format!(r#"<div class="text-center py-3">{SPINNER}</div>"#),
        StartLogPane::Empty => NO_START_LOGS.to_string(),
        StartLogPane::Lines(lines) => text(&lines.join("\n")).into_owned(),
        StartLogPane::Failed(message) => inline_error(message),
    }
}

pub fn system_log_class(level: SystemLogLevel) -> &'static str {
    match level {
        SystemLogLevel::Error => "system-logs-error",
        SystemLogLevel::Muted => "system-logs-grey",
        SystemLogLevel::Header => "system-logs-header",
        SystemLogLevel::Success => "system-logs-success",
        SystemLogLevel::Warning => "system-logs-warning",
        SystemLogLevel::Info => "system-logs-info",
    }
}

pub fn system_log_line(line: &SystemLogLine) -> String {
    format!(
        r#"<pre class="logs-content system-logs-content {}">{}</pre>"#,
        system_log_class(line.level),
        text(&line.message)
    )
}

pub fn notification(note: &Notification) -> String {
    format!(
        r#"<div class="alert alert-{} alert-dismissible fade show position-fixed" data-notification="{}">{}<button type="button" class="btn-close" data-bs-dismiss="alert"></button></div>"#,
        note.level.as_str(),
        note.id,
        text(&note.message)
    )
}

fn inline_error(message: &str) -> String {
    format!(r#"<div class="alert alert-danger">Error: {}</div>"#, text(message))
}

fn modal_open(chrome: &Chrome<'_>, modal: Modal) -> &'static str {
    if chrome.open_modals.contains(&modal) {
        " show"
    } else {
        ""
    }
}

fn log_tab_class(chrome: &Chrome<'_>, id: &str) -> &'static str {
    let active = chrome.active_pane.unwrap_or(BUILD_LOG_TAB);
    if active == id {
        " show active"
    } else {
        ""
    }
}

pub fn page(view: &DashboardView, chrome: &Chrome<'_>) -> String {
    let mut out = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>Tentacle Preview</title></head><body>",
    );
    let _ = write!(
        out,
        r#"<header class="d-flex justify-content-between">{}{}</header>"#,
        connection_badge(view.connection),
        refresh_button(view.table.is_refreshing()),
    );
    let _ = write!(
        out,
        r#"<table class="table"><thead><tr><th>Name</th><th>URL</th><th>Build</th><th>Start</th><th>Actions</th><th>Last commit</th></tr></thead><tbody id="tentacles-table-body">{}</tbody></table>"#,
        table_body(&view.table)
    );

    let (tabs, panes) = build_log(&view.worker_logs.build);
    let title = view.worker_logs.worker.as_deref().unwrap_or_default();
    let _ = write!(
        out,
        r#"<div class="modal{}" id="{}"><h5 id="logsModalLabel">Logs: {}</h5><div class="tab-content"><div class="tab-pane fade{}" id="{BUILD_LOG_TAB}"><ul class="nav nav-tabs" id="buildCommandTabs">{tabs}</ul><div class="tab-content" id="buildCommandTabContent">{panes}</div></div><div class="tab-pane fade{}" id="{START_LOG_TAB}"><pre id="start-logs-content">{}</pre></div></div></div>"#,
        modal_open(chrome, Modal::WorkerLogs),
        Modal::WorkerLogs.element_id(),
        text(title),
        log_tab_class(chrome, BUILD_LOG_TAB),
        log_tab_class(chrome, START_LOG_TAB),
        start_log(&view.worker_logs.start),
    );

    let target = view.restart_target.as_deref().unwrap_or_default();
    let _ = write!(
        out,
        r#"<div class="modal{}" id="{}"><p>Restart <strong id="current-tentacle-restart">{}</strong>?</p><button id="restartButtonModal" class="btn btn-warning">Restart</button><button id="restartButtonModalClean" class="btn btn-danger">Clean restart</button></div>"#,
        modal_open(chrome, Modal::Restart),
        Modal::Restart.element_id(),
        text(target),
    );

    let mut system = String::new();
    if view.system_logs.loading {
        system.push_str(SPINNER);
    }
    if let Some(error) = &view.system_logs.error {
        system.push_str(&inline_error(error));
    } else if view.system_logs.entries.is_empty() && !view.system_logs.loading {
        let _ = write!(system, r#"<div class="text-muted">{NO_SYSTEM_LOGS}</div>"#);
    }
    for line in &view.system_logs.entries {
        system.push_str(&system_log_line(line));
    }
    let _ = write!(
        out,
        r#"<div class="modal{}" id="{}"><div id="tentaclePreview-logs-container">{system}</div></div>"#,
        modal_open(chrome, Modal::SystemLogs),
        Modal::SystemLogs.element_id(),
    );

    for note in view.notifications.items() {
        out.push_str(&notification(note));
    }
    out.push_str("</body></html>\n");
    out
}
