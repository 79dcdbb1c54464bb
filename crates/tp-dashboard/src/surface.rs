use std::io;
use std::path::{Path, PathBuf};

use crate::render::{self, Chrome};
use crate::view::{DashboardView, Modal, BUILD_LOG_TAB, START_LOG_TAB};

/// Stateful presentation widgets the core drives but does not own.
pub trait Widgets {
    fn show(&mut self, modal: Modal);
    fn hide(&mut self, modal: Modal);
    fn activate(&mut self, id: &str);
    /// Re-initialize tab bindings after a tab strip was rebuilt. Replaces
    /// every earlier binding.
    fn bind_tabs(&mut self, ids: &[String]);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlSurface {
    open: Vec<Modal>,
    active_pane: Option<String>,
    active_tab: Option<String>,
    bound_tabs: Vec<String>,
    generation: u64,
}

impl HtmlSurface {
    pub fn is_open(&self, modal: Modal) -> bool {
        self.open.contains(&modal)
    }

    pub fn open_modals(&self) -> &[Modal] {
        &self.open
    }

    pub fn active_pane(&self) -> Option<&str> {
        self.active_pane.as_deref()
    }

    pub fn active_tab(&self) -> Option<&str> {
        self.active_tab.as_deref()
    }

    pub fn bound_tabs(&self) -> &[String] {
        &self.bound_tabs
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn chrome(&self) -> Chrome<'_> {
        Chrome {
            open_modals: &self.open,
            active_pane: self.active_pane.as_deref(),
        }
    }
}

impl Widgets for HtmlSurface {
    fn show(&mut self, modal: Modal) {
        if !self.open.contains(&modal) {
            self.open.push(modal);
        }
    }

    fn hide(&mut self, modal: Modal) {
        self.open.retain(|open| *open != modal);
    }

    fn activate(&mut self, id: &str) {
        if id == BUILD_LOG_TAB || id == START_LOG_TAB {
            self.active_pane = Some(id.to_string());
        } else {
            self.active_tab = Some(id.to_string());
        }
    }

    fn bind_tabs(&mut self, ids: &[String]) {
        self.bound_tabs = ids.to_vec();
        self.generation += 1;
        if let Some(active) = &self.active_tab {
            if !self.bound_tabs.contains(active) {
                self.active_tab = None;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageWriter {
    path: PathBuf,
}

impl PageWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the page atomically so readers never see a partial document.
    pub fn write(&self, view: &DashboardView, surface: &HtmlSurface) -> io::Result<()> {
        let html = render::page(view, &surface.chrome());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("html.tmp");
        std::fs::write(&tmp, html)?;
        std::fs::rename(&tmp, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_and_hide_track_open_modals() {
        let mut surface = HtmlSurface::default();
        surface.show(Modal::WorkerLogs);
        surface.show(Modal::WorkerLogs);
        surface.show(Modal::Restart);
        assert_eq!(surface.open_modals(), &[Modal::WorkerLogs, Modal::Restart]);
        surface.hide(Modal::WorkerLogs);
        assert!(!surface.is_open(Modal::WorkerLogs));
        assert!(surface.is_open(Modal::Restart));
    }

    #[test]
    fn rebinding_replaces_previous_tabs() {
        let mut surface = HtmlSurface::default();
        surface.bind_tabs(&["build-command-0".to_string(), "build-command-1".to_string()]);
        surface.activate("build-command-1");
        surface.bind_tabs(&["build-command-0".to_string()]);
        assert_eq!(surface.bound_tabs(), &["build-command-0".to_string()]);
        assert_eq!(surface.generation(), 2);
        assert_eq!(surface.active_tab(), None);
    }

    #[test]
    fn activating_log_panes_is_separate_from_tabs() {
        let mut surface = HtmlSurface::default();
        surface.activate(START_LOG_TAB);
        surface.activate("build-command-0");
        assert_eq!(surface.active_pane(), Some(START_LOG_TAB));
        assert_eq!(surface.active_tab(), Some("build-command-0"));
    }

    #[test]
    fn page_writer_replaces_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = PageWriter::new(dir.path().join("out").join("dashboard.html"));
        let view = DashboardView::default();
        let surface = HtmlSurface::default();
        writer.write(&view, &surface).expect("first write");
        writer.write(&view, &surface).expect("second write");
        let html = std::fs::read_to_string(writer.path()).expect("read");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(!dir.path().join("out").join("dashboard.html.tmp").exists());
    }
}
