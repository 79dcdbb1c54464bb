use crate::view::DashboardView;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    /// Worker whose logs are on screen. Log traffic for anyone else is dropped.
    pub current_worker: Option<String>,
    /// Best-effort index of the selected build command tab.
    pub active_build_tab: usize,
}

impl SelectionState {
    pub fn is_current(&self, worker: &str) -> bool {
        self.current_worker.as_deref() == Some(worker)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub selection: SelectionState,
    pub view: DashboardView,
}
