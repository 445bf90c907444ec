use std::sync::Arc;

use hdc_core::{BinSensor, ConfigEntry, ConfigStore, HostContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Sensors,
    Configure,
}

pub(crate) struct App {
    pub ctx: Arc<HostContext>,
    pub store: ConfigStore,

    pub screen: Screen,
    pub entry_list_index: usize,

    pub uprn_input: String,
    pub form_error: Option<String>,

    pub is_loading: bool,
    pub status_message: Option<String>,
    pub error_message: Option<String>,
}

impl App {
    pub(crate) fn new(ctx: Arc<HostContext>, store: ConfigStore) -> Self {
        let screen = if store.entries().is_empty() {
            Screen::Configure
        } else {
            Screen::Sensors
        };
        Self {
            ctx,
            store,
            screen,
            entry_list_index: 0,
            uprn_input: String::new(),
            form_error: None,
            is_loading: false,
            status_message: None,
            error_message: None,
        }
    }

    pub(crate) fn selected_entry(&self) -> Option<&ConfigEntry> {
        self.store.entries().get(self.entry_list_index)
    }

    pub(crate) fn selected_sensors(&self) -> Vec<Arc<BinSensor>> {
        self.selected_entry()
            .map(|entry| self.ctx.registry().entities_for_entry(&entry.entry_id))
            .unwrap_or_default()
    }

    pub(crate) fn open_form(&mut self) {
        self.uprn_input.clear();
        self.form_error = None;
        self.screen = Screen::Configure;
    }

    pub(crate) fn clamp_selection(&mut self) {
        let count = self.store.entries().len();
        if self.entry_list_index >= count {
            self.entry_list_index = count.saturating_sub(1);
        }
    }
}
