//! Terminal host for the Harborough bin collection integration: configure UPRNs and watch
//! their sensors.

mod app;
mod input;
mod ui;

use std::{env, fs::File, io, sync::Arc, time::Duration as StdDuration};

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use hdc_core::{
    ConfigEntry, ConfigStore, ERROR_BASE, EntityRegistry, EntryData, FlowResult, HostContext,
    Uprn, setup_entry, unload_entry,
};
use hdc_provider_harborough as harborough;
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::app::{App, Screen};
use crate::input::Action;

const DEFAULT_CONFIG_PATH: &str = "hdc_entries.json";
const DEFAULT_LOG_PATH: &str = "hdc.log";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    // HTTP + integration setup
    let client = Client::builder().user_agent("hdc-bins/0.1").build()?;
    let api_url = env::var("HDC_API_URL").ok();
    let api = harborough::port(client, api_url.as_deref());
    let ctx = Arc::new(HostContext::new(api, Arc::new(EntityRegistry::new())));

    let config_path = env::var("HDC_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    let store = ConfigStore::load(config_path)?;
    for entry in store.entries() {
        if let Err(err) = setup_entry(&ctx, entry).await {
            error!(uprn = %entry.uprn(), error = %err, "Failed to set up entry");
        }
    }

    // App state
    let app = App::new(Arc::clone(&ctx), store);

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn init_tracing() -> Result<()> {
    let log_path = env::var("HDC_LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_PATH.to_owned());
    let log_file = File::create(log_path)?;
    let filter = EnvFilter::try_from_env("HDC_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .init();
    Ok(())
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        // Redraw periodically so background refreshes show up
        terminal.draw(|frame| ui::draw(frame, &app))?;

        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            let action = input::handle_key_event(key, &mut app);

            match action {
                Action::Quit => break,
                Action::None => {}
                Action::SubmitUprn => {
                    let uprn = match app.uprn_input.parse::<Uprn>() {
                        Ok(uprn) => uprn,
                        Err(_err) => {
                            app.form_error = Some("The UPRN must be a whole number.".into());
                            continue;
                        }
                    };

                    app.is_loading = true;
                    app.error_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let mut flow = app.ctx.config_flow(app.store.entries());
                    let result = flow.step_user(Some(EntryData { uprn })).await;

                    match result {
                        FlowResult::CreateEntry(entry) => add_entry(&mut app, entry).await,
                        FlowResult::Form { errors, .. } => {
                            app.form_error = errors.get(ERROR_BASE).map(|key| form_message(key));
                        }
                        FlowResult::Abort { reason } => {
                            app.form_error = Some(abort_message(reason));
                        }
                    }
                    app.is_loading = false;
                }
                Action::RefreshSelected => {
                    let Some(uprn) = app.selected_entry().map(ConfigEntry::uprn) else {
                        continue;
                    };
                    let Some(coordinator) = app.ctx.coordinator(uprn) else {
                        app.error_message = Some(format!("UPRN {uprn} is not loaded"));
                        continue;
                    };

                    app.is_loading = true;
                    app.error_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    coordinator.refresh().await;

                    app.is_loading = false;
                    if coordinator.last_update_success() {
                        app.status_message = Some(format!("Refreshed UPRN {uprn}"));
                    } else {
                        app.error_message = coordinator
                            .last_error()
                            .map(|err| format!("Refresh failed: {err}"));
                    }
                }
                Action::RemoveSelected => {
                    let Some(entry) = app.selected_entry().cloned() else {
                        continue;
                    };
                    unload_entry(&app.ctx, &entry);
                    match app.store.remove(&entry.entry_id) {
                        Ok(_) => app.status_message = Some(format!("Removed {}", entry.title)),
                        Err(err) => {
                            app.error_message = Some(format!("Failed to save entries: {err}"));
                        }
                    }
                    app.clamp_selection();
                    if app.store.entries().is_empty() {
                        app.open_form();
                    }
                }
            }
        }
    }

    for entry in app.store.entries() {
        unload_entry(&app.ctx, entry);
    }
    info!("Shut down");
    Ok(())
}

async fn add_entry(app: &mut App, entry: ConfigEntry) {
    if let Err(err) = app.store.add(entry.clone()) {
        app.form_error = Some(format!("Failed to save entries: {err}"));
        return;
    }
    if let Err(err) = setup_entry(&app.ctx, &entry).await {
        app.error_message = Some(format!("Setup failed: {err}"));
    }

    app.entry_list_index = app.store.entries().len().saturating_sub(1);
    app.status_message = Some(format!("Added {}", entry.title));
    app.uprn_input.clear();
    app.form_error = None;
    app.screen = Screen::Sensors;
}

fn form_message(key: &str) -> String {
    match key {
        "cannot_connect" => "Failed to connect to the council. Try again later.",
        "invalid_auth" => "The UPRN is invalid or not within the Harborough district.",
        _ => "Unexpected error, see the log for details.",
    }
    .to_owned()
}

fn abort_message(reason: &str) -> String {
    match reason {
        "already_configured" => "This UPRN is already configured.".to_owned(),
        other => format!("Configuration aborted: {other}"),
    }
}
