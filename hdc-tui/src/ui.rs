use chrono::{Local, NaiveDateTime};
use hdc_core::BinSensor;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, Wrap},
};

use crate::app::{App, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let header = Paragraph::new("Harborough District Council – bin collections")
        .block(Block::default().borders(Borders::ALL).title("hdc"));
    frame.render_widget(header, *header_area);

    match app.screen {
        Screen::Sensors => draw_sensors(frame, app, *content_area),
        Screen::Configure => draw_configure(frame, app, *content_area),
    }

    let nav_hint = match app.screen {
        Screen::Sensors => "↑/↓ select · r refresh · a add UPRN · d remove · q/Ctrl-C quit",
        Screen::Configure => "Type digits · Enter submit · Esc back · q/Ctrl-C quit",
    };

    let status_text = if app.is_loading {
        format!("Loading… · {nav_hint}")
    } else if let Some(msg) = &app.error_message {
        format!("{msg} · {nav_hint}")
    } else if let Some(msg) = &app.status_message {
        format!("{msg} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn draw_configure(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // input
            Constraint::Min(0),    // feedback
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [input_area, feedback_area] = chunks else {
        return;
    };

    let input = Paragraph::new(format!("{}▏", app.uprn_input)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("UPRN (Unique Property Reference Number, Enter)"),
    );
    frame.render_widget(input, *input_area);

    let (feedback, style) = match &app.form_error {
        Some(error) => (error.as_str(), Style::default().fg(Color::Red)),
        None => (
            "Enter the UPRN of a property in the Harborough district.",
            Style::default(),
        ),
    };
    let paragraph = Paragraph::new(feedback)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title("Add location"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, *feedback_area);
}

fn draw_sensors(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(40), Constraint::Min(0)])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [entries_area, sensors_area] = chunks else {
        return;
    };

    let items = app
        .store
        .entries()
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let prefix = if idx == app.entry_list_index {
                "> "
            } else {
                "  "
            };
            ListItem::new(format!("{prefix}{}", entry.title))
        })
        .collect::<Vec<ListItem<'_>>>();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Locations"))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    if !app.store.entries().is_empty() {
        state.select(Some(app.entry_list_index));
    }
    frame.render_stateful_widget(list, *entries_area, &mut state);

    let Some(entry) = app.selected_entry() else {
        let paragraph = Paragraph::new("No locations configured. Press a to add one.")
            .block(Block::default().borders(Borders::ALL).title("Sensors"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, *sensors_area);
        return;
    };

    let coordinator = app.ctx.coordinator(entry.uprn());
    let title = match coordinator.as_ref().and_then(|coordinator| coordinator.last_error()) {
        Some(error) => format!("Sensors for UPRN {} (last update failed: {error})", entry.uprn()),
        None => format!("Sensors for UPRN {}", entry.uprn()),
    };

    let sensors = app.selected_sensors();
    if sensors.is_empty() {
        let message = if coordinator.is_some() {
            "Waiting for the first successful update…"
        } else {
            "Location is not loaded."
        };
        let paragraph = Paragraph::new(message)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, *sensors_area);
        return;
    }

    let now = Local::now().naive_local();
    let rows = sensors.iter().map(|sensor| sensor_row(sensor, now));

    let column_widths = [
        Constraint::Min(24),
        Constraint::Length(22),
        Constraint::Length(12),
        Constraint::Length(12),
    ];

    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec!["Sensor", "Next collection", "In", "State"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .column_spacing(1);

    frame.render_widget(table, *sensors_area);
}

fn sensor_row(sensor: &BinSensor, now: NaiveDateTime) -> Row<'static> {
    let (date, relative) = match sensor.native_value() {
        Some(timestamp) => (
            timestamp.format("%a %d.%m.%Y %H:%M").to_string(),
            relative_day_label(timestamp, now),
        ),
        None => ("unknown".to_owned(), String::new()),
    };

    let (state, style) = if sensor.available() {
        ("available", Style::default())
    } else {
        ("unavailable", Style::default().fg(Color::DarkGray))
    };

    Row::new(vec![
        Cell::from(sensor.name()),
        Cell::from(date),
        Cell::from(relative),
        Cell::from(state),
    ])
    .style(style)
}

fn relative_day_label(timestamp: NaiveDateTime, now: NaiveDateTime) -> String {
    let delta = (timestamp.date() - now.date()).num_days();
    match delta {
        0 => "today".to_owned(),
        1 => "tomorrow".to_owned(),
        days if days > 1 => format!("in {days} days"),
        -1 => "yesterday".to_owned(),
        days => format!("{} days ago", days.abs()),
    }
}
