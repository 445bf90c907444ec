use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Screen};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run the config flow for `app.uprn_input`
    SubmitUprn,
    /// Refresh the selected entry's coordinator now
    RefreshSelected,
    /// Unload the selected entry and forget it
    RemoveSelected,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{Backspace, Char, Down, Enter, Esc, Up};

    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::Sensors => match key.code {
            Char('q') => action = Action::Quit,
            Up | Char('k') => {
                if app.entry_list_index > 0 {
                    app.entry_list_index -= 1;
                }
            }
            Down | Char('j') => {
                if app.entry_list_index + 1 < app.store.entries().len() {
                    app.entry_list_index += 1;
                }
            }
            Char('a') => app.open_form(),
            Char('r') => action = Action::RefreshSelected,
            Char('d') => action = Action::RemoveSelected,
            _ => {}
        },

        Screen::Configure => match key.code {
            Char('q') => action = Action::Quit,
            Char(character) if character.is_ascii_digit() => {
                app.uprn_input.push(character);
                app.form_error = None;
            }
            Backspace => {
                app.uprn_input.pop();
            }
            Enter => action = Action::SubmitUprn,
            Esc => {
                if !app.store.entries().is_empty() {
                    app.screen = Screen::Sensors;
                }
            }
            _ => {}
        },
    }
    action
}
