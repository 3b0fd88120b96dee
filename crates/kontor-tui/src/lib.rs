// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use kontor_app::{
    AddressField, AppCommand, AppMode, AppState, BankField, Property, Role, TabKind, User,
    UserDetail, UserField, matching_properties, matching_users,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table, TableState, Tabs};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const STATUS_SECONDS: u64 = 4;

/// A single editable (or read-only) slot of the open record, addressed in a
/// way the runtime can translate into a typed edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    UserBase(UserField),
    UserRole,
    UserAddress(AddressField),
    UserBank(usize, BankField),
    PropertyLabel,
    PropertyAddress(AddressField),
    PropertyOperatingBank(BankField),
    PropertyReserveBank(BankField),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailField {
    pub label: String,
    pub value: String,
    pub target: Option<EditTarget>,
}

impl DetailField {
    fn editable(label: impl Into<String>, value: impl Into<String>, target: EditTarget) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            target: Some(target),
        }
    }

    fn heading(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: String::new(),
            target: None,
        }
    }
}

/// Whether the runtime persisted anything when asked to save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    Saved,
    NothingOpen,
}

/// Bridge between the synchronous event loop and the entity controllers.
/// One runtime carries both the users and the properties controller; which
/// one a call addresses follows the active tab passed in.
pub trait AppRuntime {
    fn refresh(&mut self, tab: TabKind) -> Result<()>;
    fn user_rows(&self) -> Vec<User>;
    fn property_rows(&self) -> Vec<Property>;

    /// Opens the detail session for the row at `index` into the unfiltered
    /// row list of `tab`.
    fn open_detail(&mut self, tab: TabKind, index: usize) -> Result<()>;
    fn detail_fields(&self) -> Vec<DetailField>;
    fn is_open(&self) -> bool;
    fn is_loading(&self) -> bool;
    fn is_dirty(&self) -> bool;

    fn apply_edit(&mut self, target: EditTarget, value: &str);
    fn save(&mut self) -> Result<SaveResult>;
    fn cancel(&mut self);
}

/// Field list for an open user record. Order matches the pane top to bottom.
pub fn user_detail_fields(detail: &UserDetail) -> Vec<DetailField> {
    let mut fields = Vec::new();
    for field in UserField::ALL {
        let value = match field {
            UserField::FirstName => &detail.base.first_name,
            UserField::LastName => &detail.base.last_name,
            UserField::Email => &detail.base.email,
            UserField::Username => &detail.base.username,
        };
        fields.push(DetailField::editable(
            field.label(),
            value.as_str(),
            EditTarget::UserBase(field),
        ));
    }
    fields.push(DetailField::editable(
        "Role",
        detail.base.role.label(),
        EditTarget::UserRole,
    ));

    fields.push(DetailField::heading("Address"));
    for field in AddressField::ALL {
        fields.push(DetailField::editable(
            field.label(),
            detail.base.address.field(field),
            EditTarget::UserAddress(field),
        ));
    }

    for (index, account) in detail.bank_accounts.iter().enumerate() {
        fields.push(DetailField::heading(format!("Bank account {}", index + 1)));
        for field in BankField::ALL {
            fields.push(DetailField::editable(
                field.label(),
                account.field(field),
                EditTarget::UserBank(index, field),
            ));
        }
    }

    if !detail.properties.is_empty() {
        fields.push(DetailField::heading("Owned properties"));
        for property in &detail.properties {
            fields.push(DetailField {
                label: property.property_label.clone(),
                value: property.address.oneline(),
                target: None,
            });
        }
    }

    fields
}

pub fn property_detail_fields(property: &Property) -> Vec<DetailField> {
    let mut fields = vec![DetailField::editable(
        "Label",
        property.property_label.as_str(),
        EditTarget::PropertyLabel,
    )];

    fields.push(DetailField::heading("Address"));
    for field in AddressField::ALL {
        fields.push(DetailField::editable(
            field.label(),
            property.address.field(field),
            EditTarget::PropertyAddress(field),
        ));
    }

    if let Some(account) = &property.operating_bank {
        fields.push(DetailField::heading("Operating bank"));
        for field in BankField::ALL {
            fields.push(DetailField::editable(
                field.label(),
                account.field(field),
                EditTarget::PropertyOperatingBank(field),
            ));
        }
    }
    if let Some(account) = &property.reserve_bank {
        fields.push(DetailField::heading("Reserve bank"));
        for field in BankField::ALL {
            fields.push(DetailField::editable(
                field.label(),
                account.field(field),
                EditTarget::PropertyReserveBank(field),
            ));
        }
    }

    fields.push(DetailField::heading("Buildings"));
    for building in &property.buildings {
        fields.push(DetailField {
            label: building.building_label.clone(),
            value: format!("{} units", building.units.len()),
            target: None,
        });
    }

    fields
}

pub fn user_table_row(user: &User) -> [String; 4] {
    [
        format!("{} {}", user.first_name, user.last_name),
        user.email.clone(),
        user.role.label().to_owned(),
        user.address.city.clone(),
    ]
}

pub fn property_table_row(property: &Property) -> [String; 3] {
    [
        property.property_label.clone(),
        property.address.oneline(),
        format!("{} units", property.unit_count()),
    ]
}

/// The role cycle for the detail pane. Editing the role does not go through
/// a text input.
pub fn next_role(current: Role) -> Role {
    match current {
        Role::Owner => Role::Tenant,
        Role::Tenant => Role::Owner,
    }
}

enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Default)]
struct ViewData {
    users_selected: usize,
    properties_selected: usize,
    field_selected: usize,
    editing: Option<(EditTarget, String)>,
    status_token: u64,
}

impl ViewData {
    fn selected(&self, tab: TabKind) -> usize {
        match tab {
            TabKind::Users => self.users_selected,
            TabKind::Properties => self.properties_selected,
        }
    }

    fn selected_mut(&mut self, tab: TabKind) -> &mut usize {
        match tab {
            TabKind::Users => &mut self.users_selected,
            TabKind::Properties => &mut self.properties_selected,
        }
    }
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    for tab in TabKind::ALL {
        if let Err(error) = runtime.refresh(tab) {
            emit_status(
                state,
                &mut view_data,
                &internal_tx,
                &format!("load failed: {error:#}"),
            );
        }
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, runtime, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event
            && let Event::Key(key) = event::read().context("read event")?
            && handle_key_event(state, runtime, &mut view_data, &internal_tx, key)
        {
            break;
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(state: &mut AppState, view_data: &ViewData, rx: &Receiver<InternalEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: &str,
) {
    state.set_status(message);
    view_data.status_token = view_data.status_token.saturating_add(1);
    let token = view_data.status_token;
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(STATUS_SECONDS));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn filtered_indexes<R: AppRuntime>(state: &AppState, runtime: &R) -> Vec<usize> {
    match state.active_tab {
        TabKind::Users => matching_users(&runtime.user_rows(), &state.search, state.role_filter),
        TabKind::Properties => matching_properties(&runtime.property_rows(), &state.search),
    }
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    match state.mode {
        AppMode::Nav => handle_nav_key(state, runtime, view_data, internal_tx, key),
        AppMode::Search => {
            handle_search_key(state, key);
            false
        }
        AppMode::Detail => {
            handle_detail_key(state, runtime, view_data, internal_tx, key);
            false
        }
    }
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let filtered = filtered_indexes(state, runtime);
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Tab | KeyCode::Right => {
            state.dispatch(AppCommand::NextTab);
        }
        KeyCode::BackTab | KeyCode::Left => {
            state.dispatch(AppCommand::PrevTab);
        }
        KeyCode::Char('/') => {
            state.search.clear();
            state.dispatch(AppCommand::EnterSearch);
        }
        KeyCode::Char('f') => {
            if state.active_tab == TabKind::Users {
                state.dispatch(AppCommand::CycleRoleFilter);
                let label = state.role_filter.label().to_owned();
                emit_status(state, view_data, internal_tx, &label);
            }
        }
        KeyCode::Char('r') => {
            let message = match runtime.refresh(state.active_tab) {
                Ok(()) => "refreshed".to_owned(),
                Err(error) => format!("refresh failed: {error:#}"),
            };
            emit_status(state, view_data, internal_tx, &message);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            let selected = view_data.selected_mut(state.active_tab);
            if *selected + 1 < filtered.len() {
                *selected += 1;
            }
        }
        KeyCode::Up | KeyCode::Char('k') => {
            let selected = view_data.selected_mut(state.active_tab);
            *selected = selected.saturating_sub(1);
        }
        KeyCode::Enter => {
            let Some(&row_index) = filtered.get(view_data.selected(state.active_tab)) else {
                return false;
            };
            view_data.field_selected = 0;
            view_data.editing = None;
            state.dispatch(AppCommand::EnterDetail);
            if let Err(error) = runtime.open_detail(state.active_tab, row_index) {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    &format!("load failed: {error:#}"),
                );
            }
        }
        _ => {}
    }
    false
}

fn handle_search_key(state: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            state.search.clear();
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Enter => {
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Backspace => {
            state.dispatch(AppCommand::SearchBackspace);
        }
        KeyCode::Char(ch) => {
            state.dispatch(AppCommand::SearchInput(ch));
        }
        _ => {}
    }
}

fn handle_detail_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if let Some((target, input)) = &mut view_data.editing {
        match key.code {
            KeyCode::Esc => {
                view_data.editing = None;
            }
            KeyCode::Enter => {
                let target = *target;
                let input = input.clone();
                view_data.editing = None;
                runtime.apply_edit(target, &input);
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(ch) => {
                input.push(ch);
            }
            _ => {}
        }
        return;
    }

    let fields = runtime.detail_fields();
    match key.code {
        KeyCode::Esc => {
            runtime.cancel();
            view_data.editing = None;
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if view_data.field_selected + 1 < fields.len() {
                view_data.field_selected += 1;
            }
        }
        KeyCode::Up | KeyCode::Char('k') => {
            view_data.field_selected = view_data.field_selected.saturating_sub(1);
        }
        KeyCode::Enter => {
            let Some(field) = fields.get(view_data.field_selected) else {
                return;
            };
            let Some(target) = field.target else {
                return;
            };
            if target == EditTarget::UserRole {
                // Role is a closed enum; Enter cycles it instead of editing text.
                let next = match Role::parse(&field.value.to_lowercase()) {
                    Some(current) => next_role(current),
                    None => Role::Owner,
                };
                runtime.apply_edit(target, next.as_str());
            } else {
                view_data.editing = Some((target, field.value.clone()));
            }
        }
        KeyCode::Char('s') => {
            if runtime.is_loading() {
                emit_status(state, view_data, internal_tx, "still loading");
                return;
            }
            if !runtime.is_dirty() {
                emit_status(state, view_data, internal_tx, "no changes to save");
                return;
            }
            match runtime.save() {
                Ok(SaveResult::Saved) => {
                    state.dispatch(AppCommand::ExitToNav);
                    emit_status(state, view_data, internal_tx, "saved");
                }
                Ok(SaveResult::NothingOpen) => {}
                Err(error) => {
                    // A partial save may have landed before the failure.
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        &format!(
                            "save failed: {error:#}; earlier steps may already be saved, retry to finish"
                        ),
                    );
                }
            }
        }
        _ => {}
    }
}

fn render<R: AppRuntime>(
    frame: &mut ratatui::Frame<'_>,
    state: &AppState,
    runtime: &R,
    view_data: &ViewData,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_tabs(frame, state, chunks[0]);
    render_header(frame, state, chunks[1]);

    if state.mode == AppMode::Detail {
        let halves = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[2]);
        render_table(frame, state, runtime, view_data, halves[0]);
        render_detail(frame, runtime, view_data, halves[1]);
    } else {
        render_table(frame, state, runtime, view_data, chunks[2]);
    }

    render_status(frame, state, chunks[3]);
}

fn render_tabs(frame: &mut ratatui::Frame<'_>, state: &AppState, area: Rect) {
    let titles: Vec<&str> = TabKind::ALL.iter().map(|tab| tab.label()).collect();
    let selected = TabKind::ALL
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .block(Block::default().borders(Borders::ALL).title("kontor"))
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, area);
}

fn render_header(frame: &mut ratatui::Frame<'_>, state: &AppState, area: Rect) {
    let search = if state.mode == AppMode::Search {
        format!("/{}_", state.search)
    } else if state.search.is_empty() {
        "(press / to search)".to_owned()
    } else {
        format!("/{}", state.search)
    };
    let filter = if state.active_tab == TabKind::Users {
        format!("  filter: {} (f cycles)", state.role_filter.label())
    } else {
        String::new()
    };
    let header = Paragraph::new(format!("{search}{filter}"))
        .block(Block::default().borders(Borders::ALL).title("search"));
    frame.render_widget(header, area);
}

fn render_table<R: AppRuntime>(
    frame: &mut ratatui::Frame<'_>,
    state: &AppState,
    runtime: &R,
    view_data: &ViewData,
    area: Rect,
) {
    let filtered = filtered_indexes(state, runtime);
    let selected = view_data
        .selected(state.active_tab)
        .min(filtered.len().saturating_sub(1));

    let (header, rows, widths): (Vec<&str>, Vec<Row<'_>>, Vec<Constraint>) =
        match state.active_tab {
            TabKind::Users => {
                let users = runtime.user_rows();
                let rows = filtered
                    .iter()
                    .filter_map(|&index| users.get(index))
                    .map(|user| Row::new(user_table_row(user).to_vec()))
                    .collect();
                (
                    vec!["Name", "Email", "Role", "City"],
                    rows,
                    vec![
                        Constraint::Percentage(30),
                        Constraint::Percentage(35),
                        Constraint::Percentage(10),
                        Constraint::Percentage(25),
                    ],
                )
            }
            TabKind::Properties => {
                let properties = runtime.property_rows();
                let rows = filtered
                    .iter()
                    .filter_map(|&index| properties.get(index))
                    .map(|property| Row::new(property_table_row(property).to_vec()))
                    .collect();
                (
                    vec!["Label", "Address", "Units"],
                    rows,
                    vec![
                        Constraint::Percentage(35),
                        Constraint::Percentage(45),
                        Constraint::Percentage(20),
                    ],
                )
            }
        };

    let title = format!("{} ({})", state.active_tab.label(), filtered.len());
    let table = Table::new(rows, widths)
        .header(Row::new(header).style(Style::default().add_modifier(Modifier::BOLD)))
        .row_highlight_style(Style::default().bg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL).title(title));

    let mut table_state = TableState::default();
    if !filtered.is_empty() {
        table_state.select(Some(selected));
    }
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn render_detail<R: AppRuntime>(
    frame: &mut ratatui::Frame<'_>,
    runtime: &R,
    view_data: &ViewData,
    area: Rect,
) {
    let title = if runtime.is_dirty() {
        "detail (modified)"
    } else {
        "detail"
    };

    let body = if runtime.is_loading() {
        "loading...".to_owned()
    } else if !runtime.is_open() || runtime.detail_fields().is_empty() {
        "nothing loaded -- Esc to go back".to_owned()
    } else {
        let fields = runtime.detail_fields();
        let mut lines = Vec::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            let marker = if index == view_data.field_selected {
                ">"
            } else {
                " "
            };
            let line = match (&view_data.editing, field.target) {
                (Some((editing, input)), Some(target)) if *editing == target => {
                    format!("{marker} {}: {input}_", field.label)
                }
                (_, Some(_)) => format!("{marker} {}: {}", field.label, field.value),
                (_, None) if field.value.is_empty() => format!("{marker} [{}]", field.label),
                (_, None) => format!("{marker} [{}] {}", field.label, field.value),
            };
            lines.push(line);
        }
        lines.join("\n")
    };

    let pane =
        Paragraph::new(body).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(pane, area);
}

fn render_status(frame: &mut ratatui::Frame<'_>, state: &AppState, area: Rect) {
    let text = state.status_line.clone().unwrap_or_else(|| {
        "Enter open/edit  s save  Esc back  / search  f filter  r refresh  q quit".to_owned()
    });
    let status = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, area);
}
