// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::model::{Property, Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabKind {
    Users,
    Properties,
}

impl TabKind {
    pub const ALL: [Self; 2] = [Self::Users, Self::Properties];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Users => "Users",
            Self::Properties => "Properties",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Nav,
    Search,
    Detail,
}

/// Role restriction for the users table. Properties ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFilter {
    All,
    Owner,
    Tenant,
}

impl RoleFilter {
    pub const ALL: [Self; 3] = [Self::All, Self::Owner, Self::Tenant];

    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "all roles",
            Self::Owner => "owners",
            Self::Tenant => "tenants",
        }
    }

    pub fn accepts(self, role: Role) -> bool {
        match self {
            Self::All => true,
            Self::Owner => role == Role::Owner,
            Self::Tenant => role == Role::Tenant,
        }
    }

    fn next(self) -> Self {
        match self {
            Self::All => Self::Owner,
            Self::Owner => Self::Tenant,
            Self::Tenant => Self::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub active_tab: TabKind,
    pub search: String,
    pub role_filter: RoleFilter,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            active_tab: TabKind::Users,
            search: String::new(),
            role_filter: RoleFilter::All,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    EnterSearch,
    SearchInput(char),
    SearchBackspace,
    CycleRoleFilter,
    EnterDetail,
    ExitToNav,
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    TabChanged(TabKind),
    SearchChanged(String),
    RoleFilterChanged(RoleFilter),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::EnterSearch => {
                self.mode = AppMode::Search;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::SearchInput(ch) => {
                self.search.push(ch);
                vec![AppEvent::SearchChanged(self.search.clone())]
            }
            AppCommand::SearchBackspace => {
                self.search.pop();
                vec![AppEvent::SearchChanged(self.search.clone())]
            }
            AppCommand::CycleRoleFilter => {
                self.role_filter = self.role_filter.next();
                vec![
                    AppEvent::RoleFilterChanged(self.role_filter),
                    self.set_status(self.role_filter.label()),
                ]
            }
            AppCommand::EnterDetail => {
                self.mode = AppMode::Detail;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ExitToNav => {
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    pub fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = TabKind::ALL;
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        vec![AppEvent::TabChanged(self.active_tab)]
    }
}

/// Indexes into `rows` whose user matches the search term and role filter.
/// Matching is case-insensitive over name, email and city.
pub fn matching_users(rows: &[User], search: &str, filter: RoleFilter) -> Vec<usize> {
    let needle = search.to_lowercase();
    rows.iter()
        .enumerate()
        .filter(|(_, user)| filter.accepts(user.role))
        .filter(|(_, user)| {
            needle.is_empty() || {
                let haystack = format!(
                    "{} {} {} {}",
                    user.first_name, user.last_name, user.email, user.address.city
                )
                .to_lowercase();
                haystack.contains(&needle)
            }
        })
        .map(|(index, _)| index)
        .collect()
}

/// Indexes into `rows` whose property matches on label, street or postal code.
pub fn matching_properties(rows: &[Property], search: &str) -> Vec<usize> {
    let needle = search.to_lowercase();
    rows.iter()
        .enumerate()
        .filter(|(_, property)| {
            needle.is_empty() || {
                let haystack = format!(
                    "{} {} {}",
                    property.property_label, property.address.street, property.address.postal_code
                )
                .to_lowercase();
                haystack.contains(&needle)
            }
        })
        .map(|(index, _)| index)
        .collect()
}
