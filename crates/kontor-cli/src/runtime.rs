// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use kontor_api::{ApiClient, PropertyBackend, UserBackend};
use kontor_app::{
    EntityController, Property, PropertyEdit, Role, SaveOutcome, TabKind, User, UserEdit,
};
use kontor_tui::{DetailField, EditTarget, SaveResult, property_detail_fields, user_detail_fields};

/// Drives both entity controllers from the synchronous event loop. All
/// backend futures run to completion on a current-thread tokio runtime, so
/// at most one request batch is in flight at a time.
pub struct HttpRuntime {
    runtime: tokio::runtime::Runtime,
    users: EntityController<UserBackend>,
    properties: EntityController<PropertyBackend>,
    open_tab: Option<TabKind>,
}

impl HttpRuntime {
    pub fn new(client: ApiClient) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            users: EntityController::new(UserBackend::new(client.clone())),
            properties: EntityController::new(PropertyBackend::new(client)),
            open_tab: None,
        })
    }

    fn user_edit(target: EditTarget, value: &str) -> Option<UserEdit> {
        match target {
            EditTarget::UserBase(field) => Some(UserEdit::Base(field, value.to_owned())),
            EditTarget::UserRole => Role::parse(value).map(UserEdit::Role),
            EditTarget::UserAddress(field) => Some(UserEdit::Address(field, value.to_owned())),
            EditTarget::UserBank(index, field) => {
                Some(UserEdit::BankAccount(index, field, value.to_owned()))
            }
            _ => None,
        }
    }

    fn property_edit(target: EditTarget, value: &str) -> Option<PropertyEdit> {
        match target {
            EditTarget::PropertyLabel => Some(PropertyEdit::Label(value.to_owned())),
            EditTarget::PropertyAddress(field) => {
                Some(PropertyEdit::Address(field, value.to_owned()))
            }
            EditTarget::PropertyOperatingBank(field) => {
                Some(PropertyEdit::OperatingBank(field, value.to_owned()))
            }
            EditTarget::PropertyReserveBank(field) => {
                Some(PropertyEdit::ReserveBank(field, value.to_owned()))
            }
            _ => None,
        }
    }
}

impl kontor_tui::AppRuntime for HttpRuntime {
    fn refresh(&mut self, tab: TabKind) -> Result<()> {
        match tab {
            TabKind::Users => self.runtime.block_on(self.users.refresh_list()),
            TabKind::Properties => self.runtime.block_on(self.properties.refresh_list()),
        }
    }

    fn user_rows(&self) -> Vec<User> {
        self.users.rows().to_vec()
    }

    fn property_rows(&self) -> Vec<Property> {
        self.properties.rows().to_vec()
    }

    fn open_detail(&mut self, tab: TabKind, index: usize) -> Result<()> {
        self.open_tab = Some(tab);
        match tab {
            TabKind::Users => {
                let id = self
                    .users
                    .rows()
                    .get(index)
                    .map(|user| user.id)
                    .ok_or_else(|| anyhow!("no user row at index {index}"))?;
                self.runtime.block_on(self.users.open_detail(id))
            }
            TabKind::Properties => {
                let id = self
                    .properties
                    .rows()
                    .get(index)
                    .map(|property| property.id)
                    .ok_or_else(|| anyhow!("no property row at index {index}"))?;
                self.runtime.block_on(self.properties.open_detail(id))
            }
        }
    }

    fn detail_fields(&self) -> Vec<DetailField> {
        match self.open_tab {
            Some(TabKind::Users) => self
                .users
                .buffer()
                .map(user_detail_fields)
                .unwrap_or_default(),
            Some(TabKind::Properties) => self
                .properties
                .buffer()
                .map(property_detail_fields)
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    fn is_open(&self) -> bool {
        match self.open_tab {
            Some(TabKind::Users) => self.users.is_open(),
            Some(TabKind::Properties) => self.properties.is_open(),
            None => false,
        }
    }

    fn is_loading(&self) -> bool {
        match self.open_tab {
            Some(TabKind::Users) => self.users.is_loading(),
            Some(TabKind::Properties) => self.properties.is_loading(),
            None => false,
        }
    }

    fn is_dirty(&self) -> bool {
        match self.open_tab {
            Some(TabKind::Users) => self.users.is_dirty(),
            Some(TabKind::Properties) => self.properties.is_dirty(),
            None => false,
        }
    }

    fn apply_edit(&mut self, target: EditTarget, value: &str) {
        match self.open_tab {
            Some(TabKind::Users) => {
                if let Some(edit) = Self::user_edit(target, value) {
                    self.users.update(edit);
                }
            }
            Some(TabKind::Properties) => {
                if let Some(edit) = Self::property_edit(target, value) {
                    self.properties.update(edit);
                }
            }
            None => {}
        }
    }

    fn save(&mut self) -> Result<SaveResult> {
        let outcome = match self.open_tab {
            Some(TabKind::Users) => self.runtime.block_on(self.users.save())?,
            Some(TabKind::Properties) => self.runtime.block_on(self.properties.save())?,
            None => SaveOutcome::NoSession,
        };
        match outcome {
            SaveOutcome::Saved => {
                self.open_tab = None;
                Ok(SaveResult::Saved)
            }
            SaveOutcome::NoSession => Ok(SaveResult::NothingOpen),
        }
    }

    fn cancel(&mut self) {
        match self.open_tab.take() {
            Some(TabKind::Users) => self.users.cancel(),
            Some(TabKind::Properties) => self.properties.cancel(),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HttpRuntime;
    use anyhow::Result;
    use kontor_api::ApiClient;
    use kontor_app::{AddressField, TabKind, UserField};
    use kontor_testkit::{DirectoryFaker, FixtureServer};
    use kontor_tui::{AppRuntime, EditTarget, SaveResult};
    use std::time::Duration;

    fn runtime_against(server: &FixtureServer) -> Result<HttpRuntime> {
        let client = ApiClient::new(server.base_url(), Duration::from_secs(5))?;
        HttpRuntime::new(client)
    }

    #[test]
    fn refresh_open_edit_save_roundtrip() -> Result<()> {
        let dataset = DirectoryFaker::new(7).directory(3, 2);
        let server = FixtureServer::start(&dataset)?;
        let mut runtime = runtime_against(&server)?;

        runtime.refresh(TabKind::Users)?;
        assert_eq!(runtime.user_rows().len(), 3);

        runtime.open_detail(TabKind::Users, 0)?;
        assert!(runtime.is_open());
        assert!(!runtime.is_loading());
        assert!(!runtime.is_dirty());
        assert!(!runtime.detail_fields().is_empty());

        runtime.apply_edit(EditTarget::UserBase(UserField::Email), "new@example.com");
        assert!(runtime.is_dirty());

        assert_eq!(runtime.save()?, SaveResult::Saved);
        assert!(!runtime.is_open());

        // save refreshes the list, so the patched email is visible in the rows
        assert!(
            runtime
                .user_rows()
                .iter()
                .any(|user| user.email == "new@example.com")
        );
        Ok(())
    }

    #[test]
    fn cancel_discards_buffered_edits() -> Result<()> {
        let dataset = DirectoryFaker::new(11).directory(2, 1);
        let server = FixtureServer::start(&dataset)?;
        let mut runtime = runtime_against(&server)?;

        runtime.refresh(TabKind::Users)?;
        runtime.open_detail(TabKind::Users, 1)?;
        runtime.apply_edit(EditTarget::UserAddress(AddressField::City), "Bremen");
        assert!(runtime.is_dirty());

        runtime.cancel();
        assert!(!runtime.is_open());
        assert_eq!(runtime.save()?, SaveResult::NothingOpen);
        Ok(())
    }

    #[test]
    fn property_tab_uses_the_property_controller() -> Result<()> {
        let dataset = DirectoryFaker::new(3).directory(1, 2);
        let server = FixtureServer::start(&dataset)?;
        let mut runtime = runtime_against(&server)?;

        runtime.refresh(TabKind::Properties)?;
        assert_eq!(runtime.property_rows().len(), 2);

        runtime.open_detail(TabKind::Properties, 0)?;
        assert!(runtime.is_open());

        runtime.apply_edit(EditTarget::PropertyLabel, "WEG Neue Zeile 1");
        assert!(runtime.is_dirty());
        assert_eq!(runtime.save()?, SaveResult::Saved);
        assert!(
            runtime
                .property_rows()
                .iter()
                .any(|property| property.property_label == "WEG Neue Zeile 1")
        );
        Ok(())
    }

    #[test]
    fn open_detail_with_stale_index_fails() -> Result<()> {
        let dataset = DirectoryFaker::new(5).directory(1, 1);
        let server = FixtureServer::start(&dataset)?;
        let mut runtime = runtime_against(&server)?;

        runtime.refresh(TabKind::Users)?;
        let error = runtime
            .open_detail(TabKind::Users, 9)
            .expect_err("out-of-range row should fail");
        assert!(error.to_string().contains("no user row"));
        Ok(())
    }
}
