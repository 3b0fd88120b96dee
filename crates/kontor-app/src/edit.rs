// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::controller::EntityRecord;
use crate::model::{Address, BankAccount, Property, Role, UserDetail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    Street,
    HouseNumber,
    AddressLine1,
    AddressLine2,
    PostalCode,
    City,
    Country,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankField {
    AccountOwner,
    Iban,
    Bank,
    Bic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    FirstName,
    LastName,
    Email,
    Username,
}

/// One field rewrite inside a user edit buffer. The bank variant addresses
/// an account by its position in the merged record's array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEdit {
    Base(UserField, String),
    Role(Role),
    Address(AddressField, String),
    BankAccount(usize, BankField, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyEdit {
    Label(String),
    Address(AddressField, String),
    OperatingBank(BankField, String),
    ReserveBank(BankField, String),
}

impl Address {
    pub fn set_field(&mut self, field: AddressField, value: String) {
        match field {
            AddressField::Street => self.street = value,
            AddressField::HouseNumber => self.house_number = value,
            AddressField::AddressLine1 => self.address_line_1 = Some(value),
            AddressField::AddressLine2 => self.address_line_2 = Some(value),
            AddressField::PostalCode => self.postal_code = value,
            AddressField::City => self.city = value,
            AddressField::Country => self.country = value,
        }
    }

    pub fn field(&self, field: AddressField) -> &str {
        match field {
            AddressField::Street => &self.street,
            AddressField::HouseNumber => &self.house_number,
            AddressField::AddressLine1 => self.address_line_1.as_deref().unwrap_or(""),
            AddressField::AddressLine2 => self.address_line_2.as_deref().unwrap_or(""),
            AddressField::PostalCode => &self.postal_code,
            AddressField::City => &self.city,
            AddressField::Country => &self.country,
        }
    }
}

impl BankAccount {
    pub fn set_field(&mut self, field: BankField, value: String) {
        match field {
            BankField::AccountOwner => self.account_owner = value,
            BankField::Iban => self.iban = value,
            BankField::Bank => self.bank = value,
            BankField::Bic => self.bic = value,
        }
    }

    pub fn field(&self, field: BankField) -> &str {
        match field {
            BankField::AccountOwner => &self.account_owner,
            BankField::Iban => &self.iban,
            BankField::Bank => &self.bank,
            BankField::Bic => &self.bic,
        }
    }
}

impl UserDetail {
    /// Rewrites exactly one field. An out-of-range bank index is a no-op;
    /// the editing surface only offers indexes that exist.
    pub fn apply_edit(&mut self, edit: UserEdit) {
        match edit {
            UserEdit::Base(field, value) => match field {
                UserField::FirstName => self.base.first_name = value,
                UserField::LastName => self.base.last_name = value,
                UserField::Email => self.base.email = value,
                UserField::Username => self.base.username = value,
            },
            UserEdit::Role(role) => self.base.role = role,
            UserEdit::Address(field, value) => self.base.address.set_field(field, value),
            UserEdit::BankAccount(index, field, value) => {
                if let Some(account) = self.bank_accounts.get_mut(index) {
                    account.set_field(field, value);
                }
            }
        }
    }
}

impl Property {
    pub fn apply_edit(&mut self, edit: PropertyEdit) {
        match edit {
            PropertyEdit::Label(value) => self.property_label = value,
            PropertyEdit::Address(field, value) => self.address.set_field(field, value),
            PropertyEdit::OperatingBank(field, value) => {
                if let Some(account) = &mut self.operating_bank {
                    account.set_field(field, value);
                }
            }
            PropertyEdit::ReserveBank(field, value) => {
                if let Some(account) = &mut self.reserve_bank {
                    account.set_field(field, value);
                }
            }
        }
    }
}

impl EntityRecord for UserDetail {
    type Edit = UserEdit;

    fn apply(&mut self, edit: UserEdit) {
        self.apply_edit(edit);
    }
}

impl EntityRecord for Property {
    type Edit = PropertyEdit;

    fn apply(&mut self, edit: PropertyEdit) {
        self.apply_edit(edit);
    }
}

impl AddressField {
    pub const ALL: [Self; 7] = [
        Self::Street,
        Self::HouseNumber,
        Self::AddressLine1,
        Self::AddressLine2,
        Self::PostalCode,
        Self::City,
        Self::Country,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Street => "Street",
            Self::HouseNumber => "House number",
            Self::AddressLine1 => "Address line 1",
            Self::AddressLine2 => "Address line 2",
            Self::PostalCode => "Postal code",
            Self::City => "City",
            Self::Country => "Country",
        }
    }
}

impl BankField {
    pub const ALL: [Self; 4] = [Self::AccountOwner, Self::Iban, Self::Bank, Self::Bic];

    pub const fn label(self) -> &'static str {
        match self {
            Self::AccountOwner => "Account owner",
            Self::Iban => "IBAN",
            Self::Bank => "Bank",
            Self::Bic => "BIC",
        }
    }
}

impl UserField {
    pub const ALL: [Self; 4] = [
        Self::FirstName,
        Self::LastName,
        Self::Email,
        Self::Username,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::Email => "Email",
            Self::Username => "Username",
        }
    }
}
