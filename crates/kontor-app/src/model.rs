// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Tenant,
}

impl Role {
    pub const ALL: [Self; 2] = [Self::Owner, Self::Tenant];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Tenant => "tenant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(Self::Owner),
            "tenant" => Some(Self::Tenant),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Tenant => "Tenant",
        }
    }
}

/// Postal address owned by exactly one parent record (user or building or
/// property). A missing id means the row has not been persisted yet and must
/// not be PATCHed on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: Option<AddressId>,
    pub street: String,
    pub house_number: String,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub postal_code: String,
    pub city: String,
    pub country: String,
}

impl Address {
    /// "12 Lindenstr., 10115 Berlin" -- the composed form the tables show.
    pub fn oneline(&self) -> String {
        format!(
            "{} {}, {} {}",
            self.house_number, self.street, self.postal_code, self.city
        )
    }
}

/// Referenced (not owned) by users and properties; always persisted, so the
/// id is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: BankAccountId,
    #[serde(rename = "account_owner_text")]
    pub account_owner: String,
    pub iban: String,
    pub bank: String,
    pub bic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub unit_type: String,
    pub share: f64,
    pub area: f64,
    pub heating_area: f64,
    pub capacity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub building_type: String,
    pub building_label: String,
    pub total_shares: i64,
    pub address: Address,
    #[serde(rename = "building_apartments")]
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub property_label: String,
    pub address: Address,
    #[serde(rename = "weg_bank")]
    pub operating_bank: Option<BankAccount>,
    #[serde(rename = "ruecklagen_bank")]
    pub reserve_bank: Option<BankAccount>,
    pub buildings: Vec<Building>,
}

impl Property {
    pub fn unit_count(&self) -> usize {
        self.buildings.iter().map(|building| building.units.len()).sum()
    }
}

/// Base user record as the list and detail endpoints return it; bank
/// accounts and owned properties live behind their own sub-endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub address: Address,
}

/// Full user record merged from the base fetch plus the bank-account and
/// property sub-fetches. Created when a detail view opens, discarded when
/// it closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub base: User,
    pub bank_accounts: Vec<BankAccount>,
    #[serde(rename = "property_owners")]
    pub properties: Vec<Property>,
}

#[cfg(test)]
mod tests {
    use super::{Address, Role};
    use crate::ids::AddressId;

    #[test]
    fn role_round_trips_through_wire_names() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("admin"), None);
    }

    #[test]
    fn address_oneline_composes_house_number_first() {
        let address = Address {
            id: Some(AddressId::new(3)),
            street: "Lindenstr.".to_owned(),
            house_number: "12".to_owned(),
            address_line_1: None,
            address_line_2: None,
            postal_code: "10115".to_owned(),
            city: "Berlin".to_owned(),
            country: "Germany".to_owned(),
        };
        assert_eq!(address.oneline(), "12 Lindenstr., 10115 Berlin");
    }
}
