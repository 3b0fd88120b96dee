// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod error;

pub use error::ApiError;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use kontor_app::{
    Address, AddressId, BankAccount, BankAccountId, EntityBackend, Property, PropertyId, Role,
    User, UserDetail, UserId,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Thin typed wrapper over the backend's REST surface. Clones share the
/// underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        if Url::parse(&base_url).is_err() {
            bail!("api.base_url {base_url:?} is not a valid URL -- expected something like http://localhost:8000/api");
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        what: &'static str,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .get(format!("{}/{path}", self.base_url))
            .send()
            .await
            .map_err(|source| self.network(source))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| self.network(source))?;
        if !status.is_success() {
            return Err(ApiError::rejected(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|source| ApiError::Decode { what, source })
    }

    async fn patch_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let response = self
            .http
            .patch(format!("{}/{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|source| self.network(source))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::rejected(status.as_u16(), &body));
        }
        Ok(())
    }

    fn network(&self, source: reqwest::Error) -> ApiError {
        ApiError::Network {
            base_url: self.base_url.clone(),
            source,
        }
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.get_json("users/", "user list").await
    }

    pub async fn fetch_user(&self, id: UserId) -> Result<User, ApiError> {
        self.get_json(&format!("users/{}/", id.get()), "user").await
    }

    pub async fn fetch_user_bank_accounts(
        &self,
        id: UserId,
    ) -> Result<Vec<BankAccount>, ApiError> {
        self.get_json(&format!("users/{}/bank_accounts/", id.get()), "bank accounts")
            .await
    }

    pub async fn fetch_user_properties(&self, id: UserId) -> Result<Vec<Property>, ApiError> {
        self.get_json(&format!("users/{}/properties/", id.get()), "owned properties")
            .await
    }

    pub async fn list_properties(&self) -> Result<Vec<Property>, ApiError> {
        self.get_json("properties/", "property list").await
    }

    pub async fn fetch_property(&self, id: PropertyId) -> Result<Property, ApiError> {
        self.get_json(&format!("properties/{}/", id.get()), "property")
            .await
    }

    pub async fn update_user(&self, id: UserId, patch: &UserPatch<'_>) -> Result<(), ApiError> {
        self.patch_json(&format!("users/{}/", id.get()), patch).await
    }

    pub async fn update_property(
        &self,
        id: PropertyId,
        patch: &PropertyPatch<'_>,
    ) -> Result<(), ApiError> {
        self.patch_json(&format!("properties/{}/", id.get()), patch)
            .await
    }

    pub async fn update_address(
        &self,
        id: AddressId,
        patch: &AddressPatch<'_>,
    ) -> Result<(), ApiError> {
        self.patch_json(&format!("addresses/{}/", id.get()), patch)
            .await
    }

    pub async fn update_bank_account(
        &self,
        id: BankAccountId,
        patch: &BankAccountPatch<'_>,
    ) -> Result<(), ApiError> {
        self.patch_json(&format!("bank-accounts/{}/", id.get()), patch)
            .await
    }
}

/// Scalar fields of the base user record. Address and bank accounts go
/// through their own endpoints.
#[derive(Debug, Serialize)]
pub struct UserPatch<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub role: Role,
}

impl<'a> From<&'a User> for UserPatch<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            first_name: &user.first_name,
            last_name: &user.last_name,
            email: &user.email,
            username: &user.username,
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PropertyPatch<'a> {
    pub property_label: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AddressPatch<'a> {
    pub street: &'a str,
    pub house_number: &'a str,
    pub address_line_1: Option<&'a str>,
    pub address_line_2: Option<&'a str>,
    pub postal_code: &'a str,
    pub city: &'a str,
    pub country: &'a str,
}

impl<'a> From<&'a Address> for AddressPatch<'a> {
    fn from(address: &'a Address) -> Self {
        Self {
            street: &address.street,
            house_number: &address.house_number,
            address_line_1: address.address_line_1.as_deref(),
            address_line_2: address.address_line_2.as_deref(),
            postal_code: &address.postal_code,
            city: &address.city,
            country: &address.country,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BankAccountPatch<'a> {
    pub account_owner_text: &'a str,
    pub iban: &'a str,
    pub bank: &'a str,
    pub bic: &'a str,
}

impl<'a> From<&'a BankAccount> for BankAccountPatch<'a> {
    fn from(account: &'a BankAccount) -> Self {
        Self {
            account_owner_text: &account.account_owner,
            iban: &account.iban,
            bank: &account.bank,
            bic: &account.bic,
        }
    }
}

/// Backend for the users table: detail fetches merge three endpoints,
/// saves fan out into one PATCH per touched resource.
#[derive(Debug, Clone)]
pub struct UserBackend {
    client: ApiClient,
}

impl UserBackend {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait(?Send)]
impl EntityBackend for UserBackend {
    type Id = UserId;
    type Summary = User;
    type Record = UserDetail;

    async fn fetch_list(&self) -> Result<Vec<User>> {
        Ok(self.client.list_users().await?)
    }

    async fn fetch_detail(&self, id: UserId) -> Result<UserDetail> {
        let (base, bank_accounts, properties) = tokio::try_join!(
            self.client.fetch_user(id),
            self.client.fetch_user_bank_accounts(id),
            self.client.fetch_user_properties(id),
        )
        .context("load user detail")?;

        Ok(UserDetail {
            base,
            bank_accounts,
            properties,
        })
    }

    async fn push_record(&self, record: &UserDetail) -> Result<()> {
        self.client
            .update_user(record.base.id, &UserPatch::from(&record.base))
            .await
            .context("save user")?;

        if let Some(address_id) = record.base.address.id {
            self.client
                .update_address(address_id, &AddressPatch::from(&record.base.address))
                .await
                .context("save user address")?;
        }

        for account in &record.bank_accounts {
            self.client
                .update_bank_account(account.id, &BankAccountPatch::from(account))
                .await
                .with_context(|| format!("save bank account {}", account.iban))?;
        }

        Ok(())
    }
}

/// Backend for the properties table. The detail endpoint already embeds
/// banks and buildings, so one fetch suffices.
#[derive(Debug, Clone)]
pub struct PropertyBackend {
    client: ApiClient,
}

impl PropertyBackend {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait(?Send)]
impl EntityBackend for PropertyBackend {
    type Id = PropertyId;
    type Summary = Property;
    type Record = Property;

    async fn fetch_list(&self) -> Result<Vec<Property>> {
        Ok(self.client.list_properties().await?)
    }

    async fn fetch_detail(&self, id: PropertyId) -> Result<Property> {
        Ok(self.client.fetch_property(id).await?)
    }

    async fn push_record(&self, record: &Property) -> Result<()> {
        self.client
            .update_property(
                record.id,
                &PropertyPatch {
                    property_label: &record.property_label,
                },
            )
            .await
            .context("save property")?;

        if let Some(address_id) = record.address.id {
            self.client
                .update_address(address_id, &AddressPatch::from(&record.address))
                .await
                .context("save property address")?;
        }

        for account in [&record.operating_bank, &record.reserve_bank]
            .into_iter()
            .flatten()
        {
            self.client
                .update_bank_account(account.id, &BankAccountPatch::from(account))
                .await
                .with_context(|| format!("save bank account {}", account.iban))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiClient, BankAccountPatch, UserPatch};
    use anyhow::Result;
    use kontor_app::Role;
    use std::time::Duration;

    #[test]
    fn client_rejects_malformed_base_urls() {
        let err = ApiClient::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("http://localhost:8000/api"));

        let err = ApiClient::new("", Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn client_normalizes_trailing_slashes() -> Result<()> {
        let client = ApiClient::new("http://localhost:8000/api/", Duration::from_secs(1))?;
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        Ok(())
    }

    #[test]
    fn user_patch_serializes_only_base_scalars() -> Result<()> {
        let patch = UserPatch {
            first_name: "Greta",
            last_name: "Brandt",
            email: "greta@example.com",
            username: "gbrandt",
            role: Role::Tenant,
        };
        let encoded = serde_json::to_string(&patch)?;
        assert!(encoded.contains("\"role\":\"tenant\""));
        assert!(!encoded.contains("address"));
        assert!(!encoded.contains("bank"));
        Ok(())
    }

    #[test]
    fn bank_account_patch_uses_the_wire_owner_field() -> Result<()> {
        let patch = BankAccountPatch {
            account_owner_text: "WEG Lindenstr.",
            iban: "DE02120300000000202051",
            bank: "Sparkasse",
            bic: "BYLADEM1001",
        };
        let encoded = serde_json::to_string(&patch)?;
        assert!(encoded.contains("\"account_owner_text\":\"WEG Lindenstr.\""));
        Ok(())
    }
}
