// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use kontor_app::{
    Address, AddressId, BankAccount, BankAccountId, Building, BuildingId, Property, PropertyId,
    Role, Unit, UnitId, User, UserDetail, UserId,
};
use serde_json::{Value, json};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const FIRST_NAMES: [&str; 16] = [
    "Anna", "Lukas", "Mia", "Jonas", "Lea", "Finn", "Emma", "Paul", "Greta", "Max", "Clara",
    "Felix", "Johanna", "Nils", "Sofia", "Erik",
];
const LAST_NAMES: [&str; 16] = [
    "Müller", "Schmidt", "Schneider", "Fischer", "Weber", "Meyer", "Wagner", "Becker", "Hoffmann",
    "Schulz", "Koch", "Richter", "Klein", "Wolf", "Neumann", "Braun",
];
const STREETS: [&str; 12] = [
    "Lindenstraße",
    "Hauptstraße",
    "Gartenweg",
    "Schillerstraße",
    "Goethestraße",
    "Bahnhofstraße",
    "Ringstraße",
    "Birkenallee",
    "Mozartweg",
    "Am Stadtpark",
    "Feldstraße",
    "Uferweg",
];
const CITIES: [&str; 10] = [
    "Berlin",
    "Hamburg",
    "München",
    "Köln",
    "Leipzig",
    "Dresden",
    "Potsdam",
    "Frankfurt am Main",
    "Stuttgart",
    "Hannover",
];
const BANKS: [(&str, &str); 6] = [
    ("Sparkasse Berlin", "BELADEBEXXX"),
    ("Commerzbank", "COBADEFFXXX"),
    ("Deutsche Bank", "DEUTDEDBBER"),
    ("Volksbank", "GENODEF1XXX"),
    ("ING-DiBa", "INGDDEFFXXX"),
    ("Postbank", "PBNKDEFFXXX"),
];
const UNIT_TYPES: [&str; 3] = ["apartment", "commercial", "parking"];
const BUILDING_TYPES: [&str; 3] = ["Vorderhaus", "Hinterhaus", "Seitenflügel"];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator for a plausible German property-management directory.
/// Ids are unique across everything one faker instance produces.
#[derive(Debug, Clone)]
pub struct DirectoryFaker {
    rng: DeterministicRng,
    next_id: i64,
}

impl DirectoryFaker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(if seed == 0 { 1 } else { seed }),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as u64;
        min + (self.rng.next_u64() % span) as i64
    }

    pub fn address(&mut self) -> Address {
        Address {
            id: Some(AddressId::new(self.allocate_id())),
            street: self.pick(&STREETS).to_owned(),
            house_number: self.int_range(1, 160).to_string(),
            address_line_1: None,
            address_line_2: None,
            postal_code: format!("{:05}", self.int_range(10_115, 99_998)),
            city: self.pick(&CITIES).to_owned(),
            country: "Germany".to_owned(),
        }
    }

    pub fn iban(&mut self) -> String {
        format!(
            "DE{:02}{:08}{:010}",
            self.int_range(10, 99),
            self.int_range(10_000_000, 99_999_999),
            self.int_range(0, 9_999_999_999),
        )
    }

    pub fn bank_account(&mut self, owner: &str) -> BankAccount {
        let (bank, bic) = BANKS[self.rng.int_n(BANKS.len())];
        BankAccount {
            id: BankAccountId::new(self.allocate_id()),
            account_owner: owner.to_owned(),
            iban: self.iban(),
            bank: bank.to_owned(),
            bic: bic.to_owned(),
        }
    }

    pub fn unit(&mut self) -> Unit {
        Unit {
            id: UnitId::new(self.allocate_id()),
            unit_type: self.pick(&UNIT_TYPES).to_owned(),
            share: self.int_range(20, 400) as f64 / 10.0,
            area: self.int_range(250, 1_600) as f64 / 10.0,
            heating_area: self.int_range(200, 1_400) as f64 / 10.0,
            capacity: self.int_range(1, 6),
        }
    }

    pub fn building(&mut self) -> Building {
        let building_type = self.pick(&BUILDING_TYPES).to_owned();
        let units = (0..self.int_range(1, 3)).map(|_| self.unit()).collect();
        Building {
            id: BuildingId::new(self.allocate_id()),
            building_label: format!("{building_type} {}", self.int_range(1, 9)),
            building_type,
            total_shares: self.int_range(100, 1_000),
            address: self.address(),
            units,
        }
    }

    pub fn property(&mut self) -> Property {
        let address = self.address();
        let label = format!("WEG {} {}", address.street, address.house_number);
        let buildings = (0..self.int_range(1, 2)).map(|_| self.building()).collect();
        Property {
            id: PropertyId::new(self.allocate_id()),
            operating_bank: Some(self.bank_account(&label)),
            reserve_bank: Some(self.bank_account(&format!("{label} Rücklage"))),
            property_label: label,
            address,
            buildings,
        }
    }

    pub fn user(&mut self, role: Role) -> User {
        let first = self.pick(&FIRST_NAMES).to_owned();
        let last = self.pick(&LAST_NAMES).to_owned();
        let username = format!(
            "{}{}",
            first.to_lowercase().chars().next().unwrap_or('u'),
            last.to_lowercase().replace(['ü', 'ö', 'ä', 'ß'], "")
        );
        User {
            id: UserId::new(self.allocate_id()),
            email: format!("{username}@example.com"),
            first_name: first,
            last_name: last,
            username,
            role,
            address: self.address(),
        }
    }

    pub fn user_detail(&mut self, role: Role, properties: Vec<Property>) -> UserDetail {
        let base = self.user(role);
        let owner = format!("{} {}", base.first_name, base.last_name);
        let bank_accounts = (0..self.int_range(1, 2))
            .map(|_| self.bank_account(&owner))
            .collect();
        UserDetail {
            base,
            bank_accounts,
            properties,
        }
    }

    /// A whole directory: `properties` standalone properties and `users`
    /// users, owners holding a slice of the property list.
    pub fn directory(&mut self, users: usize, properties: usize) -> FixtureDataset {
        let properties: Vec<Property> = (0..properties).map(|_| self.property()).collect();
        let users = (0..users)
            .map(|index| {
                let role = if index % 2 == 0 { Role::Owner } else { Role::Tenant };
                let owned = if role == Role::Owner && !properties.is_empty() {
                    vec![properties[index % properties.len()].clone()]
                } else {
                    Vec::new()
                };
                self.user_detail(role, owned)
            })
            .collect();
        FixtureDataset { users, properties }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixtureDataset {
    pub users: Vec<UserDetail>,
    pub properties: Vec<Property>,
}

/// In-memory JSON documents the fixture server serves and patches.
#[derive(Debug, Clone)]
struct Store {
    users: Vec<Value>,
    properties: Vec<Value>,
}

impl Store {
    fn new(dataset: &FixtureDataset) -> Result<Self> {
        Ok(Self {
            users: dataset
                .users
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()
                .context("encode fixture users")?,
            properties: dataset
                .properties
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()
                .context("encode fixture properties")?,
        })
    }

    fn find(docs: &mut [Value], id: i64) -> Option<&mut Value> {
        docs.iter_mut().find(|doc| doc["id"].as_i64() == Some(id))
    }
}

fn shallow_merge(target: &mut Value, patch: &Value) {
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Merges `patch` into every embedded object that has `marker` as a key and
/// the wanted id. Addresses and bank accounts live nested inside user and
/// property documents, never as top-level rows.
fn patch_embedded(doc: &mut Value, marker: &str, id: i64, patch: &Value) -> bool {
    match doc {
        Value::Object(map) => {
            if map.contains_key(marker) && map.get("id").and_then(Value::as_i64) == Some(id) {
                if let Some(patch) = patch.as_object() {
                    for (key, value) in patch {
                        map.insert(key.clone(), value.clone());
                    }
                }
                return true;
            }
            let mut hit = false;
            for value in map.values_mut() {
                hit |= patch_embedded(value, marker, id, patch);
            }
            hit
        }
        Value::Array(items) => {
            let mut hit = false;
            for item in items {
                hit |= patch_embedded(item, marker, id, patch);
            }
            hit
        }
        _ => false,
    }
}

fn not_found() -> (u16, Value) {
    (404, json!({"detail": "not found"}))
}

/// Pure request handler so routing is testable without sockets.
fn handle(store: &mut Store, method: &str, url: &str, body: &str) -> (u16, Value) {
    let Some(path) = url.strip_prefix("/api/") else {
        return not_found();
    };
    let segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        ("GET", ["users"]) => (200, Value::Array(store.users.clone())),
        ("GET", ["users", id]) => match parse_id(id).and_then(|id| Store::find(&mut store.users, id)) {
            Some(doc) => (200, doc.clone()),
            None => not_found(),
        },
        ("GET", ["users", id, sub @ ("bank_accounts" | "properties")]) => {
            let key = if *sub == "properties" { "property_owners" } else { "bank_accounts" };
            match parse_id(id).and_then(|id| Store::find(&mut store.users, id)) {
                Some(doc) => (200, doc[key].clone()),
                None => not_found(),
            }
        }
        ("GET", ["properties"]) => (200, Value::Array(store.properties.clone())),
        ("GET", ["properties", id]) => {
            match parse_id(id).and_then(|id| Store::find(&mut store.properties, id)) {
                Some(doc) => (200, doc.clone()),
                None => not_found(),
            }
        }
        ("PATCH", [collection @ ("users" | "properties"), id]) => {
            let Ok(patch) = serde_json::from_str::<Value>(body) else {
                return (400, json!({"detail": "body is not valid JSON"}));
            };
            let docs = if *collection == "users" {
                &mut store.users
            } else {
                &mut store.properties
            };
            match parse_id(id).and_then(|id| Store::find(docs, id)) {
                Some(doc) => {
                    shallow_merge(doc, &patch);
                    (200, doc.clone())
                }
                None => not_found(),
            }
        }
        ("PATCH", [collection @ ("addresses" | "bank-accounts"), id]) => {
            let Ok(patch) = serde_json::from_str::<Value>(body) else {
                return (400, json!({"detail": "body is not valid JSON"}));
            };
            let Some(id) = parse_id(id) else {
                return not_found();
            };
            let marker = if *collection == "addresses" { "street" } else { "iban" };
            let mut hit = false;
            for doc in store.users.iter_mut().chain(store.properties.iter_mut()) {
                hit |= patch_embedded(doc, marker, id, &patch);
            }
            if hit { (200, json!({})) } else { not_found() }
        }
        _ => not_found(),
    }
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

/// Ephemeral-port HTTP server speaking the backend's REST contract from an
/// in-memory dataset. Used by `--demo` and by integration tests.
pub struct FixtureServer {
    base_url: String,
    store: Arc<Mutex<Store>>,
    stop: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl FixtureServer {
    pub fn start(dataset: &FixtureDataset) -> Result<Self> {
        let server = tiny_http::Server::http("127.0.0.1:0")
            .map_err(|error| anyhow!("start fixture server: {error}"))?;
        let base_url = format!("http://{}/api", server.server_addr());
        let store = Arc::new(Mutex::new(Store::new(dataset)?));
        let stop = Arc::new(AtomicBool::new(false));

        let worker_store = Arc::clone(&store);
        let worker_stop = Arc::clone(&stop);
        let worker = thread::spawn(move || {
            while !worker_stop.load(Ordering::Relaxed) {
                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(request)) => request,
                    Ok(None) => continue,
                    Err(_) => break,
                };
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);

                let (status, reply) = {
                    let mut store = match worker_store.lock() {
                        Ok(store) => store,
                        Err(_) => break,
                    };
                    handle(&mut store, &request.method().to_string(), request.url(), &body)
                };
                let response = tiny_http::Response::from_string(reply.to_string())
                    .with_status_code(status)
                    .with_header(
                        tiny_http::Header::from_bytes("Content-Type", "application/json")
                            .expect("valid content type header"),
                    );
                let _ = request.respond(response);
            }
        });

        Ok(Self {
            base_url,
            store,
            stop,
            worker: Some(worker),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current user documents, for asserting what a PATCH changed.
    pub fn user_documents(&self) -> Vec<Value> {
        self.store
            .lock()
            .map(|store| store.users.clone())
            .unwrap_or_default()
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DirectoryFaker, Store, handle};
    use kontor_app::Role;
    use serde_json::json;

    #[test]
    fn same_seed_produces_the_same_directory() {
        let mut left = DirectoryFaker::new(42);
        let mut right = DirectoryFaker::new(42);
        assert_eq!(left.user(Role::Owner), right.user(Role::Owner));
        assert_eq!(left.property(), right.property());
    }

    #[test]
    fn ids_are_unique_across_a_directory() {
        let mut faker = DirectoryFaker::new(7);
        let dataset = faker.directory(6, 4);
        let mut ids: Vec<i64> = dataset.users.iter().map(|user| user.base.id.get()).collect();
        ids.extend(dataset.properties.iter().map(|property| property.id.get()));
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn iban_has_the_german_shape() {
        let mut faker = DirectoryFaker::new(3);
        let iban = faker.iban();
        assert_eq!(iban.len(), 22);
        assert!(iban.starts_with("DE"));
        assert!(iban[2..].chars().all(|ch| ch.is_ascii_digit()));
    }

    #[test]
    fn owners_hold_properties_and_tenants_do_not() {
        let mut faker = DirectoryFaker::new(11);
        let dataset = faker.directory(4, 2);
        for user in &dataset.users {
            match user.base.role {
                Role::Owner => assert!(!user.properties.is_empty()),
                Role::Tenant => assert!(user.properties.is_empty()),
            }
        }
    }

    #[test]
    fn handler_serves_users_and_sub_resources() {
        let mut faker = DirectoryFaker::new(5);
        let dataset = faker.directory(2, 1);
        let mut store = Store::new(&dataset).unwrap();
        let id = dataset.users[0].base.id.get();

        let (status, list) = handle(&mut store, "GET", "/api/users/", "");
        assert_eq!(status, 200);
        assert_eq!(list.as_array().map(Vec::len), Some(2));

        let (status, accounts) =
            handle(&mut store, "GET", &format!("/api/users/{id}/bank_accounts/"), "");
        assert_eq!(status, 200);
        assert!(!accounts.as_array().unwrap().is_empty());

        let (status, _) = handle(&mut store, "GET", "/api/users/9999/", "");
        assert_eq!(status, 404);
    }

    #[test]
    fn patching_a_user_merges_scalars_only() {
        let mut faker = DirectoryFaker::new(9);
        let dataset = faker.directory(1, 0);
        let mut store = Store::new(&dataset).unwrap();
        let id = dataset.users[0].base.id.get();
        let city = dataset.users[0].base.address.city.clone();

        let (status, doc) = handle(
            &mut store,
            "PATCH",
            &format!("/api/users/{id}/"),
            r#"{"first_name":"Renate"}"#,
        );
        assert_eq!(status, 200);
        assert_eq!(doc["first_name"], "Renate");
        assert_eq!(doc["address"]["city"], json!(city));
    }

    #[test]
    fn patching_an_embedded_address_finds_it_inside_the_user() {
        let mut faker = DirectoryFaker::new(13);
        let dataset = faker.directory(1, 0);
        let mut store = Store::new(&dataset).unwrap();
        let address_id = dataset.users[0]
            .base
            .address
            .id
            .expect("faked addresses are persisted")
            .get();

        let (status, _) = handle(
            &mut store,
            "PATCH",
            &format!("/api/addresses/{address_id}/"),
            r#"{"city":"Weimar"}"#,
        );
        assert_eq!(status, 200);

        let (_, doc) = handle(
            &mut store,
            "GET",
            &format!("/api/users/{}/", dataset.users[0].base.id.get()),
            "",
        );
        assert_eq!(doc["address"]["city"], "Weimar");
    }

    #[test]
    fn patching_an_embedded_bank_account_finds_it_in_the_array() {
        let mut faker = DirectoryFaker::new(17);
        let dataset = faker.directory(1, 0);
        let mut store = Store::new(&dataset).unwrap();
        let account_id = dataset.users[0].bank_accounts[0].id.get();

        let (status, _) = handle(
            &mut store,
            "PATCH",
            &format!("/api/bank-accounts/{account_id}/"),
            r#"{"bank":"Stadtsparkasse"}"#,
        );
        assert_eq!(status, 200);

        let (_, accounts) = handle(
            &mut store,
            "GET",
            &format!("/api/users/{}/bank_accounts/", dataset.users[0].base.id.get()),
            "",
        );
        assert_eq!(accounts[0]["bank"], "Stadtsparkasse");
    }

    #[test]
    fn unknown_routes_return_a_detail_envelope() {
        let mut store = Store::new(&Default::default()).unwrap();
        let (status, body) = handle(&mut store, "GET", "/api/receipts/", "");
        assert_eq!(status, 404);
        assert_eq!(body["detail"], "not found");
    }
}
