// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use kontor_api::{ApiClient, UserBackend};
use kontor_app::{EntityController, SaveOutcome, UserEdit, UserField};
use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};
use tiny_http::{Header, Response, Server};

fn json_response(body: &str, status: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body).with_status_code(status).with_header(
        Header::from_bytes("Content-Type", "application/json")
            .expect("valid content type header"),
    )
}

fn user_json() -> &'static str {
    r#"{
        "id": 1,
        "first_name": "Greta",
        "last_name": "Brandt",
        "email": "greta@example.com",
        "username": "gbrandt",
        "role": "tenant",
        "address": {
            "id": 10,
            "street": "Lindenstr.",
            "house_number": "12",
            "address_line_1": null,
            "address_line_2": null,
            "postal_code": "10115",
            "city": "Berlin",
            "country": "Germany"
        }
    }"#
}

fn bank_accounts_json() -> &'static str {
    r#"[
        {"id": 5, "account_owner_text": "Greta Brandt", "iban": "DE02120300000000202051", "bank": "Sparkasse", "bic": "BYLADEM1001"},
        {"id": 6, "account_owner_text": "Joint account", "iban": "DE89370400440532013000", "bank": "Commerzbank", "bic": "COBADEFFXXX"}
    ]"#
}

/// Serves requests until `expected` have been handled or the deadline
/// passes, returning the method/url/body log. Responses are chosen by URL
/// so concurrently issued fetches may arrive in any order.
fn spawn_server(
    server: Server,
    expected: usize,
    respond: impl Fn(&str) -> (String, u16) + Send + 'static,
) -> thread::JoinHandle<Vec<(String, String, String)>> {
    thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut log = Vec::new();
        while log.len() < expected && Instant::now() < deadline {
            let mut request = match server.recv_timeout(Duration::from_millis(100)) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(error) => panic!("recv failed: {error}"),
            };
            let mut body = String::new();
            request
                .as_reader()
                .read_to_string(&mut body)
                .expect("request body should be readable");
            log.push((
                request.method().to_string(),
                request.url().to_owned(),
                body,
            ));
            let (reply, status) = respond(request.url());
            request
                .respond(json_response(&reply, status))
                .expect("response should succeed");
        }
        log
    })
}

fn client_for(server: &Server) -> Result<ApiClient> {
    let addr = format!("http://{}/api", server.server_addr());
    ApiClient::new(&addr, Duration::from_secs(1))
}

#[tokio::test]
async fn network_error_names_the_base_url() -> Result<()> {
    let client = ApiClient::new("http://127.0.0.1:1/api", Duration::from_millis(200))?;
    let error = client.list_users().await.unwrap_err();
    let message = error.to_string();
    assert!(message.contains("http://127.0.0.1:1/api"));
    assert!(message.contains("check that the backend is running"));
    Ok(())
}

#[tokio::test]
async fn user_detail_merges_three_endpoints() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let client = client_for(&server)?;

    let handle = spawn_server(server, 3, |url| match url {
        "/api/users/1/" => (user_json().to_owned(), 200),
        "/api/users/1/bank_accounts/" => (bank_accounts_json().to_owned(), 200),
        "/api/users/1/properties/" => ("[]".to_owned(), 200),
        other => panic!("unexpected url {other}"),
    });

    let mut controller = EntityController::new(UserBackend::new(client));
    controller.open_detail(kontor_app::UserId::new(1)).await?;

    let detail = controller.buffer().expect("record should load");
    assert_eq!(detail.base.first_name, "Greta");
    assert_eq!(detail.base.address.city, "Berlin");
    assert_eq!(detail.bank_accounts.len(), 2);
    assert!(detail.properties.is_empty());
    assert!(!controller.is_dirty());

    handle.join().expect("server thread should join");
    Ok(())
}

#[tokio::test]
async fn failing_sub_fetch_fails_the_whole_open() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let client = client_for(&server)?;

    let handle = spawn_server(server, 3, |url| match url {
        "/api/users/1/" => (user_json().to_owned(), 200),
        "/api/users/1/bank_accounts/" => (r#"{"detail":"bank accounts unavailable"}"#.to_owned(), 503),
        "/api/users/1/properties/" => ("[]".to_owned(), 200),
        other => panic!("unexpected url {other}"),
    });

    let mut controller = EntityController::new(UserBackend::new(client));
    let error = controller
        .open_detail(kontor_app::UserId::new(1))
        .await
        .unwrap_err();
    assert!(format!("{error:#}").contains("bank accounts unavailable"));

    assert!(controller.is_open());
    assert!(!controller.is_loading());
    assert!(controller.buffer().is_none());

    handle.join().expect("server thread should join");
    Ok(())
}

#[tokio::test]
async fn save_patches_base_then_address_then_each_bank_account() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let client = client_for(&server)?;

    // 3 detail fetches, 4 patches, 1 list refresh.
    let handle = spawn_server(server, 8, |url| match url {
        "/api/users/1/" => (user_json().to_owned(), 200),
        "/api/users/1/bank_accounts/" => (bank_accounts_json().to_owned(), 200),
        "/api/users/1/properties/" => ("[]".to_owned(), 200),
        "/api/addresses/10/" | "/api/bank-accounts/5/" | "/api/bank-accounts/6/" => {
            ("{}".to_owned(), 200)
        }
        "/api/users/" => ("[]".to_owned(), 200),
        other => panic!("unexpected url {other}"),
    });

    let mut controller = EntityController::new(UserBackend::new(client));
    controller.open_detail(kontor_app::UserId::new(1)).await?;
    controller.update(UserEdit::Base(UserField::Email, "brandt@example.com".to_owned()));
    assert!(controller.is_dirty());

    let outcome = controller.save().await?;
    assert_eq!(outcome, SaveOutcome::Saved);
    assert!(!controller.is_open());

    let log = handle.join().expect("server thread should join");
    let patches: Vec<&(String, String, String)> = log
        .iter()
        .filter(|(method, _, _)| method == "PATCH")
        .collect();
    let patched_urls: Vec<&str> = patches.iter().map(|(_, url, _)| url.as_str()).collect();
    assert_eq!(
        patched_urls,
        [
            "/api/users/1/",
            "/api/addresses/10/",
            "/api/bank-accounts/5/",
            "/api/bank-accounts/6/",
        ],
    );

    let user_body: serde_json::Value = serde_json::from_str(&patches[0].2)?;
    assert_eq!(user_body["email"], "brandt@example.com");
    assert_eq!(user_body["role"], "tenant");
    assert!(user_body.get("address").is_none());
    assert!(user_body.get("bank_accounts").is_none());

    assert!(
        log.iter()
            .filter(|(method, url, _)| method == "GET" && url == "/api/users/")
            .count()
            == 1,
    );
    Ok(())
}

#[tokio::test]
async fn save_aborts_on_the_first_rejected_patch() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let client = client_for(&server)?;

    // 3 detail fetches, the base patch, then the rejected address patch.
    let handle = spawn_server(server, 5, |url| match url {
        "/api/users/1/" => (user_json().to_owned(), 200),
        "/api/users/1/bank_accounts/" => (bank_accounts_json().to_owned(), 200),
        "/api/users/1/properties/" => ("[]".to_owned(), 200),
        "/api/addresses/10/" => (r#"{"detail":"address locked"}"#.to_owned(), 423),
        other => panic!("unexpected url {other}"),
    });

    let mut controller = EntityController::new(UserBackend::new(client));
    controller.open_detail(kontor_app::UserId::new(1)).await?;
    controller.update(UserEdit::Address(
        kontor_app::AddressField::City,
        "Potsdam".to_owned(),
    ));

    let error = controller.save().await.unwrap_err();
    assert!(format!("{error:#}").contains("address locked"));

    // The session survives the failure so the user can retry.
    assert!(controller.is_open());
    assert!(controller.is_dirty());
    assert_eq!(
        controller.buffer().map(|detail| detail.base.address.city.as_str()),
        Some("Potsdam"),
    );

    let log = handle.join().expect("server thread should join");
    assert!(
        !log.iter().any(|(_, url, _)| url.starts_with("/api/bank-accounts/")),
        "no bank account may be patched after an earlier step fails",
    );
    assert!(
        !log.iter()
            .any(|(method, url, _)| method == "GET" && url == "/api/users/"),
        "a failed save must not refresh the list",
    );
    Ok(())
}
