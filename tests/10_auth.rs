mod common;

use anyhow::{Context, Result};
use chrono::{Duration, SecondsFormat, Utc};
use reqwest::{header, StatusCode};
use serde_json::{json, Map, Value};

use devcamper_api::auth::sha256_hex;
use devcamper_api::database::DataAccessor;
use devcamper_api::models::USERS;
use devcamper_api::query::{FilterPredicate, FindQuery};

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server.client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["database"], "ok");
    Ok(())
}

#[tokio::test]
async fn register_sets_cookie_and_me_hides_password() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server
        .post(
            "/auth/register",
            None,
            json!({"name": "John Doe", "email": "john@gmail.com", "password": "123456", "role": "publisher"}),
        )
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res.headers().get(header::SET_COOKIE).context("no cookie")?.to_str()?.to_string();
    assert!(cookie.starts_with("token="), "cookie: {}", cookie);
    assert!(cookie.contains("HttpOnly"));
    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], true);
    let token = body["token"].as_str().context("token")?;

    let me = server.client.get(server.api("/auth/me")).bearer_auth(token).send().await?;
    assert_eq!(me.status(), StatusCode::OK);
    let me = me.json::<Value>().await?;
    assert_eq!(me["data"]["email"], "john@gmail.com");
    assert_eq!(me["data"]["role"], "publisher");
    assert!(me["data"].get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn cookie_token_is_accepted() -> Result<()> {
    let server = common::spawn_server().await?;
    let token = server.register("Jane", "jane@gmail.com", "user").await?;

    let res = server
        .client
        .get(server.api("/auth/me"))
        .header(header::COOKIE, format!("token={}", token))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn registration_rejects_admin_role_and_duplicates() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server
        .post("/auth/register", None, json!({"name": "Eve", "email": "eve@gmail.com", "password": "123456", "role": "admin"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    server.register("Sam", "sam@gmail.com", "user").await?;
    let res = server
        .post("/auth/register", None, json!({"name": "Sam 2", "email": "SAM@gmail.com", "password": "123456"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], "Duplicate field value entered");
    Ok(())
}

#[tokio::test]
async fn login_failures() -> Result<()> {
    let server = common::spawn_server().await?;
    server.register("John", "john@gmail.com", "user").await?;

    let res = server.post("/auth/login", None, json!({"email": "john@gmail.com"})).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Please provide an email and password");

    let res = server
        .post("/auth/login", None, json!({"email": "john@gmail.com", "password": "wrong1"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid credentials");

    let res = server
        .post("/auth/login", None, json!({"email": "nobody@gmail.com", "password": "123456"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    server.login("JOHN@gmail.com", "123456").await?;
    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() -> Result<()> {
    let server = common::spawn_server().await?;

    let res = server.get("/auth/me").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Not authorized to access this route");

    let res = server.client.get(server.api("/auth/me")).bearer_auth("not.a.jwt").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn logout_clears_the_cookie() -> Result<()> {
    let server = common::spawn_server().await?;

    for res in [
        server.client.get(server.api("/auth/logout")).send().await?,
        server.client.post(server.api("/auth/logout")).send().await?,
    ] {
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res.headers().get(header::SET_COOKIE).context("no cookie")?.to_str()?.to_string();
        assert!(cookie.starts_with("token=none;"), "cookie: {}", cookie);
        assert_eq!(res.json::<Value>().await?, json!({"success": true, "data": {}}));
    }
    Ok(())
}

#[tokio::test]
async fn update_details_and_password() -> Result<()> {
    let server = common::spawn_server().await?;
    let token = server.register("John", "john@gmail.com", "user").await?;

    let res = server
        .put("/auth/updatedetails", Some(&token), json!({"name": "John Smith", "role": "admin"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["name"], "John Smith");
    assert_eq!(body["data"]["role"], "user");

    let res = server
        .put("/auth/updatepassword", Some(&token), json!({"currentPassword": "nope12", "newPassword": "abcdef"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.json::<Value>().await?["error"], "Password is incorrect");

    let res = server
        .put("/auth/updatepassword", Some(&token), json!({"currentPassword": "123456", "newPassword": "abcdef"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.json::<Value>().await?["token"].is_string());

    server.login("john@gmail.com", "abcdef").await?;
    Ok(())
}

#[tokio::test]
async fn forgot_password_stores_a_hashed_token() -> Result<()> {
    let server = common::spawn_server().await?;
    server.register("John", "john@gmail.com", "user").await?;

    let res = server.post("/auth/forgotpassword", None, json!({"email": "ghost@gmail.com"})).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await?["error"], "There is no user with that email");

    let res = server.post("/auth/forgotpassword", None, json!({"email": "john@gmail.com"})).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["data"], "Email sent");

    let stored = server
        .store
        .find_one(FindQuery::find(USERS.name, FilterPredicate::new().equals("email", "john@gmail.com")).reveal_hidden())
        .await?
        .context("user")?;
    assert_eq!(stored["resetPasswordToken"].as_str().map(str::len), Some(64));
    assert!(stored["resetPasswordExpire"].is_string());
    Ok(())
}

#[tokio::test]
async fn reset_password_with_token() -> Result<()> {
    let server = common::spawn_server().await?;
    server.register("John", "john@gmail.com", "user").await?;
    let user = server
        .store
        .find_one(FindQuery::find(USERS.name, FilterPredicate::new().equals("email", "john@gmail.com")))
        .await?
        .context("user")?;
    let id = user["_id"].as_str().context("id")?;

    let expires = (Utc::now() + Duration::minutes(10)).to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut changes = Map::new();
    changes.insert("resetPasswordToken".into(), Value::from(sha256_hex("plain-reset-token")));
    changes.insert("resetPasswordExpire".into(), Value::from(expires));
    server.store.update(USERS.name, id, changes).await?;

    let res = server
        .put("/auth/resetpassword/some-other-token", None, json!({"password": "newpass"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid token");

    let res = server
        .put("/auth/resetpassword/plain-reset-token", None, json!({"password": "newpass"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    server.login("john@gmail.com", "newpass").await?;

    // The token is single use
    let res = server
        .put("/auth/resetpassword/plain-reset-token", None, json!({"password": "another"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn expired_reset_tokens_are_rejected() -> Result<()> {
    let server = common::spawn_server().await?;
    server.register("John", "john@gmail.com", "user").await?;
    let user = server
        .store
        .find_one(FindQuery::find(USERS.name, FilterPredicate::new().equals("email", "john@gmail.com")))
        .await?
        .context("user")?;

    let expired = (Utc::now() - Duration::minutes(1)).to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut changes = Map::new();
    changes.insert("resetPasswordToken".into(), Value::from(sha256_hex("stale")));
    changes.insert("resetPasswordExpire".into(), Value::from(expired));
    server.store.update(USERS.name, user["_id"].as_str().context("id")?, changes).await?;

    let res = server.put("/auth/resetpassword/stale", None, json!({"password": "newpass"})).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
