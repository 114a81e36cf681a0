mod common;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

fn course(title: &str, tuition: u64) -> Value {
    json!({
        "title": title,
        "description": "Hands-on projects",
        "weeks": "12",
        "tuition": tuition,
        "minimumSkill": "intermediate",
    })
}

fn review(title: &str, rating: u64) -> Value {
    json!({"title": title, "text": "Would recommend", "rating": rating})
}

#[tokio::test]
async fn courses_update_the_average_cost() -> Result<()> {
    let server = common::spawn_server().await?;
    let owner = server.register("Owner", "owner@gmail.com", "publisher").await?;
    let camp = server.create_bootcamp(&owner, common::bootcamp("Cost Camp")).await?;

    let res = server.post(&format!("/bootcamps/{}/courses", camp), Some(&owner), course("Front End", 12500)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let first = res.json::<Value>().await?["data"]["_id"].as_str().context("course id")?.to_string();
    server
        .post(&format!("/bootcamps/{}/courses", camp), Some(&owner), course("Back End", 10001))
        .send()
        .await?;

    let bootcamp = server.get(&format!("/bootcamps/{}", camp)).send().await?.json::<Value>().await?;
    assert_eq!(bootcamp["data"]["averageCost"], 11260);

    let res = server.put(&format!("/courses/{}", first), Some(&owner), json!({"tuition": 8000})).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let bootcamp = server.get(&format!("/bootcamps/{}", camp)).send().await?.json::<Value>().await?;
    assert_eq!(bootcamp["data"]["averageCost"], 9010);

    let listed = server.get(&format!("/bootcamps/{}/courses", camp)).send().await?.json::<Value>().await?;
    assert_eq!(listed["count"], 2);

    for id in listed["data"].as_array().context("data")?.iter().filter_map(|c| c["_id"].as_str()) {
        let res = server.delete(&format!("/courses/{}", id), Some(&owner)).send().await?;
        assert_eq!(res.status(), StatusCode::OK);
    }
    let bootcamp = server.get(&format!("/bootcamps/{}", camp)).send().await?.json::<Value>().await?;
    assert!(bootcamp["data"].get("averageCost").is_none());
    Ok(())
}

#[tokio::test]
async fn course_reads_embed_bootcamp_summary() -> Result<()> {
    let server = common::spawn_server().await?;
    let owner = server.register("Owner", "owner@gmail.com", "publisher").await?;
    let camp = server.create_bootcamp(&owner, common::bootcamp("Summary Camp")).await?;
    let res = server.post(&format!("/bootcamps/{}/courses", camp), Some(&owner), course("Data", 5000)).send().await?;
    let id = res.json::<Value>().await?["data"]["_id"].as_str().context("course id")?.to_string();

    let single = server.get(&format!("/courses/{}", id)).send().await?.json::<Value>().await?;
    let embedded = &single["data"]["bootcamp"];
    assert_eq!(embedded["_id"], camp.as_str());
    assert_eq!(embedded["name"], "Summary Camp");
    assert!(embedded.get("address").is_none());

    let listing = server.get("/courses").send().await?.json::<Value>().await?;
    assert_eq!(listing["data"][0]["bootcamp"]["name"], "Summary Camp");

    let missing = "6f1c1f7e-2a3b-4c5d-8e9f-0a1b2c3d4e5f";
    let res = server.get(&format!("/courses/{}", missing)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await?["error"], format!("No course with the id of {}", missing));
    Ok(())
}

#[tokio::test]
async fn only_the_bootcamp_owner_adds_courses() -> Result<()> {
    let server = common::spawn_server().await?;
    let owner = server.register("Owner", "owner@gmail.com", "publisher").await?;
    let other = server.register("Other", "other@gmail.com", "publisher").await?;
    let camp = server.create_bootcamp(&owner, common::bootcamp("Guarded Camp")).await?;

    let res = server.post(&format!("/bootcamps/{}/courses", camp), Some(&other), course("Sneaky", 100)).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let missing = "6f1c1f7e-2a3b-4c5d-8e9f-0a1b2c3d4e5f";
    let res = server.post(&format!("/bootcamps/{}/courses", missing), Some(&owner), course("Orphan", 100)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn reviews_update_the_average_rating() -> Result<()> {
    let server = common::spawn_server().await?;
    let owner = server.register("Owner", "owner@gmail.com", "publisher").await?;
    let camp = server.create_bootcamp(&owner, common::bootcamp("Rated Camp")).await?;
    let alice = server.register("Alice", "alice@gmail.com", "user").await?;
    let bob = server.register("Bob", "bob@gmail.com", "user").await?;

    let res = server.post(&format!("/bootcamps/{}/reviews", camp), Some(&alice), review("Great", 8)).send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let alice_review = res.json::<Value>().await?["data"]["_id"].as_str().context("review id")?.to_string();
    let res = server.post(&format!("/bootcamps/{}/reviews", camp), Some(&bob), review("Good", 7)).send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let bootcamp = server.get(&format!("/bootcamps/{}", camp)).send().await?.json::<Value>().await?;
    assert_eq!(bootcamp["data"]["averageRating"], 7.5);

    // Another user's review is off limits
    let res = server.put(&format!("/reviews/{}", alice_review), Some(&bob), json!({"rating": 1})).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server.put(&format!("/reviews/{}", alice_review), Some(&alice), json!({"rating": 10})).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let bootcamp = server.get(&format!("/bootcamps/{}", camp)).send().await?.json::<Value>().await?;
    assert_eq!(bootcamp["data"]["averageRating"], 8.5);

    let res = server.delete(&format!("/reviews/{}", alice_review), Some(&alice)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let bootcamp = server.get(&format!("/bootcamps/{}", camp)).send().await?.json::<Value>().await?;
    assert_eq!(bootcamp["data"]["averageRating"], 7.0);
    Ok(())
}

#[tokio::test]
async fn one_review_per_user_and_publishers_cannot_review() -> Result<()> {
    let server = common::spawn_server().await?;
    let owner = server.register("Owner", "owner@gmail.com", "publisher").await?;
    let camp = server.create_bootcamp(&owner, common::bootcamp("Popular Camp")).await?;
    let alice = server.register("Alice", "alice@gmail.com", "user").await?;

    server.post(&format!("/bootcamps/{}/reviews", camp), Some(&alice), review("First", 9)).send().await?;
    let res = server.post(&format!("/bootcamps/{}/reviews", camp), Some(&alice), review("Again", 2)).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Duplicate field value entered");

    let res = server.post(&format!("/bootcamps/{}/reviews", camp), Some(&owner), review("Mine", 10)).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server.post(&format!("/bootcamps/{}/reviews", camp), Some(&alice), review("Bad", 11)).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn review_reads() -> Result<()> {
    let server = common::spawn_server().await?;
    let owner = server.register("Owner", "owner@gmail.com", "publisher").await?;
    let camp = server.create_bootcamp(&owner, common::bootcamp("Read Camp")).await?;
    let alice = server.register("Alice", "alice@gmail.com", "user").await?;
    let res = server.post(&format!("/bootcamps/{}/reviews", camp), Some(&alice), review("Solid", 6)).send().await?;
    let id = res.json::<Value>().await?["data"]["_id"].as_str().context("review id")?.to_string();

    let single = server.get(&format!("/reviews/{}", id)).send().await?.json::<Value>().await?;
    assert_eq!(single["data"]["bootcamp"]["name"], "Read Camp");

    let nested = server.get(&format!("/bootcamps/{}/reviews", camp)).send().await?.json::<Value>().await?;
    assert_eq!(nested["count"], 1);
    assert_eq!(nested["data"][0]["title"], "Solid");

    let missing = "6f1c1f7e-2a3b-4c5d-8e9f-0a1b2c3d4e5f";
    let res = server.get(&format!("/reviews/{}", missing)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await?["error"], format!("No review found with the id of {}", missing));
    Ok(())
}

#[tokio::test]
async fn users_admin_routes() -> Result<()> {
    let server = common::spawn_server().await?;
    let admin = server.admin_token().await?;
    let user = server.register("Plain", "plain@gmail.com", "user").await?;

    let res = server.client.get(server.api("/users")).bearer_auth(&user).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .post("/users", Some(&admin), json!({"name": "Made", "email": "made@gmail.com", "password": "123456", "role": "admin"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = res.json::<Value>().await?;
    assert!(created["data"].get("password").is_none());
    let id = created["data"]["_id"].as_str().context("user id")?.to_string();
    server.login("made@gmail.com", "123456").await?;

    let listed = server.client.get(server.api("/users?sort=email")).bearer_auth(&admin).send().await?.json::<Value>().await?;
    assert_eq!(listed["count"], 3);
    assert!(listed["data"].as_array().context("data")?.iter().all(|u| u.get("password").is_none()));

    for query in ["/users?password[gt]=a", "/users?resetPasswordToken=abc", "/users?sort=resetPasswordToken"] {
        let res = server.client.get(server.api(query)).bearer_auth(&admin).send().await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "query {}", query);
    }

    let res = server.put(&format!("/users/{}", id), Some(&admin), json!({"role": "publisher"})).send().await?;
    assert_eq!(res.json::<Value>().await?["data"]["role"], "publisher");

    let res = server.delete(&format!("/users/{}", id), Some(&admin)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let res = server.client.get(server.api(&format!("/users/{}", id))).bearer_auth(&admin).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
