use crate::common::{test_server, TestClient};

#[tokio::test]
async fn register_then_login_round_trips() {
    let server = test_server().await;
    let mut client = TestClient::connect(&server).await;
    client.register_and_drain("alice", "123456").await;

    let mut second = TestClient::connect(&server).await;
    let resp = second.auth("LOGIN", "alice", "123456").await;
    assert_eq!(resp["type"], "AUTH_RESPONSE");
    assert_eq!(resp["data"]["username"], "alice");
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let server = test_server().await;
    let mut a = TestClient::connect(&server).await;
    a.register_and_drain("alice", "secret1").await;

    let mut b = TestClient::connect(&server).await;
    let resp = b.auth("REGISTER", "alice", "other1").await;
    assert_eq!(resp["type"], "ERROR");
    assert_eq!(resp["data"]["code"], "USER_EXISTS");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let server = test_server().await;
    let mut a = TestClient::connect(&server).await;
    a.register_and_drain("alice", "secret1").await;

    let mut b = TestClient::connect(&server).await;
    let resp = b.auth("LOGIN", "alice", "wrongpw").await;
    assert_eq!(resp["type"], "ERROR");
    assert_eq!(resp["data"]["code"], "INVALID_PASSWORD");
}

#[tokio::test]
async fn unknown_user_login_is_rejected() {
    let server = test_server().await;
    let mut client = TestClient::connect(&server).await;
    let resp = client.auth("LOGIN", "ghost", "secret1").await;
    assert_eq!(resp["type"], "ERROR");
    assert_eq!(resp["data"]["code"], "USER_NOT_FOUND");
}

#[tokio::test]
async fn blank_username_is_a_validation_error() {
    let server = test_server().await;
    let mut client = TestClient::connect(&server).await;
    let resp = client.auth("LOGIN", "  ", "secret1").await;
    assert_eq!(resp["type"], "ERROR");
    assert_eq!(resp["data"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_auth_action_is_rejected() {
    let server = test_server().await;
    let mut client = TestClient::connect(&server).await;
    let resp = client.auth("DESTROY", "alice", "secret1").await;
    assert_eq!(resp["type"], "ERROR");
    assert_eq!(resp["data"]["code"], "UNKNOWN_ACTION");
}

#[tokio::test]
async fn username_is_case_insensitive_for_login() {
    let server = test_server().await;
    let mut a = TestClient::connect(&server).await;
    a.register_and_drain("Alice", "secret1").await;

    let mut b = TestClient::connect(&server).await;
    let resp = b.auth("LOGIN", "ALICE", "secret1").await;
    assert_eq!(resp["type"], "AUTH_RESPONSE");
    assert_eq!(resp["data"]["username"], "alice");
}
