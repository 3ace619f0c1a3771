use crate::common::{test_server, TestClient};

#[tokio::test]
async fn register_broadcasts_presence_and_relays_room_message() {
    let server = test_server().await;

    let mut a = TestClient::connect(&server).await;
    a.register_and_drain("alice", "123456").await;

    let mut b = TestClient::connect(&server).await;
    b.register_and_drain("bob", "123456").await;

    // Both connections observe bob joining (alice via broadcast, bob's own
    // join too since this implementation broadcasts to all including the
    // newly-joined client).
    let presence_a = a.recv().await;
    assert_eq!(presence_a["type"], "USER_PRESENCE");
    assert_eq!(presence_a["data"]["event"], "userJoined");
    assert_eq!(presence_a["data"]["username"], "bob");
    assert_eq!(presence_a["data"]["onlineCount"], 2);

    a.send(
        "CHAT_MESSAGE",
        serde_json::json!({ "room": "General", "content": "hello", "sentAt": "2025-01-01T00:00:00" }),
    )
    .await;

    let msg_b = b.recv().await;
    assert_eq!(msg_b["type"], "CHAT_MESSAGE");
    assert_eq!(msg_b["data"]["from"], "alice");
    assert_eq!(msg_b["data"]["content"], "hello");
    assert_eq!(msg_b["data"]["room"], "General");
    assert!(msg_b["data"]["to"].is_null());

    // broadcasts to all, including the sender
    let msg_a = a.recv().await;
    assert_eq!(msg_a["type"], "CHAT_MESSAGE");
    assert_eq!(msg_a["data"]["from"], "alice");
}

#[tokio::test]
async fn blank_content_is_rejected_without_broadcast() {
    let server = test_server().await;
    let mut a = TestClient::connect(&server).await;
    a.register_and_drain("alice", "123456").await;

    a.send("CHAT_MESSAGE", serde_json::json!({ "room": "General", "content": "   " })).await;
    let resp = a.recv().await;
    assert_eq!(resp["type"], "ERROR");
    assert_eq!(resp["data"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn oversize_content_is_rejected() {
    let server = test_server().await;
    let mut a = TestClient::connect(&server).await;
    a.register_and_drain("alice", "123456").await;

    let content = "a".repeat(1001);
    a.send("CHAT_MESSAGE", serde_json::json!({ "room": "General", "content": content })).await;
    let resp = a.recv().await;
    assert_eq!(resp["type"], "ERROR");
    assert_eq!(resp["data"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn room_defaults_to_general_when_blank() {
    let server = test_server().await;
    let mut a = TestClient::connect(&server).await;
    a.register_and_drain("alice", "123456").await;

    a.send("CHAT_MESSAGE", serde_json::json!({ "content": "no room given" })).await;
    let resp = a.recv().await;
    assert_eq!(resp["type"], "CHAT_MESSAGE");
    assert_eq!(resp["data"]["room"], "General");
}

#[tokio::test]
async fn chat_message_before_auth_is_unauthorized() {
    let server = test_server().await;
    let mut client = TestClient::connect(&server).await;
    client.send("CHAT_MESSAGE", serde_json::json!({ "room": "General", "content": "hi" })).await;
    let resp = client.recv().await;
    assert_eq!(resp["type"], "ERROR");
    assert_eq!(resp["data"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn logout_closes_the_connection_and_broadcasts_user_left() {
    let server = test_server().await;
    let mut a = TestClient::connect(&server).await;
    a.register_and_drain("alice", "123456").await;

    let mut b = TestClient::connect(&server).await;
    b.register_and_drain("bob", "123456").await;
    let _joined = a.recv().await; // bob joined, observed by alice

    b.send("LOGOUT", serde_json::json!({})).await;
    let left = a.recv().await;
    assert_eq!(left["type"], "USER_PRESENCE");
    assert_eq!(left["data"]["event"], "userLeft");
    assert_eq!(left["data"]["username"], "bob");
}
