use crate::common::{test_server, TestClient};

#[tokio::test]
async fn fresh_room_history_is_empty() {
    let server = test_server().await;
    let mut a = TestClient::connect(&server).await;
    a.register_and_drain("alice", "123456").await;

    a.send("HISTORY_REQUEST", serde_json::json!({ "scope": "ROOM", "room": "General" })).await;
    let resp = a.recv().await;
    assert_eq!(resp["type"], "HISTORY_RESPONSE");
    assert_eq!(resp["data"]["scope"], "ROOM");
    assert_eq!(resp["data"]["room"], "General");
    assert!(resp["data"]["peer"].is_null());
    assert_eq!(resp["data"]["messages"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn room_history_reflects_posted_messages_in_order() {
    let server = test_server().await;
    let mut a = TestClient::connect(&server).await;
    a.register_and_drain("alice", "123456").await;

    for content in ["first", "second", "third"] {
        a.send("CHAT_MESSAGE", serde_json::json!({ "room": "General", "content": content })).await;
        let _broadcast = a.recv().await;
    }

    a.send("HISTORY_REQUEST", serde_json::json!({ "scope": "ROOM", "room": "General" })).await;
    let resp = a.recv().await;
    let messages = resp["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    let contents: Vec<&str> = messages.iter().map(|m| m["content"].as_str().unwrap()).collect();
    assert_eq!(contents, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn dm_history_is_empty_when_no_pairing_exists() {
    let server = test_server().await;
    let mut a = TestClient::connect(&server).await;
    a.register_and_drain("alice", "123456").await;

    {
        let mut bob = TestClient::connect(&server).await;
        bob.register_and_drain("bob", "123456").await;
    }
    let _joined = a.recv().await; // bob's join broadcast

    a.send("HISTORY_REQUEST", serde_json::json!({ "scope": "DM", "peer": "bob" })).await;
    let resp = a.recv().await;
    assert_eq!(resp["type"], "HISTORY_RESPONSE");
    assert_eq!(resp["data"]["scope"], "DM");
    assert_eq!(resp["data"]["peer"], "bob");
    assert_eq!(resp["data"]["messages"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn history_request_with_unknown_scope_is_rejected() {
    let server = test_server().await;
    let mut a = TestClient::connect(&server).await;
    a.register_and_drain("alice", "123456").await;

    a.send("HISTORY_REQUEST", serde_json::json!({ "scope": "GALAXY" })).await;
    let resp = a.recv().await;
    assert_eq!(resp["type"], "ERROR");
    assert_eq!(resp["data"]["code"], "UNKNOWN_SCOPE");
}

#[tokio::test]
async fn room_history_without_room_name_is_a_validation_error() {
    let server = test_server().await;
    let mut a = TestClient::connect(&server).await;
    a.register_and_drain("alice", "123456").await;

    a.send("HISTORY_REQUEST", serde_json::json!({ "scope": "ROOM" })).await;
    let resp = a.recv().await;
    assert_eq!(resp["type"], "ERROR");
    assert_eq!(resp["data"]["code"], "VALIDATION_ERROR");
}
