use futures::StreamExt;
use loveseat::{memory::InMemoryTransport, prelude::*, serde_json::json, transport::Method};
use std::time::Duration;

async fn server() -> (InMemoryTransport, Server) {
    let transport = InMemoryTransport::new();
    let server = Server::new(transport.clone(), &ServerConfig::default()).unwrap();

    (transport, server)
}

#[tokio::test]
async fn database_lifecycle() {
    let (transport, server) = server().await;

    assert!(!server.exists("notes").await.unwrap());
    let notes = server.create_database("notes").await.unwrap();
    assert!(server.exists("notes").await.unwrap());
    assert_eq!(notes.to_string(), "<Database name=notes>");

    let err = server.create_database("notes").await.unwrap_err();
    assert_eq!(err.status(), Some(412));

    server.delete_database("notes").await.unwrap();
    assert!(transport.database_names().await.is_empty());
    assert!(server.delete_database("notes").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn document_crud() {
    let (_, server) = server().await;
    let notes = server.create_database("notes").await.unwrap();

    let mut document: Document = [("title", json!("hello")), ("tags", json!(["a", "b"]))]
        .into_iter()
        .collect();
    notes.put("first", &mut document).await.unwrap();
    assert_eq!(document.id(), Some("first"));
    let first_rev = document.rev().unwrap().to_string();
    assert!(first_rev.starts_with("1-"));

    let fetched = notes.get("first").await.unwrap();
    assert_eq!(fetched.len(), 4);
    assert_eq!(fetched.id(), Some("first"));
    assert_eq!(fetched.rev(), Some(first_rev.as_str()));
    assert_eq!(fetched.get("title"), Some(&json!("hello")));
    assert_eq!(fetched.get("tags"), Some(&json!(["a", "b"])));
    assert_eq!(fetched.to_value(), document.to_value());
    assert!(notes.contains("first").await.unwrap());

    document.insert("title", "updated");
    notes.put("first", &mut document).await.unwrap();
    assert!(document.rev().unwrap().starts_with("2-"));
    assert_eq!(notes.get("first").await.unwrap().get("title"), Some(&json!("updated")));

    notes.delete("first").await.unwrap();
    assert!(!notes.contains("first").await.unwrap());
    assert!(notes.get("first").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn stale_revisions_conflict() {
    let (_, server) = server().await;
    let notes = server.create_database("notes").await.unwrap();

    let mut original: Document = [("n", 1)].into_iter().collect();
    notes.put("doc", &mut original).await.unwrap();
    let mut stale = original.clone();

    original.insert("n", 2);
    notes.put("doc", &mut original).await.unwrap();

    stale.insert("n", 3);
    assert!(notes.put("doc", &mut stale).await.unwrap_err().is_conflict());

    let mut fresh: Document = [("n", 4)].into_iter().collect();
    assert!(notes.put("doc", &mut fresh).await.unwrap_err().is_conflict());

    let stale_rev = stale.rev().unwrap().to_string();
    assert!(notes.delete_revision("doc", &stale_rev).await.unwrap_err().is_conflict());
    assert_eq!(notes.get("doc").await.unwrap().get("n"), Some(&json!(2)));
}

#[tokio::test]
async fn missing_database_is_not_found() {
    let (_, server) = server().await;
    let ghost = server.database("ghost");

    let mut document = Document::new();
    assert!(ghost.put("doc", &mut document).await.unwrap_err().is_not_found());
    assert!(!ghost.contains("doc").await.unwrap());
    assert!(ghost.continuous_changes(ChangesOptions::new()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn identifiers_with_reserved_characters_are_encoded() {
    let (transport, server) = server().await;
    let notes = server.create_database("notes").await.unwrap();

    let mut document: Document = [("n", 1)].into_iter().collect();
    notes.put("Note:a/b c", &mut document).await.unwrap();

    assert_eq!(document.id(), Some("Note:a/b c"));
    assert_eq!(transport.count(Method::Put, "/notes/Note%3Aa%2Fb%20c").await, 1);
    assert!(notes.contains("Note:a/b c").await.unwrap());
}

#[tokio::test]
async fn batch_changes() {
    let (_, server) = server().await;
    let notes = server.create_database("notes").await.unwrap();

    for id in ["a", "b", "c"] {
        let mut document: Document = [("id", id)].into_iter().collect();
        notes.put(id, &mut document).await.unwrap();
    }
    notes.delete("b").await.unwrap();

    let body = notes
        .changes(ChangesOptions::new().include_docs(true))
        .await
        .unwrap()
        .into_batch()
        .unwrap();
    let ids: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|event| event["id"].as_str().unwrap())
        .collect();

    assert_eq!(ids, vec!["a", "c", "b"]);
    assert_eq!(body["results"][0]["doc"]["id"], json!("a"));
    assert_eq!(body["results"][2]["deleted"], json!(true));
    assert_eq!(body["last_seq"], json!(4));

    let body = notes
        .changes(ChangesOptions::new().since(3).limit(5))
        .await
        .unwrap()
        .into_batch()
        .unwrap();
    assert_eq!(body["results"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn continuous_changes_follow_live_updates() {
    let (_, server) = server().await;
    let notes = server.create_database("notes").await.unwrap();

    let mut before: Document = [("n", 0)].into_iter().collect();
    notes.put("before", &mut before).await.unwrap();

    let mut feed = notes
        .changes(ChangesOptions::new().feed(Feed::Continuous).since("now"))
        .await
        .unwrap()
        .into_feed()
        .unwrap();

    for n in 1..=3 {
        let mut document: Document = [("n", n)].into_iter().collect();
        notes.put(&format!("doc-{n}"), &mut document).await.unwrap();
    }

    let first_three = feed.by_ref().take(3).collect::<Vec<_>>();
    let events = tokio::time::timeout(Duration::from_secs(5), first_three)
        .await
        .unwrap();
    let ids: Vec<String> = events
        .into_iter()
        .map(|event| event.unwrap()["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["doc-1", "doc-2", "doc-3"]);

    server.delete_database("notes").await.unwrap();
    let end = tokio::time::timeout(Duration::from_secs(5), feed.next()).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn raw_feed_param_opens_a_live_feed() {
    let (transport, server) = server().await;
    let notes = server.create_database("notes").await.unwrap();

    let changes = notes
        .changes(ChangesOptions::new().param("feed", "continuous").since("now"))
        .await
        .unwrap();
    let mut feed = changes.into_feed().unwrap();

    let mut document = Document::new();
    notes.put("live", &mut document).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), feed.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(event["id"], json!("live"));

    let request = transport
        .requests()
        .await
        .into_iter()
        .find(|request| request.url.ends_with("/_changes"))
        .unwrap();
    let feeds: Vec<&str> = request
        .query
        .iter()
        .filter(|(key, _)| key == "feed")
        .map(|(_, value)| value.as_str())
        .collect();
    assert_eq!(feeds, vec!["continuous"]);
}

#[tokio::test]
async fn continuous_changes_replay_backlog() {
    let (_, server) = server().await;
    let notes = server.create_database("notes").await.unwrap();

    for id in ["a", "b"] {
        let mut document = Document::new();
        notes.put(id, &mut document).await.unwrap();
    }

    let feed = notes
        .continuous_changes(ChangesOptions::new().include_docs(true))
        .await
        .unwrap();
    let events = tokio::time::timeout(Duration::from_secs(5), feed.take(2).collect::<Vec<_>>())
        .await
        .unwrap();

    assert_eq!(events[0].as_ref().unwrap()["id"], json!("a"));
    assert_eq!(events[1].as_ref().unwrap()["doc"]["_id"], json!("b"));
}
