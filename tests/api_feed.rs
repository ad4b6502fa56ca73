//! End-to-end tests: `FeedStore` backed by `PostsApi` against a mock server.

use petfeed::api::{ApiError, PostsApi};
use petfeed::feed::{FeedStore, Filters, LoadOutcome};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer) -> PostsApi {
    PostsApi::new(reqwest::Client::new(), &server.uri())
        .unwrap()
        .with_retry_delay(Duration::from_millis(1))
}

#[tokio::test]
async fn test_pages_through_feed_until_short_page() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[
                {"id": "p3", "content": "Mel, 2 years, vaccinated", "createdAt": "2024-06-03T09:00:00Z"},
                {"id": "p2", "content": "Bidu found a family", "createdAt": "2024-06-02T09:00:00Z"}
            ]"#,
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"posts": [
                {"id": "p2", "content": "Bidu found a family", "createdAt": "2024-06-02T09:00:00Z"},
                {"id": "p1", "content": "Shelter open day", "createdAt": "2024-06-01T09:00:00Z"}
            ]}"#,
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&mock_server)
        .await;

    let store = FeedStore::new(api(&mock_server), 2);
    let filters = Filters::new();

    store.refresh(&filters).await.unwrap();
    while store.has_more() {
        store.load_more(&filters).await.unwrap();
    }

    let ids: Vec<String> = store.posts().into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec!["p3", "p2", "p1"]);
    assert_eq!(store.next_page(), 4);
}

#[tokio::test]
async fn test_server_error_reaches_caller_unchanged() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let store = FeedStore::new(api(&mock_server), 10);

    match store.refresh(&Filters::new()).await {
        Err(ApiError::HttpStatus(502)) => {}
        other => panic!("Expected HttpStatus(502), got {:?}", other),
    }
    assert!(store.is_empty());
    assert!(!store.is_loading());
}

#[tokio::test]
async fn test_comments_fetched_later_merge_into_store() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"id": "p1", "content": "Nina needs a foster home", "createdAt": "2024-06-01T09:00:00Z"}]"#,
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts/p1/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[
                {"id": "c2", "postId": "p1", "parentId": "c1", "content": "Me too", "createdAt": "2024-06-01T11:00:00Z"},
                {"id": "c1", "postId": "p1", "content": "I can help", "createdAt": "2024-06-01T10:00:00Z"}
            ]"#,
        ))
        .mount(&mock_server)
        .await;

    let api = api(&mock_server);
    let comments = api.fetch_comments("p1").await.unwrap();
    let store = FeedStore::new(api, 10);

    let outcome = store.refresh(&Filters::new()).await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Loaded { returned: 1, has_more: false }));

    let post = store.add_comments("p1", comments).unwrap();
    let comment_ids: Vec<&str> = post.comments.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(comment_ids, vec!["c1", "c2"]);

    let threads = post.threads();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].replies.len(), 1);

    // A light refresh without comments keeps them
    store.refresh(&Filters::new()).await.unwrap();
    assert_eq!(store.get_post("p1").unwrap().comments.len(), 2);
}
