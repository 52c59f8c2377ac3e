use playlist_reaper::{
    playlist::{ReapOptions, playlist_duration, reap_playlist},
    youtube::YouTube,
};
use reqwest::Url;
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

fn youtube(server: &MockServer) -> YouTube {
    let base_url = Url::parse(&format!("{}/youtube/v3/", server.uri())).unwrap();
    YouTube::with_base_url(reqwest::Client::new(), base_url, "access-token")
}

fn playlist_json(id: &str, title: &str) -> Value {
    json!({
        "kind": "youtube#playlist",
        "id": id,
        "snippet": {
            "title": title,
            "description": "",
            "localized": { "title": title, "description": "" }
        }
    })
}

async fn mount_playlists(server: &MockServer, playlists: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlists"))
        .and(query_param("part", "snippet"))
        .and(query_param("mine", "true"))
        .and(header("authorization", "Bearer access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": playlists })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_items(server: &MockServer, playlist_id: &str, video_ids: &[&str]) {
    let items = video_ids
        .iter()
        .map(|id| json!({ "contentDetails": { "videoId": id } }))
        .collect::<Vec<_>>();
    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlistItems"))
        .and(query_param("part", "contentDetails"))
        .and(query_param("playlistId", playlist_id))
        .and(query_param("maxResults", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_videos(server: &MockServer, ids: &str, durations: &[&str]) {
    let items = durations
        .iter()
        .map(|d| json!({ "id": "x", "contentDetails": { "duration": d } }))
        .collect::<Vec<_>>();
    Mock::given(method("GET"))
        .and(path("/youtube/v3/videos"))
        .and(query_param("part", "contentDetails"))
        .and(query_param("id", ids))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_delete(server: &MockServer, playlist_id: &str, times: u64) {
    Mock::given(method("DELETE"))
        .and(path("/youtube/v3/playlists"))
        .and(query_param("id", playlist_id))
        .respond_with(ResponseTemplate::new(204))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn sums_durations_of_playlist_videos() {
    let server = MockServer::start().await;
    mount_items(&server, "PL1", &["a", "b", "c"]).await;
    mount_videos(&server, "a,b,c", &["PT1H2M3S", "PT45S", "PT10M"]).await;

    let total = playlist_duration(&youtube(&server), "PL1").await.unwrap();

    assert!((total - 4368.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn empty_playlist_skips_video_lookup() {
    let server = MockServer::start().await;
    mount_items(&server, "PL1", &[]).await;
    Mock::given(path("/youtube/v3/videos"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let total = playlist_duration(&youtube(&server), "PL1").await.unwrap();

    assert!(total.abs() < f64::EPSILON);
}

#[tokio::test]
async fn api_errors_propagate() {
    let server = MockServer::start().await;
    Mock::given(path("/youtube/v3/playlistItems"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "quotaExceeded" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(playlist_duration(&youtube(&server), "PL1").await.is_err());
}

#[tokio::test]
async fn deletes_first_matching_playlist_after_waiting() {
    let server = MockServer::start().await;
    mount_playlists(
        &server,
        vec![
            playlist_json("PL0", "keep me"),
            playlist_json("PL1", "asdf"),
            playlist_json("PL2", "asdf"),
        ],
    )
    .await;
    mount_items(&server, "PL1", &["a", "b"]).await;
    mount_videos(&server, "a,b", &["PT1S", "PT1S"]).await;
    mount_delete(&server, "PL1", 1).await;
    mount_delete(&server, "PL2", 0).await;

    let deleted = reap_playlist(
        &youtube(&server),
        &ReapOptions {
            title: "asdf".to_string(),
            divisor: 1000,
            grace: 0.0,
        },
    )
    .await
    .unwrap();

    assert_eq!(deleted.id, "PL1");
}

#[tokio::test]
async fn missing_title_never_deletes() {
    let server = MockServer::start().await;
    mount_playlists(&server, vec![playlist_json("PL0", "keep me")]).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let err = reap_playlist(
        &youtube(&server),
        &ReapOptions {
            title: "asdf".to_string(),
            divisor: 2,
            grace: 0.0,
        },
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("asdf"));
}

#[tokio::test]
async fn zero_divisor_never_deletes() {
    let server = MockServer::start().await;
    mount_playlists(&server, vec![playlist_json("PL1", "asdf")]).await;
    mount_items(&server, "PL1", &["a"]).await;
    mount_videos(&server, "a", &["PT16M40S"]).await;
    mount_delete(&server, "PL1", 0).await;

    let result = reap_playlist(
        &youtube(&server),
        &ReapOptions {
            title: "asdf".to_string(),
            divisor: 0,
            grace: 5.0,
        },
    )
    .await;

    assert!(result.is_err());
}
