use std::sync::Arc;

use anifin_engine::providers::{EmbedProvider, VoeProvider};
use anifin_engine::{ProviderError, ReqwestFetcher};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn landing_page(source: &str) -> String {
    let reversed: String = format!(r#"{{"source":"{source}"}}"#).chars().rev().collect();
    format!(
        "<html><script>var a168c='{}'; player.init();</script></html>",
        STANDARD.encode(reversed)
    )
}

async fn mount_embed(server: &MockServer) {
    let embed = format!(
        "<html><script>window.location.href = '{}/e/abc123';</script></html>",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/embed/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(embed, "text/html"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/e/abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(landing_page("https://cdn.example/abc123/master.m3u8"), "text/html"),
        )
        .mount(server)
        .await;
}

fn provider() -> VoeProvider {
    VoeProvider::new(Arc::new(ReqwestFetcher::default()))
}

#[tokio::test]
async fn direct_link_follows_inline_redirect() {
    let server = MockServer::start().await;
    mount_embed(&server).await;

    let link = provider()
        .extract_direct_link(&format!("{}/embed/abc123", server.uri()))
        .await
        .expect("source extracted");
    assert_eq!(link, "https://cdn.example/abc123/master.m3u8");
}

#[tokio::test]
async fn page_without_source_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/embed/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gone</html>"))
        .mount(&server)
        .await;

    let err = provider()
        .extract_direct_link(&format!("{}/embed/empty", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::NoVideoSource);
}

#[tokio::test]
async fn preview_image_is_verified_with_head_request() {
    let server = MockServer::start().await;
    mount_embed(&server).await;
    Mock::given(method("HEAD"))
        .and(path("/cache/abc123_storyboard_L2.jpg"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let image = provider()
        .extract_preview_image(&format!("{}/embed/abc123", server.uri()))
        .await
        .expect("preview exists");
    assert_eq!(
        image,
        format!("{}/cache/abc123_storyboard_L2.jpg", server.uri())
    );
}

#[tokio::test]
async fn missing_preview_becomes_no_preview() {
    let server = MockServer::start().await;
    mount_embed(&server).await;

    let err = provider()
        .extract_preview_image(&format!("{}/embed/abc123", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NoPreview(_)), "{err:?}");
}
