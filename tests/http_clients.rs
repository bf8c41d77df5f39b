//! HTTP client tests against a canned local server

mod common;

use common::{png, CannedServer};
use morph_canvas::{
    BackgroundEntry, BackgroundRemover, CatalogSource, HttpCatalogSource, HttpUploadService,
    MorphError, RemovalClient, ServiceConfig, SourceImage, UploadService,
};
use serde_json::json;
use std::time::Duration;

fn config(url: &str) -> ServiceConfig {
    ServiceConfig::builder()
        .backend_url(url)
        .request_timeout_secs(5)
        .build()
        .expect("valid config")
}

fn photo() -> SourceImage {
    SourceImage::new(png(2, 2, [9, 9, 9, 255]), Some("image/png".to_string()), "shoe.png")
}

#[tokio::test]
async fn test_removal_client_posts_multipart_image() {
    let server = CannedServer::start(|_| {
        (200, json!({ "processedImageUrl": "data:image/png;base64,AAAA" }).to_string())
    })
    .await;

    let client = RemovalClient::new(&config(&server.url)).unwrap();
    let url = client.remove_background(&photo()).await.unwrap();
    assert_eq!(url, "data:image/png;base64,AAAA");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/remove-background");
    assert!(requests[0].body_contains("name=\"image\""));
    assert!(requests[0].body_contains("filename=\"shoe.png\""));
    assert!(requests[0].body_contains("Content-Type: image/png"));
}

#[tokio::test]
async fn test_removal_client_sends_malformed_mime_as_png() {
    let server = CannedServer::start(|_| {
        (200, json!({ "processedImageUrl": "data:image/png;base64,AAAA" }).to_string())
    })
    .await;

    let client = RemovalClient::new(&config(&server.url)).unwrap();
    let image = SourceImage::new(png(2, 2, [9, 9, 9, 255]), Some("image/png; =".to_string()), "p.png");
    assert_eq!(
        client.remove_background(&image).await.unwrap(),
        "data:image/png;base64,AAAA"
    );

    let request = &server.requests()[0];
    assert!(request.body_contains("Content-Type: image/png\r\n"));
    assert!(!request.body_contains("; ="));
}

#[tokio::test]
async fn test_removal_client_reports_upstream_status() {
    let server = CannedServer::start(|_| (500, "model crashed".to_string())).await;

    let client = RemovalClient::new(&config(&server.url)).unwrap();
    let err = client.remove_background(&photo()).await.unwrap_err();
    assert!(matches!(err, MorphError::RemoteService(_)));
    assert_eq!(
        err.to_string(),
        "Backend background removal failed: 500 - model crashed"
    );
}

#[tokio::test]
async fn test_removal_client_requires_processed_url() {
    let server = CannedServer::start(|_| (200, json!({ "ok": true }).to_string())).await;

    let client = RemovalClient::new(&config(&server.url)).unwrap();
    let err = client.remove_background(&photo()).await.unwrap_err();
    assert_eq!(err.to_string(), "Backend did not return processedImageUrl");
}

#[tokio::test]
async fn test_removal_client_unreachable_backend() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = RemovalClient::new(&config(&url)).unwrap();
    let err = client.remove_background(&photo()).await.unwrap_err();
    assert!(matches!(err, MorphError::RemoteService(_)));
}

#[tokio::test]
async fn test_health_probe() {
    let healthy = CannedServer::start(|_| (200, json!({ "status": "ok" }).to_string())).await;
    let client = RemovalClient::new(&config(&healthy.url)).unwrap();
    assert!(client.health().await.unwrap());
    assert_eq!(healthy.requests()[0].path, "/health");

    let sick = CannedServer::start(|_| (500, String::new())).await;
    let client = RemovalClient::new(&config(&sick.url)).unwrap();
    assert!(!client.health().await.unwrap());
}

#[tokio::test]
async fn test_http_upload_service_success() {
    let server = CannedServer::start(|_| {
        (200, json!({ "processedImageUrl": "data:image/png;base64,BBBB" }).to_string())
    })
    .await;

    let uploads = HttpUploadService::new(&server.url, "morph", Duration::from_secs(5)).unwrap();
    let background = BackgroundEntry::new("bg1.png").unwrap();
    let outcome = uploads.upload(&photo(), &background).await;
    assert_eq!(outcome, Ok("data:image/png;base64,BBBB".to_string()));

    let request = &server.requests()[0];
    assert_eq!(request.path, "/api/upload");
    assert!(request.body_contains("name=\"projectType\""));
    assert!(request.body_contains("morph"));
    assert!(request.body_contains("name=\"backgroundChoice\""));
    assert!(request.body_contains("bg1.png"));
}

#[tokio::test]
async fn test_http_upload_service_sends_malformed_mime_as_png() {
    let server = CannedServer::start(|_| {
        (200, json!({ "processedImageUrl": "data:image/png;base64,CCCC" }).to_string())
    })
    .await;

    let uploads = HttpUploadService::new(&server.url, "base", Duration::from_secs(5)).unwrap();
    let image = SourceImage::new(vec![1, 2, 3], Some("image/jpeg; charset".to_string()), "p.jpg");
    let outcome = uploads
        .upload(&image, &BackgroundEntry::new("bg1.png").unwrap())
        .await;
    assert_eq!(outcome, Ok("data:image/png;base64,CCCC".to_string()));
    assert!(server.requests()[0].body_contains("Content-Type: image/png\r\n"));
}

#[tokio::test]
async fn test_http_upload_service_failure_messages() {
    let server = CannedServer::start(|request| {
        if request.body_contains("bg1.png") {
            (
                500,
                json!({ "error": "Image processing failed", "details": "Background image not found: public/images/bg1.png" })
                    .to_string(),
            )
        } else if request.body_contains("bg2.png") {
            (502, "<html>bad gateway</html>".to_string())
        } else {
            (200, json!({}).to_string())
        }
    })
    .await;

    let uploads = HttpUploadService::new(&server.url, "base", Duration::from_secs(5)).unwrap();
    let upload = |name: &'static str| {
        let uploads = uploads.clone();
        async move {
            uploads
                .upload(&photo(), &BackgroundEntry::new(name).unwrap())
                .await
        }
    };

    assert_eq!(
        upload("bg1.png").await,
        Err("Background image not found: public/images/bg1.png".to_string())
    );
    assert_eq!(upload("bg2.png").await, Err("Failed: 502".to_string()));
    assert_eq!(
        upload("bg3.png").await,
        Err("No processed image URL returned".to_string())
    );
}

#[tokio::test]
async fn test_http_catalog_source() {
    let server = CannedServer::start(|_| {
        (
            200,
            json!({ "count": 3, "backgrounds": ["bg1.png", "../etc/passwd", "bg2.png"] }).to_string(),
        )
    })
    .await;

    let source = HttpCatalogSource::new(&server.url, "base", Duration::from_secs(5)).unwrap();
    let listing = source.fetch().await.unwrap();
    assert_eq!(listing.count, 2);
    assert!(listing.contains("bg1.png"));
    assert!(listing.contains("bg2.png"));
    assert_eq!(server.requests()[0].path, "/api/background-count?projectType=base");

    let failing = CannedServer::start(|_| {
        (500, json!({ "error": "Failed to fetch background count" }).to_string())
    })
    .await;
    let source = HttpCatalogSource::new(&failing.url, "base", Duration::from_secs(5)).unwrap();
    assert!(matches!(source.fetch().await, Err(MorphError::Catalog(_))));
}
