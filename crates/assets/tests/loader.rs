use std::fs;
use std::path::Path;
use std::time::Duration;

use assets::{Resource, ResourceCause, ResourceLoader, ResourceRequest};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn write_fixtures(root: &Path) {
    fs::write(root.join("shader.vs.glsl"), "#version 450\nvoid main() {}\n").unwrap();
    fs::write(root.join("mesh.json"), r#"{"meshes": [{"vertices": [], "faces": []}]}"#).unwrap();
    fs::write(root.join("broken.json"), r#"{"meshes": [{"vertices": "#).unwrap();
    image::RgbaImage::from_pixel(2, 1, image::Rgba([10, 20, 30, 255]))
        .save(root.join("texture.png"))
        .unwrap();
}

fn loader(root: &Path) -> ResourceLoader {
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    ResourceLoader::with_client(root, http)
}

/// Answers every connection with the given status line and body.
async fn serve(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{addr}/resource")
}

/// Accepts connections and never responds.
async fn stall() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}/never")
}

#[tokio::test]
async fn resolves_when_every_fetch_succeeds() {
    let temp = tempfile::tempdir().unwrap();
    write_fixtures(temp.path());

    let resources = loader(temp.path())
        .load(&[
            ResourceRequest::text("vs", "shader.vs.glsl"),
            ResourceRequest::json("mesh", "mesh.json"),
            ResourceRequest::image("tex", "texture.png"),
        ])
        .await
        .expect("all resources load");

    assert_eq!(resources.len(), 3);
    assert!(resources.text("vs").unwrap().starts_with("#version 450"));
    assert!(resources.json("mesh").unwrap()["meshes"].is_array());
    assert_eq!(resources.image("tex").unwrap().dimensions(), (2, 1));
    assert!(resources.text("mesh").is_none());
}

#[tokio::test]
async fn one_missing_file_rejects_the_batch() {
    let temp = tempfile::tempdir().unwrap();
    write_fixtures(temp.path());

    let err = loader(temp.path())
        .load(&[
            ResourceRequest::text("vs", "shader.vs.glsl"),
            ResourceRequest::text("fs", "missing.fs.glsl"),
            ResourceRequest::image("tex", "texture.png"),
        ])
        .await
        .unwrap_err();

    assert!(err.url.ends_with("missing.fs.glsl"), "{}", err.url);
    assert!(matches!(err.cause, ResourceCause::Io(_)));
}

#[tokio::test]
async fn malformed_json_rejects_the_batch() {
    let temp = tempfile::tempdir().unwrap();
    write_fixtures(temp.path());

    let err = loader(temp.path())
        .load(&[
            ResourceRequest::json("mesh", "mesh.json"),
            ResourceRequest::json("broken", "broken.json"),
        ])
        .await
        .unwrap_err();

    assert!(err.url.ends_with("broken.json"));
    assert!(matches!(err.cause, ResourceCause::Json(_)));
}

#[tokio::test]
async fn undecodable_image_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    write_fixtures(temp.path());

    let err = loader(temp.path())
        .fetch(&ResourceRequest::image("tex", "shader.vs.glsl"))
        .await
        .unwrap_err();
    assert!(matches!(err.cause, ResourceCause::Image(_)));
}

#[tokio::test]
async fn http_success_and_failure_statuses() {
    let temp = tempfile::tempdir().unwrap();
    let ok_url = serve("200 OK", "void main() {}").await;
    let missing_url = serve("404 Not Found", "").await;
    let loader = loader(temp.path());

    match loader.fetch(&ResourceRequest::text("fs", ok_url.as_str())).await {
        Ok(Resource::Text(text)) => assert_eq!(text, "void main() {}"),
        other => panic!("expected text, got {other:?}"),
    }

    let err = loader
        .load(&[
            ResourceRequest::text("fs", ok_url.as_str()),
            ResourceRequest::text("vs", missing_url.as_str()),
        ])
        .await
        .unwrap_err();
    assert_eq!(err.url, missing_url);
    assert!(matches!(err.cause, ResourceCause::Status(404)));
}

#[tokio::test]
async fn first_failure_drops_fetches_still_in_flight() {
    let temp = tempfile::tempdir().unwrap();
    let stalled_url = stall().await;
    let loader = loader(temp.path());

    let requests = [
        ResourceRequest::text("vs", stalled_url.as_str()),
        ResourceRequest::text("fs", "missing.fs.glsl"),
    ];
    let result = tokio::time::timeout(Duration::from_secs(2), loader.load(&requests))
        .await
        .expect("load waited on the stalled fetch");

    let err = result.unwrap_err();
    assert!(err.url.ends_with("missing.fs.glsl"), "{}", err.url);
    assert!(matches!(err.cause, ResourceCause::Io(_)));
}
