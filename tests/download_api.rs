//! End-to-end tests of the download routes against a fake `yt-dlp`.

#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{progress_url, sse_data, FakeMode, TestHarness};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn progress_stream_then_fetch_file() {
    let (harness, addr) = TestHarness::with_server(FakeMode::Success).await;
    let client = reqwest::Client::new();

    let resp = client.get(progress_url(addr, "137")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = sse_data(&resp.text().await.unwrap());
    assert_eq!(events.first().map(String::as_str), Some("started"));
    assert_eq!(
        &events[1..events.len() - 1],
        &[
            "progress:0.0",
            "progress:12.5",
            "progress:50.0",
            "progress:87.3",
            "progress:99.0",
            "progress:99.9",
        ]
    );

    let job_id = events
        .last()
        .and_then(|e| e.strip_prefix("done:"))
        .expect("stream should end with done")
        .to_string();
    assert_eq!(
        harness.download_files(),
        vec![format!("{job_id}.mp4"), format!("{job_id}.txt")]
    );

    let file = client
        .get(format!("http://{addr}/api/files/{job_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(file.status(), 200);
    assert_eq!(file.headers()["content-type"], "video/mp4");
    let disposition = file.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(
        disposition.contains("filename=\"Test Video Part 1.mp4\""),
        "{disposition}"
    );
    assert_eq!(&file.bytes().await.unwrap()[..], b"fake media payload");
}

#[tokio::test]
#[serial]
async fn wrong_container_is_renamed() {
    let (harness, addr) = TestHarness::with_server(FakeMode::WrongExtension).await;

    let body = reqwest::get(progress_url(addr, "137"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let events = sse_data(&body);
    let job_id = events
        .last()
        .and_then(|e| e.strip_prefix("done:"))
        .unwrap_or_else(|| panic!("expected done, got {events:?}"));

    assert!(harness
        .downloads_dir()
        .join(format!("{job_id}.mp4"))
        .is_file());
    assert!(!harness
        .downloads_dir()
        .join(format!("{job_id}.mkv"))
        .exists());
}

#[tokio::test]
#[serial]
async fn failed_download_reports_single_error() {
    let (harness, addr) = TestHarness::with_server(FakeMode::Fail).await;

    let body = reqwest::get(progress_url(addr, "137"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let events = sse_data(&body);

    assert_eq!(events.first().map(String::as_str), Some("started"));
    assert_eq!(events.len(), 2, "{events:?}");
    let message = events[1].strip_prefix("error:").expect("terminal error");
    assert!(message.starts_with("downloader exited with code 1"), "{message}");
    assert!(message.contains("Video unavailable"), "{message}");
    assert!(!message.contains('\n'));

    assert!(harness
        .download_files()
        .iter()
        .all(|name| name.ends_with(".txt")));
}

#[tokio::test]
#[serial]
async fn empty_output_is_an_error() {
    let (harness, addr) = TestHarness::with_server(FakeMode::EmptyOutput).await;

    let body = reqwest::get(progress_url(addr, "137"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let events = sse_data(&body);
    assert_eq!(
        events.last().map(String::as_str),
        Some("error:downloaded file is empty")
    );

    // The failed job's output is left for the caller to inspect or remove.
    let files = harness.download_files();
    let empty: Vec<_> = files.iter().filter(|n| n.ends_with(".mp4")).collect();
    assert_eq!(empty.len(), 1, "{files:?}");
    let size = std::fs::metadata(harness.downloads_dir().join(empty[0]))
        .unwrap()
        .len();
    assert_eq!(size, 0);
}

#[tokio::test]
#[serial]
async fn disconnect_kills_download_and_removes_partial_file() {
    let (harness, addr) = TestHarness::with_server(FakeMode::Hang).await;

    let mut resp = reqwest::get(progress_url(addr, "137")).await.unwrap();
    let mut seen = String::new();
    while !seen.contains("progress:10.0") {
        let chunk = tokio::time::timeout(Duration::from_secs(10), resp.chunk())
            .await
            .expect("progress should arrive")
            .unwrap()
            .expect("stream ended early");
        seen.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(harness.download_files().iter().any(|n| n.ends_with(".mp4")));
    drop(resp);

    // Disconnect is noticed on the next read or keep-alive write.
    let mut clean = false;
    for _ in 0..200 {
        if harness.download_files().iter().all(|n| n.ends_with(".txt")) {
            clean = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(clean, "partial output left behind: {:?}", harness.download_files());
}

#[tokio::test]
#[serial]
async fn blocking_download_returns_attachment() {
    let (harness, addr) = TestHarness::with_server(FakeMode::Success).await;

    let resp = reqwest::get(format!(
        "http://{addr}/api/download?url=https%3A%2F%2Fvideos.example.com%2Fv&format_id=136"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .contains("Test Video Part 1.mp4"));
    assert_eq!(&resp.bytes().await.unwrap()[..], b"fake media payload");

    let files = harness.download_files();
    assert_eq!(files.len(), 2, "{files:?}");
}

#[tokio::test]
#[serial]
async fn blocking_download_failure_is_bad_gateway() {
    let (_harness, addr) = TestHarness::with_server(FakeMode::Fail).await;

    let resp = reqwest::get(format!(
        "http://{addr}/api/download?url=https%3A%2F%2Fvideos.example.com%2Fv&format_id=136"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 502);
    assert!(resp.headers().contains_key("x-request-id"));

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "download_error");
    assert_eq!(body["kind"], "process_exit");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
#[serial]
async fn option_like_inputs_are_rejected() {
    let (harness, addr) = TestHarness::with_server(FakeMode::Success).await;

    let resp = reqwest::get(format!(
        "http://{addr}/api/download?url=--exec%3Dtouch%20x&format_id=137"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = reqwest::get(progress_url(addr, "--batch-file"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert!(harness.download_files().is_empty());
}
