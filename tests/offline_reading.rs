//! End-to-end sync and offline reading
//!
//! A wiremock server stands in for the corpus API; the reader runs against
//! on-disk stores in a temporary directory.

use app_core::{Reader, ReaderConfig, ReaderError, SyncError};
use networking::{NetworkMonitor, NetworkState};
use serde_json::{json, Value};
use std::path::Path;
use storage::models::{ChapterQuery, Place};
use storage::{ChangeKind, Collection, CorpusStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chapter_json(number: u32, verse_count: u32, place: &str) -> Value {
    json!({
        "nomor": number,
        "nama": format!("nama {}", number),
        "namaLatin": format!("Surah {}", number),
        "jumlahAyat": verse_count,
        "tempatTurun": place,
        "arti": format!("arti {}", number),
        "deskripsi": "",
        "audioFull": { "05": format!("https://audio/full/{:03}.mp3", number) }
    })
}

fn chapter_detail(number: u32, verse_count: u32) -> Value {
    let mut data = chapter_json(number, verse_count, "Mekah");
    data["ayat"] = (1..=verse_count)
        .map(|n| {
            json!({
                "nomorAyat": n,
                "teksArab": format!("arab {}:{}", number, n),
                "teksLatin": format!("latin {}:{}", number, n),
                "teksIndonesia": format!("terjemah {}:{}", number, n),
                "audio": {}
            })
        })
        .collect();
    json!({ "code": 200, "message": "ok", "data": data })
}

fn commentary_detail(number: u32, verse_count: u32) -> Value {
    let mut data = chapter_json(number, verse_count, "Mekah");
    data["tafsir"] = (1..=verse_count)
        .map(|n| json!({ "ayat": n, "teks": format!("tafsir {}:{}", number, n) }))
        .collect();
    json!({ "code": 200, "message": "ok", "data": data })
}

async fn mount_list(server: &MockServer, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/surat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "ok",
            "data": [chapter_json(1, 7, "Mekah"), chapter_json(2, 3, "Madinah")]
        })))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_chapter(server: &MockServer, number: u32, verse_count: u32, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/surat/{}", number)))
        .respond_with(ResponseTemplate::new(200).set_body_json(chapter_detail(number, verse_count)))
        .expect(expected)
        .mount(server)
        .await;
}

async fn open(dir: &Path, server: &MockServer, monitor: &NetworkMonitor) -> Reader {
    let config = ReaderConfig::new(dir).api_url(server.uri());
    Reader::open_with_monitor(config, monitor.clone()).await.unwrap()
}

#[tokio::test]
async fn test_first_run_then_offline_reading() {
    let server = MockServer::start().await;
    mount_list(&server, 1).await;
    mount_chapter(&server, 1, 7, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let monitor = NetworkMonitor::with_state(NetworkState::Online);
    let reader = open(dir.path(), &server, &monitor).await;

    let report = reader.sync_now().await.unwrap();
    assert_eq!(report.initialized, 2);

    let loaded = reader.load_chapter(1).await.unwrap();
    assert_eq!(loaded.verses.len(), loaded.chapter.verse_count as usize);
    assert!(loaded.verses.iter().all(|v| v.chapter == 1));
    assert!(loaded.chapter.last_updated.is_some());

    // The network goes away: reads come from the cache without fetching
    monitor.set_state(NetworkState::Offline);
    let cached = reader.load_chapter(1).await.unwrap();
    assert_eq!(cached, loaded);

    let offline_sync = reader.sync_now().await.unwrap();
    assert!(offline_sync.offline);

    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_cache_survives_restart() {
    let server = MockServer::start().await;
    mount_list(&server, 1).await;
    mount_chapter(&server, 2, 3, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let online = NetworkMonitor::with_state(NetworkState::Online);
    let reader = open(dir.path(), &server, &online).await;
    reader.sync_now().await.unwrap();
    reader.load_chapter(2).await.unwrap();
    reader.close().await.unwrap();

    let offline = NetworkMonitor::with_state(NetworkState::Offline);
    let reader = open(dir.path(), &server, &offline).await;

    let loaded = reader.load_chapter(2).await.unwrap();
    assert_eq!(loaded.verses.len(), 3);
    assert_eq!(loaded.verses[2].translation, "terjemah 2:3");

    let medina = reader.chapters(&ChapterQuery::all().place(Place::Medina)).await.unwrap();
    assert_eq!(medina.len(), 1);
    assert_eq!(medina[0].number, 2);

    let by_number = reader.chapters(&ChapterQuery::all().search("1")).await.unwrap();
    assert_eq!(by_number.iter().map(|c| c.number).collect::<Vec<_>>(), vec![1]);

    // Chapter 1 was never loaded
    assert!(reader.load_chapter(1).await.unwrap().verses.is_empty());
    reader.close().await.unwrap();
}

#[tokio::test]
async fn test_first_run_offline_fails() {
    let server = MockServer::start().await;
    mount_list(&server, 0).await;

    let dir = tempfile::tempdir().unwrap();
    let offline = NetworkMonitor::with_state(NetworkState::Offline);
    let reader = open(dir.path(), &server, &offline).await;

    let error = reader.sync_now().await.unwrap_err();
    assert!(matches!(error, ReaderError::Sync(SyncError::Initialization(_))));
    assert!(error.to_string().contains("first-time setup"));
    assert!(reader.chapters(&ChapterQuery::all()).await.unwrap().is_empty());

    assert!(matches!(
        reader.load_chapter(1).await,
        Err(ReaderError::Sync(SyncError::NotFound(1)))
    ));
}

#[tokio::test]
async fn test_sweep_refreshes_never_updated_chapters_once() {
    let server = MockServer::start().await;
    mount_list(&server, 1).await;
    mount_chapter(&server, 1, 7, 1).await;
    mount_chapter(&server, 2, 3, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let online = NetworkMonitor::with_state(NetworkState::Online);
    let reader = open(dir.path(), &server, &online).await;

    reader.sync_now().await.unwrap();
    let sweep = reader.sync_now().await.unwrap();
    assert_eq!(sweep.refreshed, vec![1, 2]);

    // Everything is fresh now; the mocks' call counts are checked on drop
    let idle = reader.sync_now().await.unwrap();
    assert!(idle.refreshed.is_empty());
    assert_eq!(reader.store().verses(2).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_user_sync_surfaces_failures_but_keeps_going() {
    let server = MockServer::start().await;
    mount_list(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/surat/1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_chapter(&server, 2, 3, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let online = NetworkMonitor::with_state(NetworkState::Online);
    let reader = open(dir.path(), &server, &online).await;
    reader.sync_now().await.unwrap();

    let error = reader.sync_now().await.unwrap_err();
    assert!(matches!(error, ReaderError::Sync(SyncError::Network(_))));

    let store = reader.store();
    assert!(store.chapter(1).await.unwrap().unwrap().last_updated.is_none());
    assert!(store.chapter(2).await.unwrap().unwrap().last_updated.is_some());
}

#[tokio::test]
async fn test_read_degrades_when_server_fails() {
    let server = MockServer::start().await;
    mount_list(&server, 1).await;

    let dir = tempfile::tempdir().unwrap();
    let online = NetworkMonitor::with_state(NetworkState::Online);
    let reader = open(dir.path(), &server, &online).await;
    reader.sync_now().await.unwrap();

    Mock::given(method("GET"))
        .and(path("/surat/2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    // The refresh fails, the cached chapter record is still served
    let loaded = reader.load_chapter(2).await.unwrap();
    assert_eq!(loaded.chapter.name_latin, "Surah 2");
    assert!(loaded.verses.is_empty());
}

#[tokio::test]
async fn test_commentary_and_change_notifications() {
    let server = MockServer::start().await;
    mount_list(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/tafsir/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(commentary_detail(2, 3)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let online = NetworkMonitor::with_state(NetworkState::Online);
    let reader = open(dir.path(), &server, &online).await;
    reader.sync_now().await.unwrap();

    let mut updates = reader.store().subscribe(Collection::Commentary);
    let loaded = reader.load_commentary(2).await.unwrap();
    assert_eq!(loaded.entries.len(), 3);
    assert_eq!(loaded.entries[1].text, "tafsir 2:2");

    let deleted = updates.recv().await.unwrap();
    assert_eq!(deleted.change, ChangeKind::Deleted { count: 0 });
    let inserted = updates.recv().await.unwrap();
    assert_eq!(inserted.change, ChangeKind::Inserted { count: 3 });
    assert_eq!(inserted.chapter, Some(2));
}
