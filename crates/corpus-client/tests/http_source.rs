//! Integration tests for the HTTP corpus source
//!
//! A wiremock server stands in for the corpus API so the full
//! request/decode/validate path is exercised.

use corpus_client::{ApiClientConfig, HttpRemoteSource, RemoteSource, SourceError};
use serde_json::{json, Value};
use std::time::Duration;
use storage::models::{Narrator, Place};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chapter_json(number: u32, verse_count: u32) -> Value {
    json!({
        "nomor": number,
        "nama": "الفاتحة",
        "namaLatin": "Al-Fatihah",
        "jumlahAyat": verse_count,
        "tempatTurun": "Mekah",
        "arti": "Pembukaan",
        "deskripsi": "Surat pembuka",
        "audioFull": {
            "01": "https://audio/full/01/001.mp3",
            "05": "https://audio/full/05/001.mp3"
        }
    })
}

fn chapter_detail_json(number: u32, verse_count: u32) -> Value {
    let mut data = chapter_json(number, verse_count);
    let verses: Vec<Value> = (1..=verse_count)
        .map(|n| {
            json!({
                "nomorAyat": n,
                "teksArab": format!("arab {}", n),
                "teksLatin": format!("latin {}", n),
                "teksIndonesia": format!("terjemah {}", n),
                "audio": { "05": format!("https://audio/partial/05/{:03}{:03}.mp3", number, n) }
            })
        })
        .collect();
    data["ayat"] = Value::Array(verses);
    json!({ "code": 200, "message": "ok", "data": data })
}

async fn source_for(server: &MockServer) -> HttpRemoteSource {
    let config = ApiClientConfig::new(server.uri()).timeout(Duration::from_secs(5));
    HttpRemoteSource::new(config).unwrap()
}

#[tokio::test]
async fn test_fetch_chapter_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/surat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "message": "ok",
            "data": [chapter_json(2, 286), chapter_json(1, 7)]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let chapters = source_for(&server).await.fetch_chapter_list().await.unwrap();

    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0].number, 1);
    assert_eq!(chapters[1].number, 2);
    assert!(chapters.iter().all(|c| c.last_updated.is_none()));
    assert_eq!(chapters[0].place, Place::Mecca);
}

#[tokio::test]
async fn test_fetch_chapter_maps_verses_and_stamps_time() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/surat/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chapter_detail_json(1, 7)))
        .mount(&server)
        .await;

    let before = chrono::Utc::now().timestamp_millis();
    let fetched = source_for(&server).await.fetch_chapter(1).await.unwrap();

    assert_eq!(fetched.chapter.number, 1);
    assert!(fetched.chapter.last_updated.unwrap() >= before);
    assert_eq!(fetched.verses.len(), 7);
    assert!(fetched.verses.iter().all(|v| v.chapter == 1));
    assert_eq!(
        fetched.verses[6].audio.get(&Narrator::MisyariRasyidAlAfasi).map(String::as_str),
        Some("https://audio/partial/05/001007.mp3")
    );
}

#[tokio::test]
async fn test_fetch_chapter_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/surat/999"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "code": 404, "message": "Surat tidak ditemukan" })),
        )
        .mount(&server)
        .await;

    let result = source_for(&server).await.fetch_chapter(999).await;
    assert_eq!(result.unwrap_err(), SourceError::NotFound(999));
}

#[tokio::test]
async fn test_server_error_is_network_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tafsir/3"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let result = source_for(&server).await.fetch_commentary(3).await;
    assert!(matches!(result, Err(SourceError::Network(_))));
}

#[tokio::test]
async fn test_transport_failure_is_network_error() {
    // Nothing listens on the server's address once it is dropped
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let source = HttpRemoteSource::new(ApiClientConfig::new(uri)).unwrap();
    let result = source.fetch_chapter_list().await;
    assert!(matches!(result, Err(SourceError::Network(_))));
}

#[tokio::test]
async fn test_verse_count_mismatch_rejected() {
    let server = MockServer::start().await;

    let mut body = chapter_detail_json(1, 7);
    body["data"]["jumlahAyat"] = json!(8);

    Mock::given(method("GET"))
        .and(path("/surat/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let result = source_for(&server).await.fetch_chapter(1).await;
    assert!(matches!(result, Err(SourceError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_fetch_commentary() {
    let server = MockServer::start().await;

    let mut data = chapter_json(1, 2);
    data["tafsir"] = json!([
        { "ayat": 2, "teks": "second" },
        { "ayat": 1, "teks": "first" }
    ]);

    Mock::given(method("GET"))
        .and(path("/tafsir/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 200, "data": data })))
        .mount(&server)
        .await;

    let fetched = source_for(&server).await.fetch_commentary(1).await.unwrap();
    assert!(fetched.chapter.last_updated.is_some());
    let verses: Vec<u32> = fetched.entries.iter().map(|e| e.verse).collect();
    assert_eq!(verses, vec![1, 2]);
    assert_eq!(fetched.entries[0].text, "first");
}

#[tokio::test]
async fn test_repeated_commentary_verse_rejected() {
    let server = MockServer::start().await;

    let mut data = chapter_json(1, 3);
    data["tafsir"] = json!([
        { "ayat": 1, "teks": "one" },
        { "ayat": 2, "teks": "two" },
        { "ayat": 3, "teks": "three" },
        { "ayat": 3, "teks": "three again" }
    ]);

    Mock::given(method("GET"))
        .and(path("/tafsir/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 200, "data": data })))
        .mount(&server)
        .await;

    let result = source_for(&server).await.fetch_commentary(1).await;
    assert!(matches!(result, Err(SourceError::InvalidResponse(_))));
}
