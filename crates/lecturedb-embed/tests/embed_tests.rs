use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use lecturedb_core::config::{EmbeddingBackend, Settings};
use lecturedb_core::traits::Embedder;
use lecturedb_core::Error;
use lecturedb_embed::{get_default_embedder, FakeEmbedder, GeminiEmbedder};

fn unreachable_settings() -> Settings {
    let mut settings = Settings::default();
    settings.gemini.api_key = Some("test-key".to_string());
    // Nothing listens on the discard port.
    settings.gemini.base_url = "http://127.0.0.1:9".to_string();
    settings.gemini.timeout_secs = 2;
    settings
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = FakeEmbedder::new(64);
    let texts = vec!["hello world".to_string(), "hello world".to_string(), "other text".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    assert_eq!(embs.len(), 3);
    let v1 = &embs[0];

    assert_eq!(v1.len(), 64, "embedding dim follows configuration");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    assert_eq!(embs[0], embs[1], "deterministic for same input");
    assert_ne!(embs[0], embs[2]);
}

#[test]
fn configured_fake_backend_is_selected() {
    let mut settings = Settings::default();
    settings.embedding.backend = EmbeddingBackend::Fake;
    settings.embedding.dimension = 32;
    let embedder = get_default_embedder(&settings).expect("embedder");
    assert_eq!(embedder.dim(), 32);
    assert_eq!(embedder.model_id(), "fake:xxhash64");
}

#[test]
fn gemini_requires_api_key() {
    let settings = Settings::default();
    let err = GeminiEmbedder::new(&settings.gemini, &settings.embedding).err().expect("missing key");
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn gemini_empty_batch_skips_network() {
    let settings = unreachable_settings();
    let embedder = GeminiEmbedder::new(&settings.gemini, &settings.embedding).expect("embedder");
    assert_eq!(embedder.dim(), 1536);
    assert_eq!(embedder.model_id(), "models/text-embedding-004");
    assert!(embedder.embed_batch(&[]).expect("empty").is_empty());
}

#[test]
fn gemini_transport_failure_is_service_error() {
    let settings = unreachable_settings();
    let embedder = GeminiEmbedder::new(&settings.gemini, &settings.embedding).expect("embedder");
    let err = embedder.embed_batch(&["hello".to_string()]).expect_err("no server");
    assert!(matches!(err, Error::EmbeddingService(_)), "got {err:?}");
    assert!(!err.to_string().contains("test-key"), "api key must not leak into errors");
}

#[test]
fn fake_embedder_with_zero_dimension_does_not_panic() {
    let embedder = FakeEmbedder::new(0);
    assert_eq!(embedder.embed_batch(&["hello world".to_string()]).expect("embed"), vec![Vec::<f32>::new()]);
}

/// Answers `batchEmbedContents` with `[i, batch_len]` for a text `t{i}` and
/// records how many requests each call carried.
fn serve_batch_embeddings(stream: TcpStream, calls: &Mutex<Vec<usize>>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut writer = stream;
    loop {
        let mut content_length = 0usize;
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            return;
        }
        loop {
            line.clear();
            reader.read_line(&mut line).expect("header");
            let header = line.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().expect("content length");
                }
            }
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).expect("body");
        let request: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        let requests = request["requests"].as_array().expect("requests");
        calls.lock().unwrap().push(requests.len());

        let embeddings: Vec<serde_json::Value> = requests
            .iter()
            .map(|r| {
                let text = r["content"]["parts"][0]["text"].as_str().expect("text");
                let i: f32 = text.trim_start_matches('t').parse().expect("numbered text");
                serde_json::json!({ "values": [i, requests.len() as f32] })
            })
            .collect();
        let payload = serde_json::json!({ "embeddings": embeddings }).to_string();
        write!(
            writer,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            payload.len(),
            payload
        )
        .expect("write response");
        writer.flush().expect("flush");
    }
}

#[test]
fn gemini_splits_large_batches_and_keeps_input_order() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let calls = Arc::new(Mutex::new(Vec::new()));
    let server_calls = calls.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let calls = server_calls.clone();
            thread::spawn(move || serve_batch_embeddings(stream, &calls));
        }
    });

    let mut settings = Settings::default();
    settings.gemini.api_key = Some("test-key".to_string());
    settings.gemini.base_url = format!("http://{addr}");
    settings.gemini.timeout_secs = 10;
    settings.embedding.dimension = 2;
    let embedder = GeminiEmbedder::new(&settings.gemini, &settings.embedding).expect("embedder");

    let texts: Vec<String> = (0..250).map(|i| format!("t{i}")).collect();
    let vectors = embedder.embed_batch(&texts).expect("embed");

    assert_eq!(*calls.lock().unwrap(), [100, 100, 50]);
    assert_eq!(vectors.len(), 250);
    for (i, v) in vectors.iter().enumerate() {
        assert_eq!(v[0], i as f32, "row {i} out of order");
    }
    assert_eq!(vectors[249][1], 50.0);
}
