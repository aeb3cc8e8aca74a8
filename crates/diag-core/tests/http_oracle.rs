//! `HttpOracle` against a throwaway local HTTP responder.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use diag_core::{
    EnrichOutcome, EnrichPolicy, Enricher, HttpOracle, OracleError, OracleRequest,
    ReasoningOracle, UnavailableReason,
};
use obd_catalog::{CodeCatalog, TroubleCode, VehicleContext};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// Captured request: head and body.
#[derive(Debug, Clone, Default)]
struct Captured {
    head: String,
    body: String,
}

async fn read_request(stream: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(split) = text.find("\r\n\r\n") {
            let head = text[..split].to_string();
            let content_length = head
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            let body_start = split + 4;
            if buf.len() >= body_start + content_length {
                let body = String::from_utf8_lossy(&buf[body_start..body_start + content_length])
                    .to_string();
                return Captured { head, body };
            }
        }
    }
    Captured::default()
}

/// Serve `status` + `body` to every connection; returns the URL, a hit
/// counter and the last captured request.
async fn responder(
    status: &'static str,
    body: &'static str,
) -> (String, Arc<AtomicUsize>, Arc<Mutex<Captured>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/rank", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let captured = Arc::new(Mutex::new(Captured::default()));

    let (task_hits, task_captured) = (hits.clone(), captured.clone());
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            task_hits.fetch_add(1, Ordering::SeqCst);
            let request = read_request(&mut stream).await;
            *task_captured.lock().await = request;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (url, hits, captured)
}

fn request() -> OracleRequest {
    let catalog = CodeCatalog::builtin().unwrap();
    let definition = catalog
        .lookup(&TroubleCode::try_from("P0171").unwrap())
        .unwrap();
    OracleRequest {
        definition: (*definition).clone(),
        vehicle_context: VehicleContext {
            make: Some("Toyota".into()),
            model: Some("Corolla".into()),
            year: Some(2015),
            engine: None,
        },
        symptoms: vec![],
    }
}

#[tokio::test]
async fn test_posts_request_and_decodes_reply() {
    let (url, hits, captured) = responder(
        "200 OK",
        r#"{"causes": ["MAF sensor", "Vacuum leak"], "fixes": ["Clean or replace MAF"]}"#,
    )
    .await;
    let oracle =
        HttpOracle::new(&url, Some("s3cret".into()), Duration::from_secs(2)).unwrap();

    let reply = oracle.rank(&request()).await.unwrap();
    assert_eq!(reply.causes, vec!["MAF sensor", "Vacuum leak"]);
    assert_eq!(reply.fixes, vec!["Clean or replace MAF"]);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let captured = captured.lock().await.clone();
    assert!(captured.head.starts_with("POST /rank"));
    assert!(captured
        .head
        .to_lowercase()
        .contains("authorization: bearer s3cret"));
    let sent: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(sent["definition"]["code"], "P0171");
    assert_eq!(sent["vehicle_context"]["make"], "Toyota");
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let (url, _hits, _captured) = responder("503 Service Unavailable", "{}").await;
    let oracle = HttpOracle::new(&url, None, Duration::from_secs(2)).unwrap();

    let err = oracle.rank(&request()).await.unwrap_err();
    assert_eq!(err, OracleError::Status { status: 503 });
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_bad_json_maps_to_decode() {
    let (url, _hits, _captured) = responder("200 OK", "not json at all").await;
    let oracle = HttpOracle::new(&url, None, Duration::from_secs(2)).unwrap();

    let err = oracle.rank(&request()).await.unwrap_err();
    assert!(matches!(err, OracleError::Decode(_)));
}

#[tokio::test]
async fn test_enricher_retries_server_error_once() {
    let (url, hits, _captured) = responder("500 Internal Server Error", "{}").await;
    let oracle = HttpOracle::new(&url, None, Duration::from_secs(2)).unwrap();
    let enricher = Enricher::new(
        Arc::new(oracle),
        EnrichPolicy {
            timeout: Duration::from_secs(5),
            retry_transient: true,
            max_causes: 5,
        },
    );

    let request = request();
    let outcome = enricher
        .enrich(&request.definition, &request.vehicle_context, &[])
        .await;
    assert!(matches!(
        outcome,
        EnrichOutcome::Unavailable(UnavailableReason::OracleFailed(_))
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    // bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let oracle = HttpOracle::new(
        &format!("http://{addr}/rank"),
        None,
        Duration::from_secs(2),
    )
    .unwrap();
    let err = oracle.rank(&request()).await.unwrap_err();
    assert!(err.is_transient(), "{err:?}");
}
