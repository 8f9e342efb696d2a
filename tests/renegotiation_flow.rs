//! Integration tests for the renegotiation workflow.
//! Spins canned single-connection HTTP fixtures and drives the full
//! select → aggregate → request → review → share path.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use finportal::api::PortalApi;
use finportal::config::PortalConfig;
use finportal::loans::selection::SelectionSet;
use finportal::loans::LoanAnalysis;
use finportal::proposal::requester::ProposalRequester;
use finportal::review::{ProposalReview, ReviewState};
use finportal::share::ShareChannel;
use finportal::PortalError;
use uuid::Uuid;

/// Canned HTTP fixture: serves the given `(status, body)` responses in
/// order, one per connection, then stops accepting. Counts connections.
struct Fixture {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

fn spawn_fixture(responses: Vec<(&'static str, String)>, delay: Option<Duration>) -> Fixture {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_srv = hits.clone();

    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::from_std(listener).unwrap();
        for (status, body) in responses {
            let Ok((mut sock, _)) = listener.accept().await else {
                return;
            };
            hits_srv.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 8192];
            let _ = sock.read(&mut buf).await;
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            let resp = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = sock.write_all(resp.as_bytes()).await;
        }
    });

    Fixture { addr, hits }
}

fn api_for(addr: SocketAddr) -> Arc<PortalApi> {
    let dir = tempfile::tempdir().unwrap();
    let config = PortalConfig::new(
        Some(dir.path().to_path_buf()),
        Some(format!("http://{addr}")),
        None,
    );
    Arc::new(PortalApi::new(&config).unwrap())
}

fn analysis_body() -> String {
    r#"{
        "total_emprestado": 2000.0,
        "total_pago": 1200.0,
        "total_a_vencer": 800.0,
        "emprestimos": [
            {"id": 1, "valor_a_vencer": 500.0, "a_vencer": 10, "quantidade_parcelas": 20, "parcelas_pagas": 10, "valor_parcela": 50.0},
            {"id": 2, "valor_a_vencer": 300.0, "a_vencer": 6, "quantidade_parcelas": 12, "parcelas_pagas": 6, "valor_parcela": 50.0}
        ]
    }"#
    .to_string()
}

fn proposal_body() -> String {
    r#"{
        "saldo_devedor_total": 800.0,
        "taxa_juros_aplicada": "0.5% a.m.",
        "opcoes_parcelamento": [
            {"numero_parcelas": 12, "valor_parcela": 75.50},
            {"numero_parcelas": 6, "valor_parcela": 145.20}
        ]
    }"#
    .to_string()
}

/// Captures dispatched payloads for assertions.
#[derive(Default)]
struct CapturingChannel {
    sent: Mutex<Vec<String>>,
}

impl ShareChannel for CapturingChannel {
    fn dispatch(&self, text: &str) {
        self.sent.lock().unwrap().push(text.to_string());
    }
}

#[tokio::test]
async fn full_flow_select_request_review_share() {
    let fixture = spawn_fixture(
        vec![("200 OK", analysis_body()), ("200 OK", proposal_body())],
        None,
    );
    let api = api_for(fixture.addr);

    // Toggles may land before the snapshot resolves; they are preserved and
    // re-validated against it once it lands.
    let mut selection = SelectionSet::new();
    selection.toggle("1");
    selection.toggle("2");
    selection.toggle("ghost");

    let analysis = api.client_analysis(&Uuid::new_v4()).await.unwrap();
    selection.prune(&analysis);

    assert_eq!(selection.selected_ids(), vec!["1".to_string(), "2".to_string()]);
    assert_eq!(selection.total(&analysis), 800.0);

    let requester = ProposalRequester::new(api);
    let proposal = requester.request(&selection).await.unwrap();
    assert_eq!(proposal.saldo_devedor_total, 800.0);

    let channel = CapturingChannel::default();
    let mut review = ProposalReview::new();
    review.open(proposal).unwrap();
    review.choose(12).unwrap();
    review.share(&channel).unwrap();

    assert!(review.is_closed());
    let sent = channel.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("R$ 800,00"));
    assert!(sent[0].contains("12x"));
    assert!(sent[0].contains("R$ 75,50"));

    assert_eq!(fixture.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn registry_fetch_failure_keeps_selection_empty() {
    let fixture = spawn_fixture(
        vec![("500 Internal Server Error", r#"{"error": "banco fora do ar"}"#.to_string())],
        None,
    );
    let api = api_for(fixture.addr);

    let err = api.client_analysis(&Uuid::new_v4()).await.unwrap_err();
    match &err {
        PortalError::RemoteRequest { reason } => assert!(reason.contains("banco fora do ar")),
        other => panic!("expected RemoteRequest, got {other}"),
    }

    // Nothing was selected and no aggregate beyond zero can be shown.
    let selection = SelectionSet::new();
    assert_eq!(selection.total(&LoanAnalysis::default()), 0.0);
}

#[tokio::test]
async fn server_reason_is_surfaced_on_proposal_rejection() {
    let fixture = spawn_fixture(
        vec![(
            "400 Bad Request",
            r#"{"error": "Nenhum empréstimo selecionado."}"#.to_string(),
        )],
        None,
    );
    let api = api_for(fixture.addr);

    let mut selection = SelectionSet::new();
    selection.toggle("1");

    let err = ProposalRequester::new(api)
        .request(&selection)
        .await
        .unwrap_err();
    match err {
        PortalError::RemoteRequest { reason } => {
            assert_eq!(reason, "Nenhum empréstimo selecionado.")
        }
        other => panic!("expected RemoteRequest, got {other}"),
    }
}

#[tokio::test]
async fn malformed_proposal_is_treated_as_fetch_failure() {
    // Duplicate installment counts violate the natural-key invariant.
    let body = r#"{
        "saldo_devedor_total": 800.0,
        "opcoes_parcelamento": [
            {"numero_parcelas": 12, "valor_parcela": 75.50},
            {"numero_parcelas": 12, "valor_parcela": 80.00}
        ]
    }"#;
    let fixture = spawn_fixture(vec![("200 OK", body.to_string())], None);
    let api = api_for(fixture.addr);

    let mut selection = SelectionSet::new();
    selection.toggle("1");

    let err = ProposalRequester::new(api)
        .request(&selection)
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::MalformedResponse(_)));
}

#[tokio::test]
async fn second_submit_while_in_flight_is_a_local_no_op() {
    let fixture = spawn_fixture(
        vec![("200 OK", proposal_body())],
        Some(Duration::from_millis(300)),
    );
    let api = api_for(fixture.addr);

    let mut selection = SelectionSet::new();
    selection.toggle("1");

    let requester = Arc::new(ProposalRequester::new(api));
    let first = {
        let requester = requester.clone();
        let selection = selection.clone();
        tokio::spawn(async move { requester.request(&selection).await })
    };

    // Let the first request reach the wire, then submit again.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(requester.is_in_flight());
    let second = requester.request(&selection).await;
    assert!(matches!(second, Err(PortalError::RequestInFlight)));

    let proposal = first.await.unwrap().unwrap();
    assert_eq!(proposal.saldo_devedor_total, 800.0);

    // Exactly one request hit the service.
    assert_eq!(fixture.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_selection_submit_never_touches_the_network() {
    let fixture = spawn_fixture(vec![("200 OK", proposal_body())], None);
    let api = api_for(fixture.addr);

    let err = ProposalRequester::new(api)
        .request(&SelectionSet::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::LocalValidation(_)));
    assert_eq!(fixture.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancelled_review_requires_a_fresh_proposal() {
    let fixture = spawn_fixture(
        vec![("200 OK", proposal_body()), ("200 OK", proposal_body())],
        None,
    );
    let api = api_for(fixture.addr);

    let mut selection = SelectionSet::new();
    selection.toggle("1");
    let requester = ProposalRequester::new(api);

    let mut review = ProposalReview::new();
    review.open(requester.request(&selection).await.unwrap()).unwrap();
    review.cancel();

    // The discarded proposal is gone; a new review round needs a new request.
    assert!(review.choose(12).is_err());
    review.open(requester.request(&selection).await.unwrap()).unwrap();
    review.choose(6).unwrap();
    assert!(matches!(review.state(), ReviewState::OptionChosen { .. }));

    assert_eq!(fixture.hits.load(Ordering::SeqCst), 2);
}
