//! Client against a real ecole-srv on a loopback port

use ecole_common::db::init_memory_database;
use ecole_common::models::AffectationPayload;
use ecole_common::PaymentStatus;
use ecole_rc::{HttpBackend, ReconcileError, Reconciler};
use ecole_srv::{build_router, AppState};
use serde_json::{json, Value};
use std::time::Duration;

/// Start a server and return its base URL
async fn spawn_server(ensure_endpoints: bool) -> String {
    let db = init_memory_database().await.expect("in-memory database");
    let app = build_router(AppState::new(db, ensure_endpoints));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn post(base: &str, path: &str, body: Value) -> Value {
    let response = reqwest::Client::new()
        .post(format!("{}{}", base, path))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success(), "POST {} failed", path);
    response.json().await.unwrap()
}

/// Year, class with a 500 000 schedule and one student; returns the payload
async fn seed(base: &str) -> AffectationPayload {
    let annee = post(base, "/annees/", json!({"debut": 2024, "fin": 2025})).await;
    let classe = post(
        base,
        "/classes/",
        json!({"code_classe": "6A", "lib_classe": "Sixième A", "niveau_classe": "clg"}),
    )
    .await;
    post(
        base,
        "/frais/",
        json!({
            "annee_fs": annee["id"],
            "classe_fs": classe["id"],
            "frais_annuel": 500000,
            "t1_fs": 200000,
            "t2_fs": 150000,
            "t3_fs": 150000,
        }),
    )
    .await;
    let eleve = post(
        base,
        "/eleves/",
        json!({
            "nom": "Diallo",
            "prenom1": "Ousmane",
            "sexe": "M",
            "jour_naissance": 4,
            "mois_naissance": 9,
            "annee_naissance": 2011,
        }),
    )
    .await;

    // Text ids, as a form would submit them
    AffectationPayload {
        eleve_aff: Some(json!(eleve["id"].to_string())),
        classe_aff: Some(classe["id"].clone()),
        annee_aff: Some(annee["id"].clone()),
        etat_aff: None,
    }
}

fn reconciler(base: &str) -> Reconciler<HttpBackend> {
    Reconciler::new(HttpBackend::new(base, Duration::from_secs(5)).unwrap())
}

async fn count(base: &str, path: &str) -> usize {
    let body: Value = reqwest::get(format!("{}{}", base, path))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body.as_array().map(Vec::len).unwrap_or(0)
}

#[tokio::test]
async fn test_assign_twice_with_ensure_endpoints() {
    let base = spawn_server(true).await;
    let payload = seed(&base).await;
    let client = reconciler(&base);

    let first = client.assign(&payload).await.unwrap();
    let second = client.assign(&payload).await.unwrap();

    assert_eq!(first.affectation.id, second.affectation.id);
    assert_eq!(first.recouvrement.id, second.recouvrement.id);
    assert_eq!(first.recouvrement.frais_paiement, Some(500000));
    assert_eq!(first.ledger.summary().status, PaymentStatus::NoPayment);
    assert_eq!(count(&base, "/affectations/").await, 1);
    assert_eq!(count(&base, "/recouvrements/").await, 1);
}

#[tokio::test]
async fn test_fallback_without_ensure_endpoints() {
    let base = spawn_server(false).await;
    let payload = seed(&base).await;
    let client = reconciler(&base);

    let first = client.assign(&payload).await.unwrap();
    let second = client.assign(&payload).await.unwrap();

    assert_eq!(first.affectation.id, second.affectation.id);
    assert_eq!(first.recouvrement.id, second.recouvrement.id);
    assert_eq!(count(&base, "/affectations/").await, 1);
    assert_eq!(count(&base, "/recouvrements/").await, 1);
}

#[tokio::test]
async fn test_second_class_same_year_is_refused() {
    for (ensure_endpoints, reason) in [
        (true, "The student already has an affectation for this year."),
        (false, "The fields eleve_aff, annee_aff must make a unique set."),
    ] {
        let base = spawn_server(ensure_endpoints).await;
        let payload = seed(&base).await;
        let client = reconciler(&base);
        client.ensure_affectation(&payload).await.unwrap();

        let other = post(
            &base,
            "/classes/",
            json!({"code_classe": "6B", "lib_classe": "Sixième B", "niveau_classe": "clg"}),
        )
        .await;
        let moved = AffectationPayload {
            classe_aff: Some(other["id"].clone()),
            ..payload.clone()
        };

        match client.ensure_affectation(&moved).await.unwrap_err() {
            ReconcileError::NotFoundAfterCollision { reason: got, .. } => assert_eq!(got, reason),
            other => panic!("expected a collision without match, got {:?}", other),
        }
        assert_eq!(count(&base, "/affectations/").await, 1);
    }
}

#[tokio::test]
async fn test_concurrent_assign_creates_one_of_each() {
    let base = spawn_server(false).await;
    let payload = seed(&base).await;
    let client = reconciler(&base);

    let (first, second) = tokio::join!(client.assign(&payload), client.assign(&payload));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.affectation.id, second.affectation.id);
    assert_eq!(first.recouvrement.id, second.recouvrement.id);
    assert_eq!(count(&base, "/affectations/").await, 1);
    assert_eq!(count(&base, "/recouvrements/").await, 1);
}

#[tokio::test]
async fn test_payments_and_ledger_edits_round_trip() {
    let base = spawn_server(true).await;
    let payload = seed(&base).await;
    let client = reconciler(&base);
    let assignment = client.assign(&payload).await.unwrap();
    let rec_id = assignment.recouvrement.id;

    let rec = client
        .record_payment(rec_id, 1, 200_000, None)
        .await
        .unwrap();
    assert_eq!(rec.total_paye(), 200_000);

    let mut form = client.open_ledger(rec_id).await.unwrap();
    assert!(form.set_field("v2", "150000"));
    assert!(form.set_field("d2", "2024-11-04"));
    assert_eq!(form.summary().balance, 150_000);

    let saved = client.save_ledger(&form).await.unwrap();
    assert_eq!(saved.summary().total_paid, 350_000);
    assert_eq!(saved.field("d2"), Some("2024-11-04"));

    let mut bad = saved.clone();
    bad.set_field("v3", "beaucoup");
    assert!(matches!(
        client.save_ledger(&bad).await.unwrap_err(),
        ReconcileError::Validation(_)
    ));
}

#[tokio::test]
async fn test_unknown_references_are_not_collisions() {
    let base = spawn_server(false).await;
    let client = reconciler(&base);
    let payload = AffectationPayload::from_text(Some("7"), Some("3"), Some("1"), None);

    let err = client.ensure_affectation(&payload).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::UnrecognizedCreateError { status: 400, .. }
    ));
    assert!(matches!(
        client.open_ledger(99).await.unwrap_err(),
        ReconcileError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_login_against_server() {
    let base = spawn_server(true).await;
    post(
        &base,
        "/utilisateurs/",
        json!({
            "username": "secretariat",
            "password": "s3cret",
            "prenom": "Mariama",
            "nom": "Bah",
            "contact": "620000000",
        }),
    )
    .await;
    let client = reconciler(&base);

    let user = client.login("secretariat", "s3cret").await.unwrap();
    assert_eq!(user.fullname, "Mariama Bah");
    assert!(user.derniereconnection.is_some());

    assert!(matches!(
        client.login("secretariat", "nope").await.unwrap_err(),
        ReconcileError::Authentication(_)
    ));
}
