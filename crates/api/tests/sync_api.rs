//! HTTP trigger and run listing.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, send, TRIGGER_TOKEN};
use medwatch_db::repositories::SyncRunRepo;
use sqlx::PgPool;

const CATALOG: &str = "CIS_bdpm.txt";
const COMPOSITION: &str = "CIS_COMPO_bdpm.txt";
const SHORTAGE: &str = "CIS_CIP_Dispo_Spec.txt";

fn registry_with_shortage() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    common::write_registry_file(
        dir.path(),
        CATALOG,
        &[
            "CIS001\tDOLIPRANE 1000mg\tcomprimé\torale\t\t\t\t\t\t\tSANOFI",
            "CIS002\tAMOXICILLINE 500mg\tgélule\torale\t\t\t\t\t\t\tBIOGARAN",
        ],
    );
    common::write_registry_file(
        dir.path(),
        COMPOSITION,
        &["CIS001\tcomprimé\t1\tPARACETAMOL\t1000 mg\tun\tSA"],
    );
    common::write_registry_file(
        dir.path(),
        SHORTAGE,
        &["CIS002\t3400930000002\t1\ttension d'approvisionnement\t2024-01-01"],
    );
    dir
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn run_without_token_is_unauthorized(pool: PgPool) {
    let registry = registry_with_shortage();
    let app = common::build_test_app(pool.clone(), registry.path());

    let response = send(app, Method::POST, "/api/v1/sync/run", None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert!(SyncRunRepo::find_in_progress(&pool).await.unwrap().is_none());
    assert!(SyncRunRepo::list_in_range(&pool, None, None, 10, 0)
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn run_with_wrong_token_is_unauthorized(pool: PgPool) {
    let registry = registry_with_shortage();
    let app = common::build_test_app(pool, registry.path());

    let response = send(app, Method::POST, "/api/v1/sync/run", Some("guess")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unset_trigger_token_refuses_everyone(pool: PgPool) {
    let registry = registry_with_shortage();
    let config = medwatch_api::config::ServerConfig {
        sync_trigger_token: None,
        ..common::test_config()
    };
    let app = common::build_test_app_with(pool, registry.path(), config);

    let response = send(app, Method::POST, "/api/v1/sync/run", Some(TRIGGER_TOKEN)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn run_returns_summary(pool: PgPool) {
    let registry = registry_with_shortage();
    let app = common::build_test_app(pool.clone(), registry.path());

    let response = send(app, Method::POST, "/api/v1/sync/run", Some(TRIGGER_TOKEN)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["products_created"], 2);
    assert_eq!(data["tension_entries"], 1);
    assert_eq!(data["shortage_entries"], 0);
    assert_eq!(data["moved_to_tension"], 1);

    let run_id = data["sync_run_id"].as_i64().unwrap();
    let run = SyncRunRepo::find_by_id(&pool, run_id).await.unwrap().unwrap();
    assert!(run.success);
    assert!(run.completed_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn run_while_another_is_open_conflicts(pool: PgPool) {
    let registry = registry_with_shortage();
    let open = SyncRunRepo::try_start(&pool).await.unwrap().unwrap();
    let app = common::build_test_app(pool.clone(), registry.path());

    let response = send(app, Method::POST, "/api/v1/sync/run", Some(TRIGGER_TOKEN)).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "SYNC_IN_PROGRESS");
    let still_open = SyncRunRepo::find_in_progress(&pool).await.unwrap().unwrap();
    assert_eq!(still_open.id, open.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn runs_are_listed_newest_first(pool: PgPool) {
    let registry = registry_with_shortage();

    for _ in 0..2 {
        let app = common::build_test_app(pool.clone(), registry.path());
        let response =
            send(app, Method::POST, "/api/v1/sync/run", Some(TRIGGER_TOKEN)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let app = common::build_test_app(pool, registry.path());
    let response = send(app, Method::GET, "/api/v1/sync/runs", Some(TRIGGER_TOKEN)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let runs = json["data"].as_array().unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs[0]["id"].as_i64().unwrap() > runs[1]["id"].as_i64().unwrap());
    assert_eq!(runs[1]["products_created"], 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn inverted_range_is_rejected(pool: PgPool) {
    let registry = tempfile::tempdir().unwrap();
    let app = common::build_test_app(pool, registry.path());

    let response = send(
        app,
        Method::GET,
        "/api/v1/sync/runs?from=2024-02-01T00:00:00Z&to=2024-01-01T00:00:00Z",
        Some(TRIGGER_TOKEN),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}
