//! Request workflow tests with a scripted issuer and an in-memory database.

mod common;

use std::{sync::Arc, time::Duration};

use common::{ConnectBehavior, FakeConnector, files_in, fixture_issuer, issuer, workflow};
use recipe_service::{RecipeError, material::MaterialError};
use secrecy::SecretString;
use test_utils::{
    fixtures::{MISSING_RECIPE_ID, PkiFixture},
    mocks::{MockIssuer, MockOutcome},
};

#[tokio::test]
async fn test_found_recipe_returns_stored_fields() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::with_samples();
    let flow = workflow(Arc::new(fixture_issuer()), Arc::new(connector.clone()), dir.path());

    let recipe = flow.handle_request(1).await.unwrap().unwrap();
    assert_eq!(recipe.name, "Elixir of Invisibility");
    assert_eq!(recipe.ingredients, "Moon dust, shadow essence");
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_missing_recipe_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::with_samples();
    let flow = workflow(Arc::new(fixture_issuer()), Arc::new(connector.clone()), dir.path());

    assert!(flow.handle_request(MISSING_RECIPE_ID).await.unwrap().is_none());
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_material_present_during_session_and_gone_after() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::with_samples();
    let flow = workflow(Arc::new(fixture_issuer()), Arc::new(connector.clone()), dir.path());

    flow.handle_request(2).await.unwrap();

    let observed = connector.observed();
    assert_eq!(observed.len(), 1);
    assert!(observed[0].present_at_connect);
    assert_eq!(observed[0].present_at_close, Some(true));
    assert!(observed[0].paths.iter().all(|p| p.is_absolute() && !p.exists()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_key_file_owner_only_while_connected() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::with_samples();
    let flow = workflow(Arc::new(fixture_issuer()), Arc::new(connector.clone()), dir.path());

    flow.handle_request(1).await.unwrap();

    let mode = connector.observed()[0].key_mode.unwrap();
    assert_eq!(mode & 0o077, 0, "key mode {mode:o}");
}

#[tokio::test]
async fn test_non_positive_id_rejected_before_issuance() {
    let dir = tempfile::tempdir().unwrap();
    let issuer = Arc::new(fixture_issuer());
    let flow = workflow(issuer.clone(), Arc::new(FakeConnector::with_samples()), dir.path());

    for id in [0, -1, i32::MIN] {
        assert!(matches!(flow.handle_request(id).await, Err(RecipeError::InvalidId)));
    }
    assert_eq!(issuer.call_count(), 0);
}

#[tokio::test]
async fn test_issuer_outage_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::with_samples();
    let flow = workflow(
        Arc::new(issuer(MockOutcome::Unavailable)),
        Arc::new(connector.clone()),
        dir.path(),
    );

    let err = flow.handle_request(1).await.unwrap_err();
    assert!(matches!(err, RecipeError::Connectivity(_)));
    assert!(connector.observed().is_empty());
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_policy_denial_is_authorization_error() {
    let dir = tempfile::tempdir().unwrap();
    let flow = workflow(
        Arc::new(issuer(MockOutcome::Denied)),
        Arc::new(FakeConnector::with_samples()),
        dir.path(),
    );

    let err = flow.handle_request(1).await.unwrap_err();
    assert!(matches!(err, RecipeError::Authorization(_)));
}

#[tokio::test]
async fn test_hanging_issuer_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let flow = workflow(
        Arc::new(issuer(MockOutcome::Hang(Duration::from_secs(30)))),
        Arc::new(FakeConnector::with_samples()),
        dir.path(),
    )
    .with_issue_timeout(Duration::from_millis(100));

    let err = flow.handle_request(1).await.unwrap_err();
    assert!(matches!(err, RecipeError::Timeout { duration } if duration == Duration::from_millis(100)));
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_empty_key_fails_materialization() {
    let dir = tempfile::tempdir().unwrap();
    let mut credential = PkiFixture::generate("app_user").unwrap().issued_credential();
    credential.private_key = SecretString::from(String::new());
    let connector = FakeConnector::with_samples();
    let flow = workflow(
        Arc::new(MockIssuer::issuing(credential)),
        Arc::new(connector.clone()),
        dir.path(),
    );

    let err = flow.handle_request(1).await.unwrap_err();
    assert!(matches!(err, RecipeError::Materialization(MaterialError::EmptyField(_))));
    assert!(connector.observed().is_empty());
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_rejected_connection_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::with_samples().behaving(ConnectBehavior::Reject);
    let flow = workflow(Arc::new(fixture_issuer()), Arc::new(connector.clone()), dir.path());

    let err = flow.handle_request(1).await.unwrap_err();
    assert!(matches!(err, RecipeError::DatabaseConnect { .. }));
    assert_eq!(connector.observed().len(), 1);
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_duplicate_rows_are_integrity_error() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::with_samples().with_duplicate(3);
    let flow = workflow(Arc::new(fixture_issuer()), Arc::new(connector.clone()), dir.path());

    let err = flow.handle_request(3).await.unwrap_err();
    assert!(matches!(err, RecipeError::Integrity { rows: 2 }));
    assert_eq!(connector.observed()[0].present_at_close, Some(true));
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_abandoned_request_removes_material() {
    let dir = tempfile::tempdir().unwrap();
    let connector = FakeConnector::with_samples().behaving(ConnectBehavior::Hang);
    let flow = workflow(Arc::new(fixture_issuer()), Arc::new(connector.clone()), dir.path());

    let result = tokio::time::timeout(Duration::from_millis(200), flow.handle_request(1)).await;
    assert!(result.is_err(), "request should still be pending");
    assert!(connector.observed()[0].present_at_connect);
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let issuer = Arc::new(fixture_issuer());
    let connector = FakeConnector::with_samples();
    let flow = Arc::new(workflow(issuer.clone(), Arc::new(connector.clone()), dir.path()));

    let mut handles = Vec::new();
    for i in 0..12 {
        let flow = Arc::clone(&flow);
        let id = [1, 2, 3, MISSING_RECIPE_ID][i % 4];
        handles.push(tokio::spawn(async move { flow.handle_request(id).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(issuer.call_count(), 12);
    let observed = connector.observed();
    let mut keys: Vec<_> = observed.iter().map(|o| o.paths[2].clone()).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 12);
    assert_eq!(files_in(dir.path()), 0);
}
