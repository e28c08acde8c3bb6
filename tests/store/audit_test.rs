//! External source audit trail.

use inciguard::canonical::canonicalize;
use inciguard::store::RelationalStore;
use inciguard::types::{FailureCode, IngredientFact, ProviderId};

#[tokio::test]
async fn provider_outcomes_accumulate_in_the_audit_log() {
    let store = RelationalStore::connect(":memory:")
        .await
        .expect("in-memory store connects");
    let name = canonicalize("glycerin").expect("canonicalizes");

    let failure = IngredientFact::failure(ProviderId::Ewg, name.clone(), FailureCode::Timeout);
    store.log_source(&failure).await.expect("logs failure");

    let mut success = IngredientFact::failure(ProviderId::Cir, name.clone(), FailureCode::Timeout);
    success.status = inciguard::types::FactStatus::Ok;
    success.raw_summary = "conclusion: safe as used".to_owned();
    store.log_source(&success).await.expect("logs success");

    assert_eq!(
        store.count_source_logs(&name).await.expect("counts"),
        2,
        "both outcomes are audited"
    );

    let other = canonicalize("tocopherol").expect("canonicalizes");
    assert_eq!(store.count_source_logs(&other).await.expect("counts"), 0);
}

#[tokio::test]
async fn store_answers_health_probe() {
    let store = RelationalStore::connect(":memory:")
        .await
        .expect("in-memory store connects");
    assert!(store.ping().await);

    store.pool().close().await;
    assert!(!store.ping().await);
}
