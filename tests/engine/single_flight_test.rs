//! Single-flight guarantees under concurrent resolutions.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use inciguard::types::{ProviderId, RiskLevel};

use super::support::{engine_with, test_config, Behavior, MockProvider};

#[tokio::test]
async fn concurrent_lookups_of_one_name_fan_out_once() {
    let (provider, calls) = MockProvider::with_delay(
        ProviderId::Cir,
        Behavior::Answer {
            risk: RiskLevel::Moderate,
            eco: Some(60.0),
        },
        Duration::from_millis(50),
    );
    let engine = Arc::new(engine_with(test_config(), vec![provider]).await);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.get_ingredient("Retinol").await
        }));
    }

    let mut records = Vec::new();
    for handle in handles {
        let record = handle
            .await
            .expect("task completes")
            .expect("resolution succeeds");
        records.push(record);
    }

    // Exactly one leader fanned out; everyone observed its record.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for record in &records {
        assert_eq!(record, &records[0]);
        assert_eq!(record.updated_at, records[0].updated_at);
    }

    if let Ok(engine) = Arc::try_unwrap(engine) {
        engine.shutdown().await;
    }
}

#[tokio::test]
async fn overlapping_product_analyses_share_the_resolution() {
    let (provider, calls) = MockProvider::with_delay(
        ProviderId::Cir,
        Behavior::Answer {
            risk: RiskLevel::Moderate,
            eco: Some(60.0),
        },
        Duration::from_millis(50),
    );
    let engine = Arc::new(engine_with(test_config(), vec![provider]).await);

    let first = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .resolve_ingredients(&["Retinol".to_owned()], "general", "a")
                .await
        })
    };
    let second = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .resolve_ingredients(&["Retinol".to_owned()], "general", "b")
                .await
        })
    };

    let first = first.await.expect("joins").expect("resolves");
    let second = second.await.expect("joins").expect("resolves");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        first.ingredients_details[0].updated_at,
        second.ingredients_details[0].updated_at
    );

    if let Ok(engine) = Arc::try_unwrap(engine) {
        engine.shutdown().await;
    }
}
