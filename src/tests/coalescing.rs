// Concurrency behaviour of the provider:
//  - callers racing into an empty/expired cache share one exchange
//  - a caller that stops waiting does not cancel the exchange for everybody else

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use futures::future::join_all;
    use http::StatusCode;

    use crate::error::TokenError;
    use crate::helpers::time::ManualClock;
    use crate::sources::provider::TokenProvider;
    use crate::tests::common::{
        build_reqwest_client, drive_scopes, provider_settings, spawn_issuing_endpoint, spawn_token_endpoint, test_key,
    };

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_exchange() {
        let endpoint = spawn_issuing_endpoint("abc", 3600, Duration::from_millis(200)).await;
        let provider = TokenProvider::new(test_key(&endpoint.url), build_reqwest_client(), provider_settings(60));

        let tasks = (0..16).map(|_| {
            let provider = provider.clone();
            tokio::spawn(async move { provider.get_token(&drive_scopes()).await })
        });
        let results = join_all(tasks).await;

        for result in results {
            assert_eq!(result.unwrap().unwrap().value(), "abc");
        }
        assert_eq!(endpoint.hits(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn expired_cache_is_refreshed_once_under_contention() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
        let endpoint = spawn_issuing_endpoint("abc", 3600, Duration::from_millis(150)).await;
        let provider = TokenProvider::with_clock(
            test_key(&endpoint.url),
            build_reqwest_client(),
            provider_settings(60),
            Arc::new(clock.clone()),
        );
        provider.token().await.unwrap();
        assert_eq!(endpoint.hits(), 1);

        clock.advance(ChronoDuration::seconds(3600));
        let results = join_all((0..8).map(|_| provider.token())).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(endpoint.hits(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn coalesced_failure_reaches_every_waiter() {
        let endpoint = spawn_token_endpoint(Duration::from_millis(150), |_| {
            (StatusCode::FORBIDDEN, r#"{"error":"access_denied"}"#.to_owned())
        })
        .await;
        let provider = TokenProvider::new(test_key(&endpoint.url), build_reqwest_client(), provider_settings(60));

        let results = join_all((0..6).map(|_| provider.token())).await;
        for result in results {
            assert_eq!(
                result.unwrap_err(),
                TokenError::TokenExchangeRejected { status: Some(403), reason: "access_denied".to_owned() }
            );
        }
        assert_eq!(endpoint.hits(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn abandoned_wait_does_not_cancel_exchange() {
        let endpoint = spawn_issuing_endpoint("abc", 3600, Duration::from_millis(300)).await;
        let provider = TokenProvider::new(test_key(&endpoint.url), build_reqwest_client(), provider_settings(60));
        let scopes = drive_scopes();

        let patient = tokio::spawn({
            let provider = provider.clone();
            let scopes = scopes.clone();
            async move { provider.get_token(&scopes).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let impatient = provider.get_token_with_timeout(&scopes, Duration::from_millis(20)).await;
        assert_eq!(impatient.unwrap_err(), TokenError::Timeout(20));

        assert_eq!(patient.await.unwrap().unwrap().value(), "abc");
        assert_eq!(endpoint.hits(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn exchange_completes_even_if_its_starter_gives_up() {
        let endpoint = spawn_issuing_endpoint("abc", 3600, Duration::from_millis(200)).await;
        let provider = TokenProvider::new(test_key(&endpoint.url), build_reqwest_client(), provider_settings(60));
        let scopes = drive_scopes();

        let err = provider.get_token_with_timeout(&scopes, Duration::from_millis(20)).await.unwrap_err();
        assert!(err.is_retryable());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(provider.get_token(&scopes).await.unwrap().value(), "abc");
        assert_eq!(endpoint.hits(), 1);
    }
}
