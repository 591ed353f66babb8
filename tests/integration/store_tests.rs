//! Pluggable subscription stores

#[cfg(test)]
mod tests {
    use crate::common::*;
    use async_trait::async_trait;
    use mockall::mock;
    use serde_json::{Map, json};
    use session_webhooks::{
        InMemoryConfigStore, RawEvent, Result, WebhookConfig, WebhookConfigStore, WebhookError,
        WebhookManager,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    mock! {
        pub Store {}

        #[async_trait]
        impl WebhookConfigStore for Store {
            async fn get_by_session_and_global(&self, session_id: &str) -> Result<Vec<WebhookConfig>>;
            async fn get_by_id(&self, id: &str) -> Result<Option<WebhookConfig>>;
        }
    }

    #[tokio::test]
    async fn test_dispatch_queries_store_for_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let uri = server.uri();
        let mut store = MockStore::new();
        store
            .expect_get_by_session_and_global()
            .withf(|session_id| session_id == "abc")
            .times(1)
            .returning(move |_| Ok(vec![subscription("g", uri.clone(), ["CallOffer"])]));

        let manager = WebhookManager::new(fast_delivery_config(), Arc::new(store)).unwrap();
        manager.start().await.unwrap();

        let queued = manager
            .dispatch_event(&RawEvent::new("CallOffer", json!({"from": "x"})), "abc")
            .await
            .unwrap();
        assert_eq!(queued, 1);
        assert!(wait_until(Duration::from_secs(5), || manager.get_stats().delivered == 1).await);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_store_failure_does_not_fail_dispatch() {
        let mut store = MockStore::new();
        store
            .expect_get_by_session_and_global()
            .returning(|_| Err(WebhookError::store("connection reset")));

        let manager = WebhookManager::new(fast_delivery_config(), Arc::new(store)).unwrap();
        manager.start().await.unwrap();

        let queued = manager
            .dispatch_event(&RawEvent::new("Message", json!({})), "abc")
            .await
            .unwrap();
        assert_eq!(queued, 0);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_test_webhook_propagates_store_errors() {
        let mut store = MockStore::new();
        store
            .expect_get_by_id()
            .withf(|id| id == "w1")
            .returning(|_| Err(WebhookError::store("connection reset")));

        let manager = WebhookManager::new(fast_delivery_config(), Arc::new(store)).unwrap();
        manager.start().await.unwrap();

        let err = manager
            .test_webhook("w1", "Message", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Store(_)));

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_store_updates_apply_to_next_dispatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = Arc::new(InMemoryConfigStore::new());
        let manager = WebhookManager::new(fast_delivery_config(), store.clone()).unwrap();
        manager.start().await.unwrap();

        let event = RawEvent::new("Message", json!({}));
        assert_eq!(manager.dispatch_event(&event, "abc").await.unwrap(), 0);

        store
            .upsert(subscription("g", server.uri(), ["Message"]))
            .unwrap();
        assert_eq!(manager.dispatch_event(&event, "abc").await.unwrap(), 1);

        store
            .upsert(subscription("g", server.uri(), ["Message"]).with_enabled(false))
            .unwrap();
        assert_eq!(manager.dispatch_event(&event, "abc").await.unwrap(), 0);

        store.remove("g");
        assert!(store.is_empty());

        manager.stop().await.unwrap();
    }
}
