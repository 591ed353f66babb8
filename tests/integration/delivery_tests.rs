//! Delivery, retry and signing behavior seen from the receiving end

#[cfg(test)]
mod tests {
    use crate::common::*;
    use serde_json::{Value, json};
    use session_webhooks::core::webhooks::{EVENT_HEADER, EVENT_ID_HEADER, SIGNATURE_HEADER};
    use session_webhooks::utils::crypto::verify_payload_signature;
    use session_webhooks::{RawEvent, WebhookConfig};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WAIT: Duration = Duration::from_secs(5);

    async fn ok_server(hook_path: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(hook_path))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_delivers_payload_to_global_subscription() {
        let server = ok_server("/hook").await;
        let manager = manager_with(
            fast_delivery_config(),
            vec![subscription("g", format!("{}/hook", server.uri()), ["All"])],
        );
        manager.start().await.unwrap();

        let event = RawEvent::new("Message", json!({"foo": "bar"}));
        assert_eq!(manager.dispatch_event(&event, "abc").await.unwrap(), 1);

        let requests = wait_for_requests(&server, 1, WAIT).await;
        assert_eq!(requests.len(), 1);

        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["event"], "Message");
        assert_eq!(body["sessionID"], "abc");
        assert_eq!(body["data"], json!({"foo": "bar"}));
        assert!(body["timestamp"].as_i64().unwrap() > 0);

        assert_eq!(header(&requests[0], "content-type"), Some("application/json"));
        assert_eq!(header(&requests[0], EVENT_HEADER), Some("Message"));
        assert!(header(&requests[0], EVENT_ID_HEADER).is_some());
        assert!(header(&requests[0], SIGNATURE_HEADER).is_none());

        assert!(wait_until(WAIT, || manager.get_stats().delivered == 1).await);
        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_signature_verifies_against_body() {
        let server = ok_server("/signed").await;
        let manager = manager_with(
            fast_delivery_config(),
            vec![
                subscription("s", format!("{}/signed", server.uri()), ["Receipt"])
                    .with_secret(SECRET)
                    .with_header("X-Tenant", "acme"),
            ],
        );
        manager.start().await.unwrap();

        let event = RawEvent::new("Receipt", json!({"ids": ["m1", "m2"]}));
        manager.dispatch_event(&event, "abc").await.unwrap();

        let requests = wait_for_requests(&server, 1, WAIT).await;
        assert_eq!(requests.len(), 1);

        let signature = header(&requests[0], SIGNATURE_HEADER).unwrap();
        assert!(signature.starts_with("sha256="));
        assert!(verify_payload_signature(SECRET, &requests[0].body, signature).unwrap());
        assert!(!verify_payload_signature("other-secret", &requests[0].body, signature).unwrap());
        assert_eq!(header(&requests[0], "x-tenant"), Some("acme"));

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let manager = manager_with(
            fast_delivery_config().with_max_retries(3),
            vec![subscription("g", server.uri(), ["All"])],
        );
        manager.start().await.unwrap();

        manager
            .dispatch_event(&RawEvent::new("Connected", json!({})), "abc")
            .await
            .unwrap();

        assert!(wait_until(WAIT, || manager.get_stats().delivered == 1).await);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 4);

        let ids: Vec<_> = requests
            .iter()
            .map(|r| header(r, EVENT_ID_HEADER).unwrap().to_string())
            .collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));

        let stats = manager.get_stats();
        assert_eq!(stats.retried, 3);
        assert_eq!(stats.failed, 0);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let manager = manager_with(
            fast_delivery_config().with_max_retries(2),
            vec![subscription("g", server.uri(), ["All"])],
        );
        manager.start().await.unwrap();

        manager
            .dispatch_event(&RawEvent::new("Disconnected", json!({})), "abc")
            .await
            .unwrap();

        assert!(wait_until(WAIT, || manager.get_stats().failed == 1).await);
        // Give a stray retry the chance to show up
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(server.received_requests().await.unwrap().len(), 3);
        let stats = manager.get_stats();
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.delivered, 0);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_request_timeouts_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let config = fast_delivery_config()
            .with_max_retries(1)
            .with_request_timeout(Duration::from_millis(100));
        let manager = manager_with(config, vec![subscription("g", server.uri(), ["All"])]);
        manager.start().await.unwrap();

        manager
            .dispatch_event(&RawEvent::new("Message", json!({})), "abc")
            .await
            .unwrap();

        assert!(wait_until(WAIT, || manager.get_stats().failed == 1).await);
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stats = manager.get_stats();
        assert_eq!(stats.retried, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.delivered, 0);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad payload"))
            .mount(&server)
            .await;

        let manager = manager_with(
            fast_delivery_config().with_max_retries(3),
            vec![subscription("g", server.uri(), ["All"])],
        );
        manager.start().await.unwrap();

        manager
            .dispatch_event(&RawEvent::new("Message", json!({})), "abc")
            .await
            .unwrap();

        assert!(wait_until(WAIT, || manager.get_stats().failed == 1).await);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert_eq!(manager.get_stats().retried, 0);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_throttled_responses_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let manager = manager_with(
            fast_delivery_config(),
            vec![subscription("g", server.uri(), ["All"])],
        );
        manager.start().await.unwrap();

        manager
            .dispatch_event(&RawEvent::new("Presence", json!({"from": "x"})), "abc")
            .await
            .unwrap();

        assert!(wait_until(WAIT, || manager.get_stats().delivered == 1).await);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_session_scoping_and_disabled_subscriptions() {
        let server = MockServer::start().await;
        for hook in ["/global", "/abc", "/xyz", "/disabled"] {
            Mock::given(method("POST"))
                .and(path(hook))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;
        }

        let uri = server.uri();
        let manager = manager_with(
            fast_delivery_config(),
            vec![
                subscription("global", format!("{}/global", uri), ["Message"]),
                subscription("abc", format!("{}/abc", uri), ["All"]).with_session("abc"),
                subscription("xyz", format!("{}/xyz", uri), ["All"]).with_session("xyz"),
                WebhookConfig::new("disabled", format!("{}/disabled", uri))
                    .with_events(["All"])
                    .with_enabled(false),
            ],
        );
        manager.start().await.unwrap();

        let queued = manager
            .dispatch_event(&RawEvent::new("Message", json!({"text": "hi"})), "abc")
            .await
            .unwrap();
        assert_eq!(queued, 2);

        assert!(wait_until(WAIT, || manager.get_stats().delivered == 2).await);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(requests_to(&server, "/global").await.len(), 1);
        assert_eq!(requests_to(&server, "/abc").await.len(), 1);
        assert!(requests_to(&server, "/xyz").await.is_empty());
        assert!(requests_to(&server, "/disabled").await.is_empty());

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_event_types_are_never_delivered() {
        let server = ok_server("/hook").await;
        let manager = manager_with(
            fast_delivery_config(),
            vec![subscription("g", format!("{}/hook", server.uri()), ["All"])],
        );
        manager.start().await.unwrap();

        for tag in ["BrandNewEvent", "All", "message"] {
            let queued = manager
                .dispatch_event(&RawEvent::new(tag, json!({})), "abc")
                .await
                .unwrap();
            assert_eq!(queued, 0);
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(server.received_requests().await.unwrap().is_empty());

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest_jobs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;

        let config = fast_delivery_config()
            .with_workers(1)
            .with_queue_size(1)
            .with_enqueue_timeout(Duration::ZERO);
        let manager = manager_with(config, vec![subscription("g", server.uri(), ["All"])]);
        manager.start().await.unwrap();

        let mut accepted = 0;
        for _ in 0..5 {
            accepted += manager
                .dispatch_event(&RawEvent::new("Message", json!({})), "abc")
                .await
                .unwrap();
        }

        let stats = manager.get_stats();
        assert!(accepted <= 2, "accepted {} jobs", accepted);
        assert_eq!(stats.dropped as usize, 5 - accepted);

        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_waits_for_free_slot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let config = fast_delivery_config()
            .with_workers(1)
            .with_queue_size(1)
            .with_enqueue_timeout(Duration::from_millis(50));
        let manager = manager_with(config, vec![subscription("g", server.uri(), ["All"])]);
        manager.start().await.unwrap();

        // The second submission waits long enough for the worker to take the
        // first job; later ones time out behind the busy worker.
        let mut accepted = 0;
        for _ in 0..4 {
            accepted += manager
                .dispatch_event(&RawEvent::new("Message", json!({})), "abc")
                .await
                .unwrap();
        }

        assert_eq!(accepted, 2);
        assert_eq!(manager.get_stats().dropped, 2);

        assert!(wait_until(WAIT, || manager.get_stats().delivered == 2).await);
        manager.stop().await.unwrap();
    }
}
