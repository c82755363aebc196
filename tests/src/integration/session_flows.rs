//! # Session Flows
//!
//! Signer (01) + RPC session (02) against the mock coordinator:
//!
//! 1. **Handshake**: wallet-signed policy, session-key-signed calls after
//! 2. **Correlation**: many concurrent calls over one socket
//! 3. **Teardown**: a dropped connection fails every waiting caller once

#[cfg(test)]
mod tests {
    use crate::fixtures::{quiet_config, Harness, CHAIN_ID};
    use crate::mock_server::ServerOptions;
    use futures_util::future::join_all;
    use sc_01_signer::Signer;
    use sc_02_rpc_session::{SessionError, SessionState};
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_handshake_then_signed_calls() {
        let h = Harness::start().await.unwrap();
        h.authenticate().await.unwrap();

        assert!(h.session.is_authenticated());
        assert_eq!(h.session.session_address(), Some(h.session_key.address()));
        assert_eq!(h.session.user_tag(), Some("UX0001"));
        assert_eq!(h.server.authenticated_wallet(), Some(h.wallet.address()));

        let config = h.client().get_config().await.unwrap();
        assert_eq!(config.networks[0].chain_id, CHAIN_ID);
        assert_eq!(h.server.rejected_unsigned(), 0);
    }

    #[tokio::test]
    async fn test_second_handshake_is_a_no_op() {
        let h = Harness::start().await.unwrap();
        h.authenticate().await.unwrap();
        h.authenticate().await.unwrap();
        assert_eq!(h.server.request_count("auth_request"), 1);
        assert_eq!(h.server.request_count("auth_verify"), 1);
    }

    #[tokio::test]
    async fn test_unauthenticated_calls_rejected() {
        let h = Harness::start().await.unwrap();
        let err = h.client().get_assets(None).await.unwrap_err();
        assert!(matches!(err, SessionError::Coordinator { ref message, .. } if message == "unauthorized"));
        assert_eq!(h.server.rejected_unsigned(), 1);

        // Ping needs no signature.
        h.client().ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_calls_correlate() {
        let h = Harness::start().await.unwrap();
        h.authenticate().await.unwrap();
        let client = h.client();

        let calls = (0..32).map(|i| {
            let client = client.clone();
            async move {
                if i % 2 == 0 {
                    client.get_assets(Some(CHAIN_ID)).await.map(|a| a.len())
                } else {
                    client.get_channels(Default::default()).await.map(|c| 100 + c.len())
                }
            }
        });
        let results = join_all(calls).await;

        for (i, result) in results.into_iter().enumerate() {
            let value = result.unwrap();
            if i % 2 == 0 {
                assert_eq!(value, 2);
            } else {
                assert_eq!(value, 100);
            }
        }
        let duplicates = &h.session.stats().total_duplicates;
        assert_eq!(duplicates.load(std::sync::atomic::Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_server_events_surface() {
        let mut config = quiet_config();
        config.print_events = true;
        let h = Harness::start_with(ServerOptions::default(), config).await.unwrap();
        let mut events = h.session.events().unwrap();

        h.server.push_event("bu", json!({"balance_updates": []}));
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.method(), "bu");
        assert!(h.session.events().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_fails_waiting_callers() {
        let options = ServerOptions {
            silenced: ["get_config".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let h = Harness::start_with(options, quiet_config()).await.unwrap();
        h.authenticate().await.unwrap();
        let mut closed = h.session.closed_signal();

        let client = h.client();
        let waiting = tokio::spawn(async move { client.get_config().await });
        while h.server.request_count("get_config") == 0 {
            tokio::task::yield_now().await;
        }
        h.server.disconnect();

        let result = timeout(Duration::from_secs(5), waiting).await.unwrap().unwrap();
        assert!(matches!(
            result,
            Err(SessionError::Closed(_)) | Err(SessionError::Transport(_))
        ));
        timeout(Duration::from_secs(5), closed.wait()).await.unwrap();
        assert_eq!(h.session.state(), SessionState::Closed);

        let late = h.client().get_config().await.unwrap_err();
        assert!(late.is_fatal());
    }

    #[tokio::test]
    async fn test_keepalive_closes_silent_session() {
        let options = ServerOptions {
            silenced: ["ping".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let mut config = quiet_config();
        config.keepalive_interval = Duration::from_millis(50);
        config.keepalive_timeout = Duration::from_millis(100);
        let h = Harness::start_with(options, config).await.unwrap();

        let mut closed = h.session.closed_signal();
        timeout(Duration::from_secs(5), closed.wait()).await.unwrap();
        assert!(h.session.close_reason().is_some());
        assert!(h.server.request_count("ping") >= 1);
    }
}
