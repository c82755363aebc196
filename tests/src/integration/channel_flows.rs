//! # Channel Flows
//!
//! Orchestrator (03) driving the live session (02) and the in-memory
//! custody contract:
//!
//! 1. **Lifecycle**: create → resize → close, each confirmed on chain
//! 2. **Guard**: rejected resizes never reach the coordinator
//! 3. **Atomicity**: a failed on-chain step leaves no bookkeeping behind

#[cfg(test)]
mod tests {
    use crate::fixtures::{usdc, usdc_units, Harness};
    use sc_01_signer::Signer;
    use sc_03_channel_lifecycle::adapters::{CertificateFault, Submission};
    use sc_03_channel_lifecycle::{
        decode_resize_deltas, ChannelError, ChannelLifecycleApi, TransferDestination,
    };
    use shared_types::{ChannelStatus, SignedAmount, StateIntent, U256};

    #[tokio::test]
    async fn test_create_resize_close() {
        let h = Harness::start().await.unwrap();
        h.authenticate().await.unwrap();
        let orchestrator = h.orchestrator();

        let created = orchestrator.create_channel("usdc").await.unwrap();
        let channel_id = created.certificate.channel_id;
        let channel = created.channel.unwrap();
        assert!(channel.participants.contains(&h.session_key.address()));
        assert_eq!(channel.challenge, orchestrator.config().challenge_period);
        assert!(h.ledger.is_open(&channel_id));

        let assets = orchestrator.assets().await.unwrap();
        let enabled = assets.iter().find(|a| a.symbol == "usdc").unwrap();
        assert_eq!(enabled.channel_id, Some(channel_id));
        assert!(!assets.iter().find(|a| a.symbol == "weth").unwrap().enabled());

        // Fund from custody, then the documented resize.
        orchestrator.resize_channel("usdc", "10", "0").await.unwrap();
        let (plan, resized) = orchestrator.resize_channel("usdc", "-10", "5").await.unwrap();
        assert_eq!(plan.resize, SignedAmount::negative(U256::from(10_000_000u64)));
        assert_eq!(plan.allocate, SignedAmount::positive(U256::from(5_000_000u64)));
        assert_eq!(resized.certificate.version, 2);
        assert_eq!(
            decode_resize_deltas(&resized.certificate.state_data),
            Some((plan.resize, plan.allocate))
        );

        let snapshot = orchestrator.balances("usdc").await.unwrap();
        assert_eq!(snapshot.channel, usdc_units(5));
        assert_eq!(snapshot.display(snapshot.channel), "5");
        // 10 went back to custody and 5 left the unified ledger.
        assert_eq!(snapshot.custody, usdc_units(100));
        assert_eq!(snapshot.unified, usdc_units(45));

        let closed = orchestrator.close_channel("usdc").await.unwrap();
        assert_eq!(closed.certificate.intent, StateIntent::Finalize);
        assert_eq!(closed.certificate.allocations[0].destination, h.wallet.address());
        assert!(!h.ledger.is_open(&channel_id));

        let usage = h.store.channel_usage(&channel_id).unwrap();
        assert_eq!(usage.status, ChannelStatus::Closed);
        assert_eq!(usage.version, 3);
        assert!(h.store.endpoint_last_used("ws://coordinator.mock/ws").is_some());
        assert_eq!(h.server.rejected_unsigned(), 0);
    }

    #[tokio::test]
    async fn test_negative_channel_balance_rejected_locally() {
        let h = Harness::start().await.unwrap();
        h.authenticate().await.unwrap();
        let orchestrator = h.orchestrator();
        orchestrator.create_channel("usdc").await.unwrap();
        orchestrator.resize_channel("usdc", "10", "0").await.unwrap();
        let sent = h.server.request_count("resize_channel");

        let err = orchestrator
            .resize_channel("usdc", "-20", "5")
            .await
            .unwrap_err();
        match err {
            ChannelError::Validation(msg) => assert!(msg.contains("-5"), "{}", msg),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = orchestrator
            .resize_channel("usdc", "0", "50.000001")
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Validation(_)));
        assert_eq!(h.server.request_count("resize_channel"), sent);
    }

    #[tokio::test]
    async fn test_failed_open_is_atomic() {
        let h = Harness::start().await.unwrap();
        h.authenticate().await.unwrap();
        let orchestrator = h.orchestrator();

        h.ledger.fail_confirmations(true);
        let err = orchestrator.create_channel("usdc").await.unwrap_err();
        assert!(matches!(err, ChannelError::OnChain { .. }));
        assert_eq!(h.store.channel_count(), 0);
        assert!(h.store.endpoint_last_used("ws://coordinator.mock/ws").is_none());
    }

    #[tokio::test]
    async fn test_tampered_certificate_not_submitted() {
        let h = Harness::start().await.unwrap();
        h.authenticate().await.unwrap();
        let orchestrator = h.orchestrator();
        let created = orchestrator.create_channel("usdc").await.unwrap();
        let before = h.ledger.submissions().len();

        h.server.coordinator().inject_fault(CertificateFault::WrongTotal);
        let err = orchestrator.resize_channel("usdc", "1", "0").await.unwrap_err();
        assert!(matches!(err, ChannelError::Protocol { operation: "resize", .. }));
        assert_eq!(h.ledger.submissions().len(), before);
        assert!(!h
            .ledger
            .submissions()
            .iter()
            .any(|s| matches!(s, Submission::Resize { .. })));

        let record = orchestrator
            .book()
            .get(&created.certificate.channel_id)
            .unwrap();
        assert_eq!(record.status, ChannelStatus::Open);
        assert_eq!(record.version, Some(0));
    }

    #[tokio::test]
    async fn test_transfer_by_user_tag() {
        let h = Harness::start().await.unwrap();
        h.authenticate().await.unwrap();
        let orchestrator = h.orchestrator();

        let result = orchestrator
            .transfer(
                TransferDestination::UserTag("UX9999".to_string()),
                &[("usdc".to_string(), "7.25".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(result.transactions.len(), 1);
        assert_eq!(result.transactions[0].to_account, "UX9999");
        assert_eq!(result.transactions[0].amount, "7.25");

        let err = orchestrator
            .transfer(
                TransferDestination::Address(h.wallet.address()),
                &[("usdc".to_string(), "50.5".to_string())],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Validation(_)));
        assert_eq!(h.server.request_count("transfer"), 1);
    }

    #[tokio::test]
    async fn test_balances_without_channel() {
        let h = Harness::start().await.unwrap();
        h.authenticate().await.unwrap();
        let snapshot = h.orchestrator().balances("USDC").await.unwrap();
        assert_eq!(snapshot.custody, usdc_units(100));
        assert_eq!(snapshot.channel, U256::zero());
        assert_eq!(snapshot.unified, usdc_units(50));
        assert_eq!(snapshot.decimals, usdc().decimals);
    }
}
