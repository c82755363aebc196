//! # Auth Handshake
//!
//! Two rounds over an open, unauthenticated session:
//!
//! 1. `auth_request` (unsigned) → `auth_challenge { challenge_message }`
//! 2. wallet signs the EIP-712 policy → `auth_verify` with that signature
//!
//! On success the session key becomes the session's authenticator and every
//! later call is signed with it.

use super::session::Session;
use crate::domain::config::AuthConfig;
use crate::domain::error::SessionError;
use crate::domain::methods::{AuthRequestParams, AuthVerifyParams, RpcRequest, RpcResponse};
use sc_01_signer::{AuthPolicy, Eip712Domain, Signer};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

impl Session {
    /// Run the handshake once. A second call on an authenticated session
    /// returns `Ok(())` without touching the network.
    pub async fn authenticate(
        &self,
        wallet: &dyn Signer,
        session_key: Arc<dyn Signer>,
        auth: &AuthConfig,
    ) -> Result<(), SessionError> {
        let _serialized = self.auth_lock.lock().await;
        if self.is_authenticated() {
            return Ok(());
        }
        auth.validate()?;

        let expire = unix_secs().saturating_add(auth.session_ttl.as_secs());
        let params = AuthRequestParams {
            address: wallet.address(),
            session_key: session_key.address(),
            app_name: auth.app_name.clone(),
            application: auth.application,
            scope: auth.scope.clone(),
            expire,
            allowances: auth.allowances.clone(),
        };

        let challenge = match self
            .request(RpcRequest::AuthRequest(params))
            .await
            .map_err(rejected)?
        {
            RpcResponse::AuthChallenge(c) => c.challenge_message,
            other => {
                return Err(SessionError::protocol(
                    "auth_request",
                    format!("unexpected '{}' reply", other.method()),
                ))
            }
        };

        let policy = AuthPolicy {
            challenge: challenge.clone(),
            scope: auth.scope.clone(),
            wallet: wallet.address(),
            application: auth.application,
            participant: session_key.address(),
            expire,
            allowances: auth.allowances.clone(),
        };
        let domain = Eip712Domain {
            name: auth.app_name.clone(),
        };
        let signature = wallet.sign_hash(&policy.signing_hash(&domain))?;

        let verified = self
            .request_with(
                RpcRequest::AuthVerify(AuthVerifyParams { challenge }),
                vec![signature],
            )
            .await
            .map_err(rejected)?;
        match verified {
            RpcResponse::AuthVerify(result) if result.success == Some(true) => {}
            RpcResponse::AuthVerify(_) => {
                return Err(SessionError::AuthenticationFailed(
                    "coordinator did not confirm the challenge".into(),
                ))
            }
            other => {
                return Err(SessionError::protocol(
                    "auth_verify",
                    format!("unexpected '{}' reply", other.method()),
                ))
            }
        }

        let session_address = session_key.address();
        if !self.attach_signer(session_key) {
            return Err(SessionError::AuthenticationFailed(
                "a session key is already attached".into(),
            ));
        }
        info!(
            wallet = ?wallet.address(),
            session_key = ?session_address,
            "[sc-02] Authenticated"
        );

        match self.request(RpcRequest::GetUserTag).await {
            Ok(RpcResponse::UserTag(tag)) => {
                let _ = self.user_tag.set(tag.tag);
            }
            Ok(other) => warn!(method = %other.method(), "[sc-02] Unexpected user tag reply"),
            Err(e) => warn!(error = %e, "[sc-02] Could not fetch user tag"),
        }
        Ok(())
    }
}

fn rejected(e: SessionError) -> SessionError {
    match e {
        SessionError::Coordinator { message, .. } => SessionError::AuthenticationFailed(message),
        other => other,
    }
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::envelope::RpcMessage;
    use crate::transport::session::tests::{next_request, pair, quiet_config, reply, ServerWs};
    use sc_01_signer::{recover_address, LocalSigner};
    use serde_json::{json, Value};
    use shared_types::Address;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            app_name: "demo".into(),
            application: Address::repeat_byte(0xaa),
            ..AuthConfig::default()
        }
    }

    async fn answer(server: &mut ServerWs, req: &RpcMessage, method: &str, params: Value) {
        reply(server, req.request_id(), method, params).await;
    }

    #[tokio::test]
    async fn test_handshake_signs_policy_with_wallet() {
        let (session, mut server) = pair(quiet_config()).await;
        let wallet = LocalSigner::random();
        let key = Arc::new(LocalSigner::random());
        let wallet_addr = wallet.address();
        let key_addr = key.address();

        let peer = tokio::spawn(async move {
            let req = next_request(&mut server).await;
            assert_eq!(req.method(), "auth_request");
            assert!(req.signatures.is_empty());
            let expire = req.envelope.params["expire"].as_u64().unwrap();
            answer(
                &mut server,
                &req,
                "auth_challenge",
                json!({"challenge_message": "tok-1"}),
            )
            .await;

            let verify = next_request(&mut server).await;
            assert_eq!(verify.method(), "auth_verify");
            assert_eq!(verify.envelope.params["challenge"], "tok-1");
            let policy = AuthPolicy {
                challenge: "tok-1".into(),
                scope: "console".into(),
                wallet: wallet_addr,
                application: Address::repeat_byte(0xaa),
                participant: key_addr,
                expire,
                allowances: vec![],
            };
            let digest = policy.signing_hash(&Eip712Domain { name: "demo".into() });
            assert_eq!(recover_address(&digest, &verify.signatures[0]).unwrap(), wallet_addr);
            answer(&mut server, &verify, "auth_verify", json!({"success": true})).await;

            let tag = next_request(&mut server).await;
            assert_eq!(tag.method(), "get_user_tag");
            // Signed by the session key now
            assert_eq!(
                recover_address(&tag.envelope.signing_hash(), &tag.signatures[0]).unwrap(),
                key_addr
            );
            answer(&mut server, &tag, "get_user_tag", json!({"tag": "UX1"})).await;
            server
        });

        session.authenticate(&wallet, key, &auth_config()).await.unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.session_address(), Some(key_addr));
        assert_eq!(session.user_tag(), Some("UX1"));
        let _server = peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_second_handshake_is_noop() {
        let (session, mut server) = pair(quiet_config()).await;
        let wallet = LocalSigner::random();

        let peer = tokio::spawn(async move {
            let req = next_request(&mut server).await;
            answer(&mut server, &req, "auth_challenge", json!({"challenge_message": "t"})).await;
            let req = next_request(&mut server).await;
            answer(&mut server, &req, "auth_verify", json!({"success": true})).await;
            let req = next_request(&mut server).await;
            answer(&mut server, &req, "get_user_tag", json!({"tag": "T"})).await;
            server
        });

        session
            .authenticate(&wallet, Arc::new(LocalSigner::random()), &auth_config())
            .await
            .unwrap();
        let sent = session.stats().total_registered.load(std::sync::atomic::Ordering::Relaxed);

        session
            .authenticate(&wallet, Arc::new(LocalSigner::random()), &auth_config())
            .await
            .unwrap();
        assert_eq!(
            session.stats().total_registered.load(std::sync::atomic::Ordering::Relaxed),
            sent
        );
        let _server = peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_success_flag_fails() {
        let (session, mut server) = pair(quiet_config()).await;
        let peer = tokio::spawn(async move {
            let req = next_request(&mut server).await;
            answer(&mut server, &req, "auth_challenge", json!({"challenge_message": "t"})).await;
            let req = next_request(&mut server).await;
            let address = format!("0x{}", "11".repeat(20));
            answer(&mut server, &req, "auth_verify", json!({ "address": address })).await;
            server
        });

        let err = session
            .authenticate(&LocalSigner::random(), Arc::new(LocalSigner::random()), &auth_config())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AuthenticationFailed(_)));
        assert!(!session.is_authenticated());
        let _server = peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_challenge_method_is_protocol_error() {
        let (session, mut server) = pair(quiet_config()).await;
        let peer = tokio::spawn(async move {
            let req = next_request(&mut server).await;
            answer(&mut server, &req, "auth_verify", json!({"success": true})).await;
            server
        });

        let err = session
            .authenticate(&LocalSigner::random(), Arc::new(LocalSigner::random()), &auth_config())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Protocol { .. }));
        let _server = peer.await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_challenge_is_auth_failure() {
        let (session, mut server) = pair(quiet_config()).await;
        let peer = tokio::spawn(async move {
            let req = next_request(&mut server).await;
            answer(&mut server, &req, "auth_challenge", json!({"challenge_message": "t"})).await;
            let req = next_request(&mut server).await;
            answer(&mut server, &req, "error", json!({"error": "invalid signature"})).await;
            server
        });

        let err = session
            .authenticate(&LocalSigner::random(), Arc::new(LocalSigner::random()), &auth_config())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AuthenticationFailed(ref m) if m == "invalid signature"));
        let _server = peer.await.unwrap();
    }
}
