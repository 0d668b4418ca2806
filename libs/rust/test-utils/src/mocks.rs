//! Mock implementations for testing.
//!
//! [`MockIssuer`] stands in for Vault behind the [`CertificateIssuer`] trait
//! and records every request it receives.

use async_trait::async_trait;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;
use tokio::sync::RwLock;
use vault_pki_client::{
    CertificateIssuer, CertificateRecord, IdentityRequest, IssuedCredential, VaultError,
    VaultResult,
};

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return this credential
    Issue(IssuedCredential),
    /// Vault refuses the identity
    Denied,
    /// Vault cannot be reached
    Unavailable,
    /// Vault never answers within `Duration`
    Hang(Duration),
}

/// Scriptable certificate issuer.
#[derive(Debug, Clone)]
pub struct MockIssuer {
    outcome: MockOutcome,
    calls: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<IdentityRequest>>>,
}

impl MockIssuer {
    /// Create an issuer that always answers with `outcome`.
    #[must_use]
    pub fn new(outcome: MockOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Issuer handing out `credential` on every call.
    #[must_use]
    pub fn issuing(credential: IssuedCredential) -> Self {
        Self::new(MockOutcome::Issue(credential))
    }

    /// Number of issue calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every identity requested so far.
    pub async fn requests(&self) -> Vec<IdentityRequest> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl CertificateIssuer for MockIssuer {
    async fn issue_certificate(&self, request: &IdentityRequest) -> VaultResult<IssuedCredential> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push(request.clone());

        match &self.outcome {
            MockOutcome::Issue(credential) => Ok(credential.clone()),
            MockOutcome::Denied => Err(VaultError::PermissionDenied(format!(
                "pki_int/issue/{}",
                request.role
            ))),
            MockOutcome::Unavailable => Err(VaultError::unavailable("connection refused")),
            MockOutcome::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                Err(VaultError::Timeout(*duration))
            }
        }
    }

    async fn read_certificate(&self, serial_number: &str) -> VaultResult<CertificateRecord> {
        match &self.outcome {
            MockOutcome::Issue(credential) if credential.serial_number == serial_number => {
                Ok(CertificateRecord {
                    serial_number: serial_number.to_string(),
                    certificate: credential.certificate.clone(),
                    revoked_at: None,
                })
            }
            _ => Err(VaultError::not_found(format!("pki_int/cert/{serial_number}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::PkiFixture;

    #[tokio::test]
    async fn test_mock_issuer_records_requests() {
        let fixture = PkiFixture::generate("app_user").unwrap();
        let issuer = MockIssuer::issuing(fixture.issued_credential());

        let request = IdentityRequest::new("app_user", "postgres-client");
        let cred = issuer.issue_certificate(&request).await.unwrap();

        assert_eq!(issuer.call_count(), 1);
        assert_eq!(issuer.requests().await, vec![request]);
        let record = issuer.read_certificate(&cred.serial_number).await.unwrap();
        assert_eq!(record.certificate, cred.certificate);
    }

    #[tokio::test]
    async fn test_mock_issuer_denied() {
        let issuer = MockIssuer::new(MockOutcome::Denied);
        let err = issuer
            .issue_certificate(&IdentityRequest::new("intruder", "postgres-client"))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::PermissionDenied(_)));
    }
}
