//! The per-request lookup workflow.
//!
//! One request runs strictly in order: issue a certificate, write it to
//! disk, connect, query, close, remove the files. Requests share nothing but
//! the issuer, the connector and the configuration captured here.

use crate::{
    db::{Recipe, RecipeConnector},
    error::RecipeError,
    material::MaterialSet,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use vault_pki_client::{CertificateIssuer, IdentityRequest, IssuedCredential};

/// Default bound on certificate issuance.
pub const DEFAULT_ISSUE_TIMEOUT: Duration = Duration::from_secs(15);

/// Certificate-authenticated recipe lookup.
pub struct RecipeWorkflow {
    issuer: Arc<dyn CertificateIssuer>,
    connector: Arc<dyn RecipeConnector>,
    identity: IdentityRequest,
    material_dir: PathBuf,
    issue_timeout: Duration,
}

impl RecipeWorkflow {
    /// Create a workflow requesting `identity` for every lookup.
    #[must_use]
    pub fn new(
        issuer: Arc<dyn CertificateIssuer>,
        connector: Arc<dyn RecipeConnector>,
        identity: IdentityRequest,
    ) -> Self {
        Self {
            issuer,
            connector,
            identity,
            material_dir: std::env::temp_dir(),
            issue_timeout: DEFAULT_ISSUE_TIMEOUT,
        }
    }

    /// Write material files into `dir` instead of the system temp dir.
    #[must_use]
    pub fn with_material_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.material_dir = dir.into();
        self
    }

    /// Bound the issuance step.
    #[must_use]
    pub const fn with_issue_timeout(mut self, timeout: Duration) -> Self {
        self.issue_timeout = timeout;
        self
    }

    /// Identity requested from the issuer.
    #[must_use]
    pub const fn identity(&self) -> &IdentityRequest {
        &self.identity
    }

    /// Look up recipe `id`.
    ///
    /// Returns `Ok(None)` when no row matches. Material files written for the
    /// request are removed before this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// [`RecipeError::InvalidId`] for non-positive identifiers, otherwise the
    /// error of the first failing step.
    #[instrument(skip(self), fields(request_id = %Uuid::new_v4()))]
    pub async fn handle_request(&self, id: i32) -> Result<Option<Recipe>, RecipeError> {
        if id <= 0 {
            return Err(RecipeError::InvalidId);
        }

        let credential = self.request_credential().await?;
        let material = MaterialSet::materialize(&credential, &self.material_dir)?;
        drop(credential);
        debug!("Material written");

        let outcome = self.query(&material, id).await;

        let report = material.cleanup();
        if report.failed > 0 {
            warn!(failed = report.failed, "Some material files were not removed");
        } else {
            debug!(removed = report.removed, "Material removed");
        }

        let recipe = outcome?;
        match &recipe {
            Some(_) => info!("Recipe found"),
            None => info!("Recipe not found"),
        }
        Ok(recipe)
    }

    async fn request_credential(&self) -> Result<IssuedCredential, RecipeError> {
        let credential = tokio::time::timeout(
            self.issue_timeout,
            self.issuer.issue_certificate(&self.identity),
        )
        .await
        .map_err(|_| RecipeError::Timeout {
            duration: self.issue_timeout,
        })??;

        debug!(
            serial = %credential.serial_number,
            expires = ?credential.expiration,
            "Credential issued"
        );
        Ok(credential)
    }

    async fn query(&self, material: &MaterialSet, id: i32) -> Result<Option<Recipe>, RecipeError> {
        let mut session = self.connector.connect(material).await?;
        debug!("Connected");
        let result = session.fetch_recipe(id).await;
        session.close().await;
        result.map_err(RecipeError::from)
    }
}
