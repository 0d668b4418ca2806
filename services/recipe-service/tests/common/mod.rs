//! Shared helpers for recipe-service integration tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use recipe_service::{
    MaterialSet, Recipe, RecipeConnector, RecipeSession, RecipeWorkflow, db::DbError,
};
use test_utils::{
    fixtures::{PkiFixture, SAMPLE_RECIPES},
    mocks::{MockIssuer, MockOutcome},
};
use vault_pki_client::{CertificateIssuer, IdentityRequest};

/// What the fake database does on connect.
#[derive(Debug, Clone)]
pub enum ConnectBehavior {
    /// Open a session over the configured rows
    Accept,
    /// Fail the way a rejected client certificate does
    Reject,
    /// Never complete
    Hang,
}

/// Material observed by the fake database while a request ran.
#[derive(Debug, Clone)]
pub struct Observed {
    /// Paths handed to the connector
    pub paths: Vec<PathBuf>,
    /// Every file existed when the connection was opened
    pub present_at_connect: bool,
    /// Every file still existed when the session was closed
    pub present_at_close: Option<bool>,
    /// Permission bits of the key file
    pub key_mode: Option<u32>,
}

/// In-memory stand-in for PostgreSQL.
#[derive(Clone)]
pub struct FakeConnector {
    rows: Arc<HashMap<i32, Vec<Recipe>>>,
    behavior: ConnectBehavior,
    observed: Arc<Mutex<Vec<Observed>>>,
}

impl FakeConnector {
    /// Database seeded with the sample recipes.
    pub fn with_samples() -> Self {
        let rows = SAMPLE_RECIPES
            .iter()
            .map(|r| {
                (
                    r.id,
                    vec![Recipe {
                        name: r.name.to_string(),
                        ingredients: r.ingredients.to_string(),
                    }],
                )
            })
            .collect();
        Self {
            rows: Arc::new(rows),
            behavior: ConnectBehavior::Accept,
            observed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Same rows, different connect behavior.
    pub fn behaving(mut self, behavior: ConnectBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Add a second row under `id`.
    pub fn with_duplicate(self, id: i32) -> Self {
        let mut rows = (*self.rows).clone();
        let entry = rows.entry(id).or_default();
        entry.push(Recipe {
            name: "Duplicate".to_string(),
            ingredients: "Copy".to_string(),
        });
        Self {
            rows: Arc::new(rows),
            ..self
        }
    }

    /// Every connection attempt so far.
    pub fn observed(&self) -> Vec<Observed> {
        self.observed.lock().unwrap().clone()
    }
}

fn key_mode(path: &Path) -> Option<u32> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path).ok().map(|m| m.permissions().mode() & 0o777)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        None
    }
}

#[async_trait]
impl RecipeConnector for FakeConnector {
    async fn connect(&self, material: &MaterialSet) -> Result<Box<dyn RecipeSession>, DbError> {
        let paths: Vec<PathBuf> = material.paths().iter().map(|p| p.to_path_buf()).collect();
        let index = {
            let mut observed = self.observed.lock().unwrap();
            observed.push(Observed {
                present_at_connect: paths.iter().all(|p| p.exists()),
                present_at_close: None,
                key_mode: key_mode(material.key()),
                paths: paths.clone(),
            });
            observed.len() - 1
        };

        match self.behavior {
            ConnectBehavior::Accept => Ok(Box::new(FakeSession {
                rows: Arc::clone(&self.rows),
                paths,
                observed: Arc::clone(&self.observed),
                index,
            })),
            ConnectBehavior::Reject => Err(DbError::Connect(
                "FATAL: certificate authentication failed for user \"app_user\" at db-01.internal:5432"
                    .to_string(),
            )),
            ConnectBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(DbError::Connect("unreachable".to_string()))
            }
        }
    }
}

struct FakeSession {
    rows: Arc<HashMap<i32, Vec<Recipe>>>,
    paths: Vec<PathBuf>,
    observed: Arc<Mutex<Vec<Observed>>>,
    index: usize,
}

#[async_trait]
impl RecipeSession for FakeSession {
    async fn fetch_recipe(&mut self, id: i32) -> Result<Option<Recipe>, DbError> {
        match self.rows.get(&id).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([row]) => Ok(Some(row.clone())),
            Some(rows) => Err(DbError::Integrity { rows: rows.len() }),
        }
    }

    async fn close(self: Box<Self>) {
        let present = self.paths.iter().all(|p| p.exists());
        self.observed.lock().unwrap()[self.index].present_at_close = Some(present);
    }
}

/// Workflow over `issuer` and `connector`, writing into `dir`.
pub fn workflow(
    issuer: Arc<dyn CertificateIssuer>,
    connector: Arc<dyn RecipeConnector>,
    dir: &Path,
) -> RecipeWorkflow {
    RecipeWorkflow::new(
        issuer,
        connector,
        IdentityRequest::new("app_user", "postgres-client"),
    )
    .with_material_dir(dir)
    .with_issue_timeout(Duration::from_secs(2))
}

/// Issuer handing out a freshly generated fixture for `app_user`.
pub fn fixture_issuer() -> MockIssuer {
    let fixture = PkiFixture::generate("app_user").unwrap();
    MockIssuer::issuing(fixture.issued_credential())
}

/// Issuer answering with `outcome`.
pub fn issuer(outcome: MockOutcome) -> MockIssuer {
    MockIssuer::new(outcome)
}

/// Number of entries left in `dir`.
pub fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
