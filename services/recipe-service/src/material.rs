//! Ephemeral certificate material on disk.
//!
//! The PostgreSQL TLS stack wants file paths, not buffers, so an issued
//! credential is written to three short-lived files. A [`MaterialSet`] owns
//! those files and removes them exactly once: either through
//! [`MaterialSet::cleanup`] or, if the request is abandoned first, on drop.

use secrecy::ExposeSecret;
use std::{
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, warn};
use vault_pki_client::IssuedCredential;

/// The three files making up a material set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    /// Issuing CA, used as the trust anchor for the server certificate
    RootCa,
    /// Client certificate
    Certificate,
    /// Client private key
    Key,
}

impl MaterialKind {
    const fn prefix(self) -> &'static str {
        match self {
            Self::RootCa => "root-ca-",
            Self::Certificate => "client-cert-",
            Self::Key => "client-key-",
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RootCa => "root CA",
            Self::Certificate => "certificate",
            Self::Key => "private key",
        })
    }
}

/// Failure to write a material set.
#[derive(Error, Debug)]
pub enum MaterialError {
    /// The issued credential had an empty PEM field
    #[error("issued {0} is empty")]
    EmptyField(MaterialKind),

    /// Writing a file failed
    #[error("failed to write {kind}: {source}")]
    Io {
        /// File being written
        kind: MaterialKind,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

/// Outcome of removing a material set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files removed or already gone
    pub removed: usize,
    /// Files that could not be removed
    pub failed: usize,
}

/// Root CA, client certificate and key written to private temporary files.
#[derive(Debug)]
pub struct MaterialSet {
    root_ca: PathBuf,
    certificate: PathBuf,
    key: PathBuf,
    cleaned: bool,
}

impl MaterialSet {
    /// Write `credential` into `dir`.
    ///
    /// Each PEM block is written verbatim to a file with an unpredictable
    /// name and mode `0600`. Either all three files exist afterwards or none
    /// do.
    ///
    /// # Errors
    ///
    /// [`MaterialError::EmptyField`] if any PEM field is blank (nothing is
    /// written), [`MaterialError::Io`] if a write fails (partial files are
    /// removed first).
    pub fn materialize(credential: &IssuedCredential, dir: &Path) -> Result<Self, MaterialError> {
        let key = credential.private_key.expose_secret();
        let blocks = [
            (MaterialKind::RootCa, credential.issuing_ca.as_str()),
            (MaterialKind::Certificate, credential.certificate.as_str()),
            (MaterialKind::Key, key),
        ];
        if let Some((kind, _)) = blocks.iter().find(|(_, pem)| pem.trim().is_empty()) {
            return Err(MaterialError::EmptyField(*kind));
        }

        let dir = std::path::absolute(dir).map_err(|source| MaterialError::Io {
            kind: MaterialKind::RootCa,
            source,
        })?;

        let [root_ca, certificate, key] = write_set(&dir, blocks, write_pem)?;

        debug!(dir = %dir.display(), "Material written");
        Ok(Self {
            root_ca,
            certificate,
            key,
            cleaned: false,
        })
    }

    /// Path of the root CA file.
    #[must_use]
    pub fn root_ca(&self) -> &Path {
        &self.root_ca
    }

    /// Path of the client certificate file.
    #[must_use]
    pub fn certificate(&self) -> &Path {
        &self.certificate
    }

    /// Path of the client key file.
    #[must_use]
    pub fn key(&self) -> &Path {
        &self.key
    }

    /// All three paths, in root CA, certificate, key order.
    #[must_use]
    pub fn paths(&self) -> [&Path; 3] {
        [&self.root_ca, &self.certificate, &self.key]
    }

    /// Remove every file, continuing past failures.
    ///
    /// Failures are logged, never returned.
    pub fn cleanup(mut self) -> CleanupReport {
        self.remove_all()
    }

    fn remove_all(&mut self) -> CleanupReport {
        self.cleaned = true;
        let mut report = CleanupReport::default();
        for path in [&self.root_ca, &self.certificate, &self.key] {
            match std::fs::remove_file(path) {
                Ok(()) => report.removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "Material already removed");
                    report.removed += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove material");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

impl Drop for MaterialSet {
    fn drop(&mut self) {
        if !self.cleaned {
            warn!("Material set dropped before cleanup, removing files");
            self.remove_all();
        }
    }
}

/// Write the three blocks in order with `write`, removing earlier files if a
/// later write fails.
fn write_set<W>(
    dir: &Path,
    [ca, cert, key]: [(MaterialKind, &str); 3],
    mut write: W,
) -> Result<[PathBuf; 3], MaterialError>
where
    W: FnMut(&Path, MaterialKind, &str) -> Result<PathBuf, MaterialError>,
{
    let root_ca = write(dir, ca.0, ca.1)?;
    let certificate = write(dir, cert.0, cert.1).inspect_err(|_| remove_partial(&[&root_ca]))?;
    let key = write(dir, key.0, key.1)
        .inspect_err(|_| remove_partial(&[&root_ca, &certificate]))?;
    Ok([root_ca, certificate, key])
}

fn remove_partial(paths: &[&PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove partial material");
        }
    }
}

fn write_pem(dir: &Path, kind: MaterialKind, pem: &str) -> Result<PathBuf, MaterialError> {
    let io_err = |source| MaterialError::Io { kind, source };

    let mut file = tempfile::Builder::new()
        .prefix(kind.prefix())
        .suffix(".pem")
        .tempfile_in(dir)
        .map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(io_err)?;
    }

    file.write_all(pem.as_bytes()).map_err(io_err)?;
    file.as_file().sync_all().map_err(io_err)?;

    let (_, path) = file.keep().map_err(|e| io_err(e.error))?;
    Ok(path)
}
