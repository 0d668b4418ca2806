//! Test fixtures with sample data.
//!
//! [`PkiFixture`] mints a throwaway certificate authority and certificates
//! signed by it, so tests exercise real PEM material instead of placeholders.

use chrono::{Duration, Utc};
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use secrecy::SecretString;
use vault_pki_client::IssuedCredential;

/// A CA plus one client certificate signed by it, all PEM encoded.
#[derive(Debug, Clone)]
pub struct PkiFixture {
    /// CA certificate
    pub ca_pem: String,
    /// Client (leaf) certificate
    pub client_cert_pem: String,
    /// Client private key, PKCS#8
    pub client_key_pem: String,
    /// Common name embedded in the client certificate
    pub common_name: String,
}

impl PkiFixture {
    /// Generate a CA and a client certificate for `common_name`.
    ///
    /// # Errors
    ///
    /// Returns the rcgen error if key generation or signing fails.
    pub fn generate(common_name: &str) -> Result<Self, rcgen::Error> {
        let ca_key = KeyPair::generate()?;
        let mut ca_params = CertificateParams::new(Vec::<String>::new())?;
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "Recipe Test Root CA");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
        ];
        let ca_cert = ca_params.self_signed(&ca_key)?;

        let client_key = KeyPair::generate()?;
        let mut client_params = CertificateParams::new(Vec::<String>::new())?;
        client_params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        client_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        let client_cert = client_params.signed_by(&client_key, &ca_cert, &ca_key)?;

        Ok(Self {
            ca_pem: ca_cert.pem(),
            client_cert_pem: client_cert.pem(),
            client_key_pem: client_key.serialize_pem(),
            common_name: common_name.to_string(),
        })
    }

    /// Shape the fixture as Vault would return it.
    #[must_use]
    pub fn issued_credential(&self) -> IssuedCredential {
        IssuedCredential {
            certificate: self.client_cert_pem.clone(),
            private_key: SecretString::from(self.client_key_pem.clone()),
            issuing_ca: self.ca_pem.clone(),
            serial_number: "1f:2e:3d:4c:5b".to_string(),
            expiration: Some(Utc::now() + Duration::minutes(5)),
        }
    }

    /// JSON body of a Vault `pki/issue` response carrying this fixture.
    #[must_use]
    pub fn vault_issue_response(&self) -> serde_json::Value {
        serde_json::json!({
            "request_id": "fixture",
            "lease_id": "",
            "renewable": false,
            "lease_duration": 0,
            "data": {
                "certificate": self.client_cert_pem,
                "issuing_ca": self.ca_pem,
                "ca_chain": [self.ca_pem],
                "private_key": self.client_key_pem,
                "private_key_type": "ec",
                "serial_number": "1f:2e:3d:4c:5b",
                "expiration": (Utc::now() + Duration::minutes(5)).timestamp()
            },
            "warnings": null
        })
    }
}

/// A recipe row as stored in the `recipes` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecipe {
    /// Primary key
    pub id: i32,
    /// Recipe name
    pub name: &'static str,
    /// Ingredient list
    pub ingredients: &'static str,
}

/// Rows seeded into the backing table by the tutorial setup.
pub const SAMPLE_RECIPES: &[SampleRecipe] = &[
    SampleRecipe {
        id: 1,
        name: "Elixir of Invisibility",
        ingredients: "Moon dust, shadow essence",
    },
    SampleRecipe {
        id: 2,
        name: "Potion of Strength",
        ingredients: "Dragon scale, giant's toenail",
    },
    SampleRecipe {
        id: 3,
        name: "Draught of Clarity",
        ingredients: "Owl feather, morning dew",
    },
];

/// An identifier never present in [`SAMPLE_RECIPES`].
pub const MISSING_RECIPE_ID: i32 = 999;
