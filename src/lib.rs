pub mod auth;
pub mod codec;
pub mod crypto;
mod error;
pub mod format;
pub mod keypair;
pub mod rsakey;
pub mod secret;
pub mod storage;
pub mod tty;

pub use crate::auth::{BatchPrompt, Prompt, TerminalPrompt};
pub use crate::crypto::KdfParams;
pub use crate::error::KeyError;
pub use crate::keypair::KeyPair;
pub use crate::storage::{Container, ContainerState, Storage};
use anyhow::{Context, Result, bail};
use directories::BaseDirs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// RSA modulus size used when none is configured.
pub const DEFAULT_RSA_BITS: usize = 2048;
/// Smallest RSA modulus accepted for new key pairs.
pub const MIN_RSA_BITS: usize = 512;
/// Largest RSA modulus accepted for new key pairs.
pub const MAX_RSA_BITS: usize = 16384;

/// Name of the per-user container directory under the home directory.
pub const DEFAULT_DIR_NAME: &str = ".pdp";

/// Creates, fetches and destroys the PDP key pair kept in one directory.
pub struct KeyStore {
    container: Container,
    rsa_bits: usize,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            container: Container::in_dir(dir),
            rsa_bits: DEFAULT_RSA_BITS,
        }
    }

    /// Sets the modulus size for newly created key pairs.
    pub fn with_rsa_bits(mut self, bits: usize) -> Self {
        self.rsa_bits = bits;
        self
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn dir(&self) -> &Path {
        self.container.dir()
    }

    /// Generates a new key pair and stores it under a passphrase read twice
    /// from `prompt`.
    ///
    /// If either container file exists the operator has to confirm the
    /// overwrite first, since proofs made with the old key can no longer be
    /// checked. The passphrase is read before any key material is generated.
    pub fn create(&self, prompt: &mut dyn Prompt) -> Result<KeyPair> {
        if self.container.state() != ContainerState::Missing {
            let overwrite = prompt.confirm(&format!(
                "A PDP key pair already exists in {}. Replacing it invalidates every proof made \
                 with the old key. Overwrite?",
                self.dir().display()
            ))?;
            if !overwrite {
                bail!(KeyError::Aborted);
            }
        }

        let passphrase = auth::read_new_passphrase_with_confirmation(prompt)?;
        self.create_with_passphrase(&passphrase)
    }

    /// Generates a new key pair and stores it under `passphrase`, replacing
    /// any existing container without asking.
    pub fn create_with_passphrase(&self, passphrase: &[u8]) -> Result<KeyPair> {
        if passphrase.is_empty() {
            bail!(KeyError::EmptyPassphrase);
        }
        if !(MIN_RSA_BITS..=MAX_RSA_BITS).contains(&self.rsa_bits) {
            bail!(
                "RSA modulus must be between {MIN_RSA_BITS} and {MAX_RSA_BITS} bits, got {}",
                self.rsa_bits
            );
        }

        info!(bits = self.rsa_bits, "generating PDP key pair");
        let keypair = KeyPair::generate(self.rsa_bits).context("failed to generate PDP key pair")?;

        let encoded = codec::encode(&keypair, passphrase)?;
        self.container.save(&encoded)?;

        info!(dir = %self.dir().display(), "PDP key pair stored");
        Ok(keypair)
    }

    /// Loads the key pair, asking `prompt` for the passphrase.
    ///
    /// With no container present the operator is offered to create one.
    /// A container missing its public half is an error; one missing its
    /// private half yields a public-only key pair without asking for a
    /// passphrase.
    pub fn fetch(&self, prompt: &mut dyn Prompt) -> Result<KeyPair> {
        match self.container.state() {
            ContainerState::Complete => {
                let passphrase = prompt.passphrase("PDP passphrase: ")?;
                self.open(&passphrase)
            }
            ContainerState::Missing => {
                prompt.notice(&format!(
                    "No PDP key pair found in {}.",
                    self.dir().display()
                ));
                if prompt.confirm("Generate a new PDP key pair now?")? {
                    self.create(prompt)
                } else {
                    bail!(KeyError::NotFound(self.dir().to_path_buf()))
                }
            }
            ContainerState::PrivateOnly => bail!(KeyError::IncompleteContainer(
                self.container.public_path().to_path_buf()
            )),
            ContainerState::PublicOnly => {
                debug!("private half missing, loading public key pair only");
                self.fetch_public_only()
            }
        }
    }

    /// Loads the private key pair with a known passphrase.
    pub fn open(&self, passphrase: &[u8]) -> Result<KeyPair> {
        match self.container.state() {
            ContainerState::Complete => {}
            ContainerState::PrivateOnly => bail!(KeyError::IncompleteContainer(
                self.container.public_path().to_path_buf()
            )),
            ContainerState::Missing | ContainerState::PublicOnly => bail!(KeyError::NotFound(
                self.container.private_path().to_path_buf()
            )),
        }

        let private = self.container.load_private()?;
        let public = self.container.load_public()?;
        let keypair = codec::decode(&private, &public, passphrase)?;

        debug!(dir = %self.dir().display(), "PDP key pair loaded");
        Ok(keypair)
    }

    /// Loads only the public half: RSA public key and generator.
    pub fn fetch_public_only(&self) -> Result<KeyPair> {
        if !self.container.public_path().exists() {
            bail!(KeyError::NotFound(self.container.public_path().to_path_buf()));
        }

        let public = self.container.load_public()?;
        let keypair = codec::decode_public(&public)?;

        debug!(dir = %self.dir().display(), "PDP public key loaded");
        Ok(keypair)
    }

    /// Releases a key pair, wiping `v` and the private RSA parameters.
    pub fn destroy(keypair: KeyPair) {
        keypair.destroy();
    }
}

/// `$HOME/.pdp`
pub fn default_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("could not determine home directory")?;
    Ok(base.home_dir().join(DEFAULT_DIR_NAME))
}
