//! Private key loading.
//!
//! Two independent keys: the chain signer submits settlement
//! transactions, the venue agent key signs exchange actions. Keys are
//! loaded once at startup from an environment variable or a file, with
//! optional verification of the derived address. Never log key material.

use std::path::PathBuf;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use thiserror::Error;
use zeroize::Zeroizing;

/// Where a private key comes from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Environment variable (development).
    EnvVar { var_name: String },
    /// File on disk (production; keep permissions at 0600).
    File { path: PathBuf },
}

/// Key loading errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Load a signer from `source`, verifying the derived address against
/// `expected_address` when given.
pub fn load_signer(
    source: &KeySource,
    expected_address: Option<Address>,
) -> Result<PrivateKeySigner, KeyError> {
    fn parse_hex_key(hex_str: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let trimmed = hex_str.trim().trim_start_matches("0x");
        Ok(Zeroizing::new(hex::decode(trimmed)?))
    }

    let secret_bytes: Zeroizing<Vec<u8>> = match source {
        KeySource::EnvVar { var_name } => {
            let hex = std::env::var(var_name)
                .map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?;
            parse_hex_key(&hex)?
        }
        KeySource::File { path } => {
            let content = std::fs::read_to_string(path)?;
            parse_hex_key(&content)?
        }
    };

    let signer = PrivateKeySigner::from_slice(&secret_bytes)
        .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

    if let Some(expected) = expected_address {
        if signer.address() != expected {
            return Err(KeyError::AddressMismatch {
                expected,
                actual: signer.address(),
            });
        }
    }

    Ok(signer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Well-known test private key, never used in production.
    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_load_from_file_with_prefix_and_whitespace() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  {TEST_PRIVATE_KEY}  ").unwrap();

        let signer = load_signer(
            &KeySource::File {
                path: file.path().to_path_buf(),
            },
            None,
        )
        .unwrap();
        assert_ne!(signer.address(), Address::ZERO);
    }

    #[test]
    fn test_address_mismatch_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{TEST_PRIVATE_KEY}").unwrap();

        let result = load_signer(
            &KeySource::File {
                path: file.path().to_path_buf(),
            },
            Some(Address::ZERO),
        );
        assert!(matches!(result, Err(KeyError::AddressMismatch { .. })));
    }

    #[test]
    fn test_missing_env_var() {
        let result = load_signer(
            &KeySource::EnvVar {
                var_name: "VAULT_BOT_TEST_KEY_THAT_DOES_NOT_EXIST".into(),
            },
            None,
        );
        assert!(matches!(result, Err(KeyError::EnvVarNotFound(_))));
    }
}
