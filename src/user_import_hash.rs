use std::ops::RangeInclusive;

use super::error::{Error, Result};
use super::json::JsonObject;
use super::json_object;

const HASH_ALGORITHM: &str = "hashAlgorithm";

const MD5_ROUNDS: RangeInclusive<i32> = 0..=8192;
const SHA_ROUNDS: RangeInclusive<i32> = 1..=8192;
const PBKDF_ROUNDS: RangeInclusive<i32> = 0..=120_000;
const SCRYPT_ROUNDS: RangeInclusive<i32> = 1..=8;
const SCRYPT_MEMORY_COST: RangeInclusive<i32> = 1..=14;

/// Password hashing algorithm used by the system the users are imported
/// from, along with its parameters.
///
/// Parameters are validated when [`properties`](UserImportHash::properties)
/// is called, not on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserImportHash {
    Md5 {
        rounds: i32,
    },
    Sha1 {
        rounds: i32,
    },
    Sha256 {
        rounds: i32,
    },
    Sha512 {
        rounds: i32,
    },
    Pbkdf2Sha256 {
        rounds: i32,
    },
    PbkdfSha1 {
        rounds: i32,
    },
    HmacMd5 {
        key: Vec<u8>,
    },
    HmacSha1 {
        key: Vec<u8>,
    },
    HmacSha256 {
        key: Vec<u8>,
    },
    HmacSha512 {
        key: Vec<u8>,
    },
    Bcrypt,
    /// Firebase's modified scrypt.
    Scrypt {
        key: Vec<u8>,
        salt_separator: Vec<u8>,
        rounds: i32,
        memory_cost: i32,
    },
    StandardScrypt {
        memory_cost: i32,
        parallelization: i32,
        block_size: i32,
        derived_key_length: i32,
    },
}

impl UserImportHash {
    pub fn algorithm(&self) -> &'static str {
        match self {
            Self::Md5 { .. } => "MD5",
            Self::Sha1 { .. } => "SHA1",
            Self::Sha256 { .. } => "SHA256",
            Self::Sha512 { .. } => "SHA512",
            Self::Pbkdf2Sha256 { .. } => "PBKDF2_SHA256",
            Self::PbkdfSha1 { .. } => "PBKDF_SHA1",
            Self::HmacMd5 { .. } => "HMAC_MD5",
            Self::HmacSha1 { .. } => "HMAC_SHA1",
            Self::HmacSha256 { .. } => "HMAC_SHA256",
            Self::HmacSha512 { .. } => "HMAC_SHA512",
            Self::Bcrypt => "BCRYPT",
            Self::Scrypt { .. } => "SCRYPT",
            Self::StandardScrypt { .. } => "STANDARD_SCRYPT",
        }
    }

    /// Accepted rounds, for the variants that take a rounds count.
    pub fn rounds_range(&self) -> Option<RangeInclusive<i32>> {
        match self {
            Self::Md5 { .. } => Some(MD5_ROUNDS),
            Self::Sha1 { .. } | Self::Sha256 { .. } | Self::Sha512 { .. } => Some(SHA_ROUNDS),
            Self::Pbkdf2Sha256 { .. } | Self::PbkdfSha1 { .. } => Some(PBKDF_ROUNDS),
            Self::Scrypt { .. } => Some(SCRYPT_ROUNDS),
            _ => None,
        }
    }

    /// Builds the hash configuration sent along with imported users.
    pub fn properties(&self) -> Result<JsonObject> {
        properties(self.algorithm(), || self.options())
    }

    fn options(&self) -> Result<JsonObject> {
        match self {
            Self::Md5 { rounds } => repeatable(*rounds, MD5_ROUNDS),
            Self::Sha1 { rounds } | Self::Sha256 { rounds } | Self::Sha512 { rounds } => {
                repeatable(*rounds, SHA_ROUNDS)
            }
            Self::Pbkdf2Sha256 { rounds } | Self::PbkdfSha1 { rounds } => {
                repeatable(*rounds, PBKDF_ROUNDS)
            }
            Self::HmacMd5 { key }
            | Self::HmacSha1 { key }
            | Self::HmacSha256 { key }
            | Self::HmacSha512 { key } => Ok(json_object! { "signerKey" => signer_key(key)? }),
            Self::Bcrypt => Ok(JsonObject::new()),
            Self::Scrypt {
                key,
                salt_separator,
                rounds,
                memory_cost,
            } => {
                let key = signer_key(key)?;
                check_range("rounds", *rounds, SCRYPT_ROUNDS)?;
                check_range("memory cost", *memory_cost, SCRYPT_MEMORY_COST)?;
                Ok(json_object! {
                    "signerKey" => key,
                    "saltSeparator" => encode(salt_separator),
                    "rounds" => *rounds,
                    "memoryCost" => *memory_cost
                })
            }
            Self::StandardScrypt {
                memory_cost,
                parallelization,
                block_size,
                derived_key_length,
            } => Ok(json_object! {
                "cpuMemCost" => *memory_cost,
                "parallelization" => *parallelization,
                "blockSize" => *block_size,
                "dkLen" => *derived_key_length
            }),
        }
    }
}

fn properties<F>(algorithm: &str, options: F) -> Result<JsonObject>
where
    F: FnOnce() -> Result<JsonObject>,
{
    if algorithm.is_empty() {
        return Err(Error::invalid_argument(
            "hash algorithm name must not be empty",
        ));
    }

    let mut properties = options()?;
    properties.insert(HASH_ALGORITHM.to_string(), algorithm.into());
    Ok(properties)
}

fn repeatable(rounds: i32, range: RangeInclusive<i32>) -> Result<JsonObject> {
    check_range("rounds", rounds, range)?;
    Ok(json_object! { "rounds" => rounds })
}

fn check_range(name: &str, value: i32, range: RangeInclusive<i32>) -> Result<()> {
    if !range.contains(&value) {
        return Err(Error::invalid_argument(format!(
            "{} must be between {} and {}",
            name,
            range.start(),
            range.end()
        )));
    }
    Ok(())
}

fn signer_key(key: &[u8]) -> Result<String> {
    if key.is_empty() {
        return Err(Error::invalid_argument("signer key must not be empty"));
    }
    Ok(encode(key))
}

fn encode(data: &[u8]) -> String {
    base64::encode_config(data, base64::URL_SAFE_NO_PAD)
}
