/*
 * signature.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use sha2::Sha512;

use crate::error::Error;

/// Signs and verifies the four payload frames of a message with the
/// connection key. The signature is the lowercase hex digest of the HMAC over
/// header, parent header, metadata and content, in that order.
#[derive(Clone, Debug)]
pub enum Signer {
    Sha256(Hmac<Sha256>),
    Sha512(Hmac<Sha512>),
}

impl Signer {
    /// Create a signer for the given `signature_scheme` of a connection file.
    /// An empty scheme means the default `hmac-sha256`.
    pub fn new(key: &str, scheme: &str) -> Result<Self, Error> {
        match scheme {
            "" | "hmac-sha256" => match Hmac::<Sha256>::new_from_slice(key.as_bytes()) {
                Ok(hmac) => Ok(Signer::Sha256(hmac)),
                Err(err) => Err(Error::HmacKeyInvalid(key.to_string(), err)),
            },
            "hmac-sha512" => match Hmac::<Sha512>::new_from_slice(key.as_bytes()) {
                Ok(hmac) => Ok(Signer::Sha512(hmac)),
                Err(err) => Err(Error::HmacKeyInvalid(key.to_string(), err)),
            },
            _ => Err(Error::UnsupportedSignatureScheme(scheme.to_string())),
        }
    }

    /// Compute the hex signature of the given payload frames.
    pub fn sign(&self, parts: &[Vec<u8>]) -> String {
        match self {
            Signer::Sha256(key) => {
                let mut mac = key.clone();
                for part in parts {
                    mac.update(part);
                }
                hex::encode(mac.finalize().into_bytes())
            },
            Signer::Sha512(key) => {
                let mut mac = key.clone();
                for part in parts {
                    mac.update(part);
                }
                hex::encode(mac.finalize().into_bytes())
            },
        }
    }

    /// Check a hex signature against the given payload frames.
    pub fn verify(&self, signature: &[u8], parts: &[Vec<u8>]) -> Result<(), Error> {
        let decoded = match hex::decode(signature) {
            Ok(bytes) => bytes,
            Err(err) => return Err(Error::InvalidHmac(signature.to_vec(), err)),
        };

        let verified = match self {
            Signer::Sha256(key) => {
                let mut mac = key.clone();
                for part in parts {
                    mac.update(part);
                }
                mac.verify_slice(&decoded)
            },
            Signer::Sha512(key) => {
                let mut mac = key.clone();
                for part in parts {
                    mac.update(part);
                }
                mac.verify_slice(&decoded)
            },
        };

        match verified {
            Ok(_) => Ok(()),
            Err(_) => Err(Error::BadSignature(decoded)),
        }
    }
}
