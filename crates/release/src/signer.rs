//! Local transaction signing.

use std::fmt;

use alloy_core::{
    primitives::{Address, B256, Bytes, U256, keccak256},
    rlp::{Encodable, Header},
};
use anyhow::Context;
use k256::ecdsa::SigningKey;

/// A secp256k1 key and the address it controls.
#[derive(Clone)]
pub struct SignerIdentity {
    key: SigningKey,
    address: Address,
}

impl fmt::Debug for SignerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerIdentity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl SignerIdentity {
    /// Create a signer from a 32-byte private key as hex (with or without 0x prefix).
    pub fn from_hex(private_key_hex: &str) -> Result<Self, anyhow::Error> {
        let private_key_hex = private_key_hex.trim();
        let private_key_hex = private_key_hex
            .strip_prefix("0x")
            .unwrap_or(private_key_hex);

        let private_key_bytes: [u8; 32] = hex::decode(private_key_hex)
            .context("Private key is not valid hex")?
            .try_into()
            .map_err(|_| anyhow::anyhow!("Private key must be exactly 32 bytes"))?;

        let key = SigningKey::from_bytes(&private_key_bytes.into())
            .map_err(|e| anyhow::anyhow!("Invalid secp256k1 private key: {}", e))?;

        Ok(Self::from_signing_key(key))
    }

    pub fn from_signing_key(key: SigningKey) -> Self {
        // Uncompressed point is 0x04 || X || Y; the address is the last 20
        // bytes of keccak256(X || Y).
        let public_key_point = key.verifying_key().to_encoded_point(false);
        let hash = keccak256(&public_key_point.as_bytes()[1..]);
        let address = Address::from_slice(&hash[12..]);

        Self { key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a legacy (EIP-155) contract-creation transaction and return its
    /// raw encoding together with its hash.
    pub fn sign_creation(&self, tx: &LegacyCreation) -> Result<SignedTransaction, anyhow::Error> {
        let to = Bytes::new();
        let value = U256::ZERO;

        let signing_payload = rlp_list(&[
            &tx.nonce,
            &tx.gas_price,
            &tx.gas_limit,
            &to,
            &value,
            &tx.data,
            &tx.chain_id,
            &0u8,
            &0u8,
        ]);
        let signing_hash = keccak256(&signing_payload);

        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(signing_hash.as_slice())
            .map_err(|e| anyhow::anyhow!("Failed to sign transaction: {}", e))?;

        let signature_bytes = signature.to_bytes();
        let r = U256::from_be_slice(&signature_bytes[..32]);
        let s = U256::from_be_slice(&signature_bytes[32..]);
        let v = u64::from(recovery_id.to_byte()) + 35 + tx.chain_id * 2;

        let raw = rlp_list(&[
            &tx.nonce,
            &tx.gas_price,
            &tx.gas_limit,
            &to,
            &value,
            &tx.data,
            &v,
            &r,
            &s,
        ]);
        let hash = keccak256(&raw);

        Ok(SignedTransaction {
            raw: Bytes::from(raw),
            hash,
        })
    }
}

/// Fields of a legacy contract-creation transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyCreation {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub data: Bytes,
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: B256,
}

fn rlp_list(fields: &[&dyn Encodable]) -> Vec<u8> {
    let payload_length = fields.iter().map(|field| field.length()).sum();
    let mut out = Vec::with_capacity(payload_length + 9);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    for field in fields {
        field.encode(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::VerifyingKey;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_address_from_known_key() {
        let signer = SignerIdentity::from_hex(TEST_KEY).unwrap();
        assert_eq!(
            signer.address().to_checksum(None),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_invalid_keys() {
        assert!(SignerIdentity::from_hex("0x1234").is_err());
        assert!(SignerIdentity::from_hex("not-hex").is_err());
        assert!(SignerIdentity::from_hex(&format!("0x{}", "00".repeat(32))).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let signer = SignerIdentity::from_hex(TEST_KEY).unwrap();
        let printed = format!("{signer:?}");
        assert!(!printed.contains("ac0974bec39a17e3"));
        assert!(printed.contains("address"));
    }

    #[test]
    fn test_sign_creation_recovers_signer() {
        let signer = SignerIdentity::from_hex(TEST_KEY).unwrap();
        let tx = LegacyCreation {
            chain_id: 5,
            nonce: 7,
            gas_price: 1_000_000_000,
            gas_limit: 3_000_000,
            data: Bytes::from(vec![0x60, 0x80, 0x60, 0x40]),
        };

        let signed = signer.sign_creation(&tx).unwrap();
        assert_eq!(signed.hash, keccak256(&signed.raw));
        // Long list header
        assert!(signed.raw[0] >= 0xc0);

        // Recover from the EIP-155 signing hash.
        let payload = rlp_list(&[
            &tx.nonce,
            &tx.gas_price,
            &tx.gas_limit,
            &Bytes::new(),
            &U256::ZERO,
            &tx.data,
            &tx.chain_id,
            &0u8,
            &0u8,
        ]);
        let signing_hash = keccak256(&payload);
        let (signature, recovery_id) = signer
            .key
            .sign_prehash_recoverable(signing_hash.as_slice())
            .unwrap();
        let recovered =
            VerifyingKey::recover_from_prehash(signing_hash.as_slice(), &signature, recovery_id)
                .unwrap();
        assert_eq!(&recovered, signer.key.verifying_key());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = SignerIdentity::from_hex(TEST_KEY).unwrap();
        let tx = LegacyCreation {
            chain_id: 100,
            nonce: 0,
            gas_price: 2,
            gas_limit: 21_000,
            data: Bytes::from(vec![0xfe]),
        };
        assert_eq!(
            signer.sign_creation(&tx).unwrap(),
            signer.sign_creation(&tx).unwrap()
        );
    }
}
