//!
//! The record envelope codec.
//!
//! A record is one line, `iv tag ciphertext\n`, all three tokens base64
//! with trailing padding stripped. The cipher is AES-256-GCM with an
//! 8-byte IV carrying `[32 bits UTC seconds][10 bits milliseconds]
//! [18 bits random]` in the high 60 bits of a big-endian u64. The
//! associated data binds the owning replica id and the byte offset the
//! record starts at, so a record copied to another file or offset fails
//! authentication.
//!
//! The embedded timestamp orders records during replay and is readable
//! without the key; correctness never depends on it being monotonic.

use aes_gcm::aead::consts::U8;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// GCM accepts IVs other than the usual 96 bits; records carry 64.
type RecordAead = AesGcm<Aes256, U8>;

const IV_LEN: usize = 8;
const ENCODED_IV_LEN: usize = 10;
const TAG_LEN: usize = 16;

const KDF_SALT: [u8; 16] = [
    0xf8, 0x99, 0x8a, 0x8c, 0x2a, 0x3a, 0x94, 0x08, 0x61, 0x83, 0x0a, 0x4d, 0xab, 0x62, 0xfe, 0x46,
];

/// Derive the 256-bit log key from a password: SHA-256 over a fixed salt
/// and the UTF-8 password bytes.
pub fn hash_password(password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(KDF_SALT);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Encrypts and decrypts single log records under one key.
pub struct CommandCipher {
    aead: RecordAead,
}

impl CommandCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            aead: RecordAead::new(key.into()),
        }
    }

    /// Encrypt one command into a complete record line for the given
    /// replica file position.
    pub fn encrypt(&self, plaintext: &str, app_id: &str, offset: u64) -> Result<String, CryptoError> {
        self.encrypt_at(plaintext, app_id, offset, Utc::now())
    }

    /// Like [`encrypt`](Self::encrypt) with an explicit wall-clock
    /// reading for the IV.
    pub fn encrypt_at(
        &self,
        plaintext: &str,
        app_id: &str,
        offset: u64,
        now: DateTime<Utc>,
    ) -> Result<String, CryptoError> {
        let iv = generate_iv(now);
        let aad = auth_data(app_id, offset);
        let mut sealed = self
            .aead
            .encrypt(
                Nonce::<U8>::from_slice(&iv),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::Seal)?;
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(format!(
            "{} {} {}\n",
            encode_iv(&iv),
            unpadded(&BASE64.encode(&tag)),
            unpadded(&BASE64.encode(&sealed)),
        ))
    }

    /// Decrypt a record line that claims to live at `(app_id, offset)`.
    pub fn decrypt(&self, line: &str, app_id: &str, offset: u64) -> Result<String, CryptoError> {
        let mut tokens = line.trim_end_matches('\n').splitn(3, ' ');
        let iv = tokens.next().ok_or(CryptoError::Malformed("missing iv"))?;
        let tag = tokens.next().ok_or(CryptoError::Malformed("missing tag"))?;
        let ciphertext = tokens
            .next()
            .ok_or(CryptoError::Malformed("missing ciphertext"))?;

        let iv = decode_iv(iv)?;
        let tag = BASE64
            .decode(padded(tag))
            .map_err(|_| CryptoError::Malformed("tag is not base64"))?;
        if tag.len() != TAG_LEN {
            return Err(CryptoError::Malformed("wrong tag length"));
        }
        let mut sealed = BASE64
            .decode(padded(ciphertext))
            .map_err(|_| CryptoError::Malformed("ciphertext is not base64"))?;
        sealed.extend_from_slice(&tag);

        let aad = auth_data(app_id, offset);
        let plaintext = self
            .aead
            .decrypt(
                Nonce::<U8>::from_slice(&iv),
                Payload {
                    msg: &sealed,
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::Auth)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Malformed("plaintext is not UTF-8"))
    }
}

/// The associated data a record is authenticated against.
fn auth_data(app_id: &str, offset: u64) -> String {
    format!("{} {}", app_id, offset)
}

/// Build a fresh IV from the wall clock: seconds and milliseconds in the
/// top 42 bits, 18 random bits, all shifted into the high 60 bits.
fn generate_iv(now: DateTime<Utc>) -> [u8; IV_LEN] {
    let sec = now.timestamp() as u64 & 0xffff_ffff;
    let msec = u64::from(now.timestamp_subsec_millis().min(999));
    let random = u64::from(OsRng.next_u32()) & 0x3ffff;

    let iv = ((sec << 28) | (msec << 18) | random) << 4;
    iv.to_be_bytes()
}

/// The 10 base64 characters covering the 60 significant IV bits. The low
/// nibble is always zero, so the truncation is lossless.
pub fn encode_iv(iv: &[u8; IV_LEN]) -> String {
    BASE64.encode(iv)[..ENCODED_IV_LEN].to_string()
}

/// Inverse of [`encode_iv`]: append `A=` to restore a full base64 group.
pub fn decode_iv(encoded: &str) -> Result<[u8; IV_LEN], CryptoError> {
    if encoded.len() != ENCODED_IV_LEN {
        return Err(CryptoError::Malformed("wrong iv length"));
    }
    let bytes = BASE64
        .decode(format!("{}A=", encoded))
        .map_err(|_| CryptoError::Malformed("iv is not base64"))?;
    bytes
        .try_into()
        .map_err(|_| CryptoError::Malformed("wrong iv length"))
}

/// Milliseconds since the epoch embedded in a record's IV. Requires no
/// key; used as the replay sort key.
pub fn extract_time_ms(line: &str) -> Result<u64, CryptoError> {
    let encoded = line
        .get(..ENCODED_IV_LEN)
        .ok_or(CryptoError::Malformed("record shorter than an iv"))?;
    let iv = u64::from_be_bytes(decode_iv(encoded)?);
    // drop the alignment nibble and the random bits
    let iv = iv >> 4 >> 18;
    let msec = iv & 0x3ff;
    let sec = iv >> 10;
    Ok(sec * 1000 + msec)
}

/// Embedded record time as fractional seconds.
pub fn extract_time(line: &str) -> Result<f64, CryptoError> {
    Ok(extract_time_ms(line)? as f64 / 1000.0)
}

fn unpadded(padded: &str) -> &str {
    padded.trim_end_matches('=')
}

fn padded(unpadded: &str) -> String {
    match unpadded.len() % 4 {
        0 => unpadded.to_string(),
        r => format!("{}{}", unpadded, "=".repeat(4 - r)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_iv_alignment() {
        for _ in 0..100 {
            let iv = u64::from_be_bytes(generate_iv(Utc::now()));
            assert_eq!(iv & 0xf, 0);
        }
    }

    #[test]
    fn test_iv_coding() {
        let iv = 0xb8e9_5aa4_fd6b_de80_u64.to_be_bytes();
        let encoded = encode_iv(&iv);
        assert_eq!(encoded, "uOlapP1r3o");
        assert_eq!(decode_iv(&encoded).unwrap(), iv);
    }

    #[test]
    fn test_extract_time() {
        let line = "VqdrlN+V/3 mkhjHvOytEUdD+eZwoVCFg kYAXsUr1x2m2";
        assert_eq!(extract_time_ms(line).unwrap(), 1_453_812_628_894);
        assert!((extract_time(line).unwrap() - 1_453_812_628.894).abs() < 1e-9);
    }

    #[test]
    fn test_extract_time_matches_encryption_clock() {
        let cipher = CommandCipher::new(&[7u8; 32]);
        let now = DateTime::from_timestamp(1_453_812_628, 894_000_000).unwrap();
        let record = cipher.encrypt_at("x", "ab", 0, now).unwrap();
        assert_eq!(extract_time_ms(&record).unwrap(), 1_453_812_628_894);
    }

    #[test]
    fn test_padding() {
        assert_eq!(padded(""), "");
        assert_eq!(padded("aa"), "aa==");
        assert_eq!(padded("aaa"), "aaa=");
        assert_eq!(padded("aaaa"), "aaaa");

        assert_eq!(unpadded(""), "");
        assert_eq!(unpadded("AA=="), "AA");
        assert_eq!(unpadded("AAA="), "AAA");
        assert_eq!(unpadded("AAAA"), "AAAA");
    }

    #[test]
    fn test_cipher_roundtrip() {
        let cipher = CommandCipher::new(&[b'x'; 32]);
        let record = cipher.encrypt("secret message", "ab", 489_174).unwrap();
        assert!(record.ends_with('\n'));
        assert_eq!(
            cipher.decrypt(&record, "ab", 489_174).unwrap(),
            "secret message"
        );
    }

    #[test]
    fn test_cipher_binds_replica_and_offset() {
        let cipher = CommandCipher::new(&[b'x'; 32]);
        let record = cipher.encrypt("secret message", "ab", 489_174).unwrap();

        assert_eq!(cipher.decrypt(&record, "ba", 489_174), Err(CryptoError::Auth));
        assert_eq!(cipher.decrypt(&record, "ab", 489_175), Err(CryptoError::Auth));
    }

    #[test]
    fn test_cipher_rejects_wrong_key() {
        let cipher = CommandCipher::new(&[b'x'; 32]);
        let mut other_key = [b'x'; 32];
        other_key[31] = b'y';
        let other = CommandCipher::new(&other_key);

        let record = cipher.encrypt("secret message", "ab", 0).unwrap();
        assert_eq!(other.decrypt(&record, "ab", 0), Err(CryptoError::Auth));
    }

    #[test]
    fn test_cipher_rejects_tampering() {
        let cipher = CommandCipher::new(&[b'x'; 32]);
        let record = cipher.encrypt("secret message", "ab", 0).unwrap();

        // flip one character in each of the iv, tag and ciphertext tokens
        for position in [4usize, 14, 44] {
            let mut tampered: Vec<char> = record.chars().collect();
            tampered[position] = if tampered[position] == 'x' { 'y' } else { 'x' };
            let tampered: String = tampered.into_iter().collect();
            assert!(cipher.decrypt(&tampered, "ab", 0).is_err());
        }
    }

    #[test]
    fn test_hash_password_is_stable() {
        assert_eq!(hash_password("pw"), hash_password("pw"));
        assert_ne!(hash_password("pw"), hash_password("pw2"));
    }
}
