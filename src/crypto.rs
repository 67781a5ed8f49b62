//! CryptoJS-compatible AES helpers.
//!
//! Embed players encrypt their source payloads with CryptoJS defaults:
//! AES-CBC with PKCS#7 padding and base64 transport. Keys are either raw
//! bytes (16/24/32 long, selecting AES-128/192/256) or an OpenSSL-style
//! passphrase with a `Salted__` header.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{ExtractError, Result};

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

const SALT_HEADER: &[u8] = b"Salted__";

fn crypto_err<E: std::fmt::Display>(e: E) -> ExtractError {
    ExtractError::Crypto(e.to_string())
}

/// AES-CBC decrypt with PKCS#7 unpadding.
pub fn decrypt_cbc(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(crypto_err)?
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .map_err(crypto_err),
        24 => Aes192CbcDec::new_from_slices(key, iv)
            .map_err(crypto_err)?
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .map_err(crypto_err),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(crypto_err)?
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .map_err(crypto_err),
        n => Err(ExtractError::Crypto(format!("unsupported key length {n}"))),
    }
}

/// AES-CBC encrypt with PKCS#7 padding.
pub fn encrypt_cbc(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    match key.len() {
        16 => Ok(Aes128CbcEnc::new_from_slices(key, iv)
            .map_err(crypto_err)?
            .encrypt_padded_vec_mut::<Pkcs7>(data)),
        24 => Ok(Aes192CbcEnc::new_from_slices(key, iv)
            .map_err(crypto_err)?
            .encrypt_padded_vec_mut::<Pkcs7>(data)),
        32 => Ok(Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(crypto_err)?
            .encrypt_padded_vec_mut::<Pkcs7>(data)),
        n => Err(ExtractError::Crypto(format!("unsupported key length {n}"))),
    }
}

/// `CryptoJS.AES.decrypt(b64, Utf8.parse(key), {iv: Utf8.parse(iv)})`
/// rendered as UTF-8.
pub fn decrypt_base64(key: &str, iv: &str, b64: &str) -> Result<String> {
    let data = STANDARD.decode(b64.trim()).map_err(crypto_err)?;
    let plain = decrypt_cbc(key.as_bytes(), iv.as_bytes(), &data)?;
    String::from_utf8(plain).map_err(crypto_err)
}

/// `CryptoJS.AES.encrypt(text, Utf8.parse(key), {iv: Utf8.parse(iv)}).toString()`
pub fn encrypt_base64(key: &str, iv: &str, text: &str) -> Result<String> {
    let data = encrypt_cbc(key.as_bytes(), iv.as_bytes(), text.as_bytes())?;
    Ok(STANDARD.encode(data))
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single iteration.
pub fn evp_bytes_to_key(passphrase: &[u8], salt: &[u8], key_len: usize, iv_len: usize) -> (Vec<u8>, Vec<u8>) {
    let mut derived = Vec::with_capacity(key_len + iv_len + 16);
    let mut block: Vec<u8> = Vec::new();
    while derived.len() < key_len + iv_len {
        let mut input = block.clone();
        input.extend_from_slice(passphrase);
        input.extend_from_slice(salt);
        block = md5::compute(&input).0.to_vec();
        derived.extend_from_slice(&block);
    }
    let iv = derived[key_len..key_len + iv_len].to_vec();
    derived.truncate(key_len);
    (derived, iv)
}

/// `CryptoJS.AES.decrypt(b64, "passphrase")`: `Salted__` + 8-byte salt +
/// ciphertext, AES-256 key and IV derived from the passphrase.
pub fn decrypt_passphrase(b64: &str, passphrase: &[u8]) -> Result<String> {
    let data = STANDARD.decode(b64.trim()).map_err(crypto_err)?;
    if data.len() < 16 || !data.starts_with(SALT_HEADER) {
        return Err(ExtractError::Crypto("missing Salted__ header".into()));
    }
    let (key, iv) = evp_bytes_to_key(passphrase, &data[8..16], 32, 16);
    let plain = decrypt_cbc(&key, &iv, &data[16..])?;
    String::from_utf8(plain).map_err(crypto_err)
}
