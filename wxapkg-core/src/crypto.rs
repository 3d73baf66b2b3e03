//! Key derivation (C1) and decryption (C2) for `.wxapkg` archives.
//!
//! The scheme is two-stage: the first 1024 bytes after a 6-byte preamble
//! are AES-256-CBC encrypted (unpadded), everything after that is XOR'd
//! with a single byte derived from the identifier.

use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use hmac::Hmac;
use sha1::Sha1;

use crate::error::{Result, WxapkgError};

pub const SALT: &[u8] = b"saltiest";
pub const IV: &[u8; 16] = b"the iv: 16 bytes";
pub const PBKDF2_ITERATIONS: u32 = 1000;
pub const KEY_LEN: usize = 32;
pub const HEADER_PREAMBLE: usize = 6;
pub const HEADER_BLOCK: usize = 1024;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// C1: derive a 32-byte key from the identifier via PBKDF2-HMAC-SHA1.
pub fn derive_key(identifier: &str) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha1>>(
        identifier.as_bytes(),
        SALT,
        PBKDF2_ITERATIONS,
        &mut key,
    )
    .expect("HMAC can be initialised with any key length");
    key
}

/// The byte used to XOR-mask everything after the AES-CBC header: the
/// penultimate character of the identifier, taken as an 8-bit value.
pub fn xor_mask(identifier: &str) -> Result<u8> {
    let chars: Vec<char> = identifier.chars().collect();
    if chars.len() < 2 {
        return Err(WxapkgError::BadIdentifier(identifier.to_string()));
    }
    Ok(chars[chars.len() - 2] as u8)
}

/// C2: decrypt a whole archive buffer into the plaintext container.
///
/// `archive` is the raw file contents. Returns the reconstructed plaintext
/// per §4.2: the first 1023 of the 1024 AES-CBC-decrypted header bytes,
/// followed by the XOR-decrypted tail. The dropped 1024th header byte is a
/// documented quirk of the original format, preserved here for bit-exact
/// compatibility (see DESIGN.md).
pub fn decrypt(identifier: &str, archive: &[u8]) -> Result<Vec<u8>> {
    let needed = HEADER_PREAMBLE + HEADER_BLOCK;
    if archive.len() < needed {
        return Err(WxapkgError::ArchiveTooShort {
            needed,
            got: archive.len(),
        });
    }

    let key = derive_key(identifier);
    let mask = xor_mask(identifier)?;

    let mut header = archive[HEADER_PREAMBLE..needed].to_vec();
    let decryptor = Aes256CbcDec::new(&key.into(), IV.into());
    let decrypted_header = decryptor
        .decrypt_padded_mut::<NoPadding>(&mut header)
        .map_err(|_| WxapkgError::ArchiveTooShort { needed, got: archive.len() })?;

    let mut plaintext = Vec::with_capacity(HEADER_BLOCK - 1 + archive.len() - needed);
    plaintext.extend_from_slice(&decrypted_header[..HEADER_BLOCK - 1]);
    plaintext.extend(archive[needed..].iter().map(|b| b ^ mask));

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_mask_is_the_penultimate_char() {
        assert_eq!(xor_mask("wx0123456789abcdef").unwrap(), b'e');
    }

    #[test]
    fn xor_mask_rejects_short_identifiers() {
        assert!(xor_mask("w").is_err());
        assert!(xor_mask("").is_err());
    }

    #[test]
    fn xor_mask_unaffected_by_other_characters() {
        let a = xor_mask("wx0123456789abcdef").unwrap();
        let b = xor_mask("zz0123456789abcdef").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn derive_key_changes_with_identifier() {
        let k1 = derive_key("wx0123456789abcdef");
        let k2 = derive_key("wx0123456789abcdeg");
        assert_ne!(k1, k2);
        assert_eq!(k1.len(), KEY_LEN);
    }

    #[test]
    fn decrypt_rejects_short_archives() {
        let err = decrypt("wx0123456789abcdef", &[0u8; 10]).unwrap_err();
        assert!(matches!(err, WxapkgError::ArchiveTooShort { .. }));
    }

    fn aes_encrypt_header(key: &[u8; KEY_LEN], plaintext_header: &[u8; HEADER_BLOCK]) -> Vec<u8> {
        use cbc::cipher::BlockEncryptMut;
        let mut buf = *plaintext_header;
        let encryptor = cbc::Encryptor::<aes::Aes256>::new(key.into(), IV.into());
        encryptor
            .encrypt_padded_mut::<NoPadding>(&mut buf, HEADER_BLOCK)
            .unwrap();
        buf.to_vec()
    }

    #[test]
    fn decrypt_round_trips_header_and_xors_tail() {
        let id = "wx0123456789abcdef";
        let key = derive_key(id);
        let mask = xor_mask(id).unwrap();

        let mut header = [0u8; HEADER_BLOCK];
        for (i, b) in header.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let ciphertext = aes_encrypt_header(&key, &header);

        let tail_plain = vec![7u8, 8, 9, 10];
        let tail_cipher: Vec<u8> = tail_plain.iter().map(|b| b ^ mask).collect();

        let mut archive = vec![0u8; HEADER_PREAMBLE];
        archive.extend_from_slice(&ciphertext);
        archive.extend_from_slice(&tail_cipher);

        let plaintext = decrypt(id, &archive).unwrap();
        assert_eq!(&plaintext[..HEADER_BLOCK - 1], &header[..HEADER_BLOCK - 1]);
        assert_eq!(&plaintext[HEADER_BLOCK - 1..], tail_plain.as_slice());
    }
}
