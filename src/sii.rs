use crate::capabilities::CryptoSupport;
use std::{fs, path::Path};
use tracing::debug;

pub const SII_SIGNATURE_PLAIN: u32 = 0x4E69_6953; // "SiiN"
pub const SII_SIGNATURE_ENCRYPTED: u32 = 0x4373_6353; // "ScsC"

// signature(4) + hmac placeholder(32) + iv(16) + declared size(4)
#[cfg(feature = "crypto")]
const ENCRYPTED_HEADER_LEN: usize = 56;

pub const SII_KEY: [u8; 32] = [
    0x2A, 0x5F, 0xCB, 0x17, 0x91, 0xD2, 0x2F, 0xB6, 0x02, 0x45, 0xB3, 0xD8, 0x36, 0x9E, 0xD0,
    0xB2, 0xC2, 0x73, 0x71, 0x56, 0x3F, 0xBF, 0x1F, 0x3C, 0x9E, 0xDF, 0x6B, 0x11, 0x82, 0x5A,
    0x5D, 0x0A,
];

pub fn decode_file(path: &Path, crypto: CryptoSupport) -> Option<String> {
    // Without crypto support, read the raw bytes as text so plaintext
    // profiles still work.
    if crypto == CryptoSupport::Unavailable {
        return fs::read(path)
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
    }

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(path = %path.display(), %err, "failed to read SII file");
            return None;
        }
    };
    decode_bytes(&bytes)
}

pub fn decode_bytes(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 4 {
        return None;
    }
    let signature = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    match signature {
        SII_SIGNATURE_PLAIN => Some(String::from_utf8_lossy(&bytes[4..]).into_owned()),
        #[cfg(feature = "crypto")]
        SII_SIGNATURE_ENCRYPTED => decode_encrypted(bytes),
        #[cfg(not(feature = "crypto"))]
        SII_SIGNATURE_ENCRYPTED => None,
        other => {
            debug!(signature = format_args!("{other:#010x}"), "unknown SII signature");
            None
        }
    }
}

#[cfg(feature = "crypto")]
fn decode_encrypted(bytes: &[u8]) -> Option<String> {
    use std::io::Read;

    if bytes.len() < ENCRYPTED_HEADER_LEN {
        debug!("encrypted SII shorter than header");
        return None;
    }

    let mut iv = [0u8; 16];
    iv.copy_from_slice(&bytes[36..52]);
    let decrypted = cbc_decrypt(&SII_KEY, &iv, &bytes[ENCRYPTED_HEADER_LEN..]);

    // Payload is usually zlib-compressed; some profiles store it raw.
    let mut inflated = Vec::new();
    let mut decoder = flate2::read::ZlibDecoder::new(decrypted.as_slice());
    match decoder.read_to_end(&mut inflated) {
        Ok(_) => Some(String::from_utf8_lossy(&inflated).into_owned()),
        Err(_) => Some(String::from_utf8_lossy(&decrypted).into_owned()),
    }
}

#[cfg(feature = "crypto")]
fn cbc_decrypt(key: &[u8; 32], iv: &[u8; 16], data: &[u8]) -> Vec<u8> {
    use aes::cipher::{generic_array::GenericArray, BlockDecrypt, KeyInit};
    use aes::Aes256;

    let cipher = Aes256::new(&(*key).into());
    let mut prev = *iv;
    let mut out = Vec::with_capacity(data.len());
    // a trailing partial block is dropped, not rejected
    for chunk in data.chunks_exact(16) {
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.decrypt_block(&mut block);
        for (byte, prev_byte) in block.iter_mut().zip(prev.iter()) {
            *byte ^= prev_byte;
        }
        out.extend_from_slice(&block);
        prev.copy_from_slice(chunk);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_blob(text: &str) -> Vec<u8> {
        let mut blob = SII_SIGNATURE_PLAIN.to_le_bytes().to_vec();
        blob.extend_from_slice(text.as_bytes());
        blob
    }

    #[test]
    fn plaintext_signature_returns_following_text() {
        let text = "SiiNunit\n{\nactive_mods: 0\n}\n";
        assert_eq!(decode_bytes(&plain_blob(text)).as_deref(), Some(text));
    }

    #[test]
    fn too_short_input_is_rejected() {
        assert_eq!(decode_bytes(&[]), None);
        assert_eq!(decode_bytes(&[0x53, 0x69]), None);
    }

    #[test]
    fn unknown_signature_is_rejected() {
        assert_eq!(decode_bytes(b"XXXXwhatever"), None);
    }

    #[cfg(feature = "crypto")]
    mod encrypted {
        use super::super::*;
        use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
        use aes::Aes256;
        use flate2::{write::ZlibEncoder, Compression};
        use std::io::Write;

        fn cbc_encrypt(key: &[u8; 32], iv: &[u8; 16], payload: &[u8]) -> Vec<u8> {
            // PKCS#7 pad, then standard CBC chaining.
            let pad = 16 - payload.len() % 16;
            let mut padded = payload.to_vec();
            padded.extend(std::iter::repeat(pad as u8).take(pad));

            let cipher = Aes256::new(&(*key).into());
            let mut prev = *iv;
            let mut out = Vec::with_capacity(padded.len());
            for chunk in padded.chunks_exact(16) {
                let mut block = [0u8; 16];
                for (i, byte) in chunk.iter().enumerate() {
                    block[i] = *byte ^ prev[i];
                }
                let mut block = GenericArray::from(block);
                cipher.encrypt_block(&mut block);
                out.extend_from_slice(&block);
                prev.copy_from_slice(&block);
            }
            out
        }

        fn encrypted_blob(payload: &[u8], iv: &[u8; 16]) -> Vec<u8> {
            let ciphertext = cbc_encrypt(&SII_KEY, iv, payload);
            let mut blob = SII_SIGNATURE_ENCRYPTED.to_le_bytes().to_vec();
            blob.extend_from_slice(&[0u8; 32]);
            blob.extend_from_slice(iv);
            blob.extend_from_slice(&(ciphertext.len() as u32).to_le_bytes());
            blob.extend_from_slice(&ciphertext);
            blob
        }

        #[test]
        fn encrypted_shorter_than_header_is_rejected() {
            let mut blob = SII_SIGNATURE_ENCRYPTED.to_le_bytes().to_vec();
            blob.extend_from_slice(&[0u8; 40]);
            assert_eq!(decode_bytes(&blob), None);
        }

        #[test]
        fn round_trip_compressed_payload() {
            let text = "active_mods[0]: \"mod_a|Alpha\"\nactive_mods[1]: \"mod_b|Bravo\"\n";
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(text.as_bytes()).unwrap();
            let compressed = encoder.finish().unwrap();

            let iv = [0x42u8; 16];
            let decoded = decode_bytes(&encrypted_blob(&compressed, &iv)).unwrap();
            assert!(decoded.contains("Alpha"));
            assert!(decoded.contains("Bravo"));
        }

        #[test]
        fn uncompressed_payload_falls_back_to_raw_text() {
            let text = "SiiNunit { not compressed }";
            let iv = [0x07u8; 16];
            let decoded = decode_bytes(&encrypted_blob(text.as_bytes(), &iv)).unwrap();
            assert!(decoded.starts_with(text));
        }
    }
}
