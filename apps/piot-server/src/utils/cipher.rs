//! `/adapter` 加密请求体解密
//!
//! AES-128 逐块解密（无链接模式），末块去除 PKCS#7 填充。

use aes::Aes128;
use aes::cipher::{BlockDecrypt, KeyInit, generic_array::GenericArray};

pub const BLOCK_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("missing or wrong encryption configuration")]
    Config,
    #[error("invalid length of body for decryption")]
    Length,
    #[error("wrong PKCS#7 padding of encrypted content")]
    Padding,
}

/// 口令须恰好 16 字节。
pub fn decrypt_body(password: &str, body: &[u8]) -> Result<Vec<u8>, DecryptError> {
    let cipher = Aes128::new_from_slice(password.as_bytes()).map_err(|_| DecryptError::Config)?;
    if body.is_empty() || body.len() % BLOCK_SIZE != 0 {
        return Err(DecryptError::Length);
    }

    let mut plain = body.to_vec();
    for chunk in plain.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }
    let stripped = pkcs7_strip(&plain)?;
    plain.truncate(stripped);
    Ok(plain)
}

/// 返回去除填充后的长度。
fn pkcs7_strip(data: &[u8]) -> Result<usize, DecryptError> {
    let pad = *data.last().ok_or(DecryptError::Padding)? as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > data.len() {
        return Err(DecryptError::Padding);
    }
    let (rest, padding) = data.split_at(data.len() - pad);
    if padding.iter().any(|byte| *byte as usize != pad) {
        return Err(DecryptError::Padding);
    }
    Ok(rest.len())
}

#[cfg(test)]
pub(crate) fn encrypt_body(password: &str, plain: &[u8]) -> Vec<u8> {
    use aes::cipher::BlockEncrypt;

    let cipher = Aes128::new_from_slice(password.as_bytes()).expect("key");
    let pad = BLOCK_SIZE - plain.len() % BLOCK_SIZE;
    let mut data = plain.to_vec();
    data.extend(std::iter::repeat_n(pad as u8, pad));
    for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
    data
}
