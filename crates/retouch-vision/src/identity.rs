//! 콘텐츠 식별자.
//!
//! 정규화된 이미지 바이트와 지시문 텍스트의 SHA-256 해시(16진수, 앞 16자)로
//! 캐시 키를 만든다. 파일명/메타데이터와 무관하게 바이트만으로 결정된다.

use retouch_core::models::cache::CacheKey;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// 식별자 길이 (16진수 문자 수, 64비트)
pub const IDENTITY_HEX_LEN: usize = 16;

fn truncated_hex(digest: &[u8]) -> String {
    let mut out = String::with_capacity(IDENTITY_HEX_LEN);
    for byte in digest.iter().take(IDENTITY_HEX_LEN / 2) {
        // String에 대한 write!는 실패하지 않음
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// 이미지 바이트의 콘텐츠 식별자
pub fn content_identity(bytes: &[u8]) -> String {
    truncated_hex(&Sha256::digest(bytes))
}

/// 지시문 텍스트 해시
pub fn prompt_hash(instruction: &str) -> String {
    truncated_hex(&Sha256::digest(instruction.as_bytes()))
}

/// (정규화 이미지, 지시문) 캐시 키
pub fn cache_key(normalized_bytes: &[u8], instruction: &str) -> CacheKey {
    CacheKey {
        image_identity: content_identity(normalized_bytes),
        prompt_hash: prompt_hash(instruction),
    }
}
