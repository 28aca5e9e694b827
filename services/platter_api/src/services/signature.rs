// services/platter_api/src/services/signature.rs

//! HMAC-SHA256 signatures used by the gateway: payment receipts sign
//! `"{order_id}|{payment_id}"`, webhooks sign the exact raw body.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
  #[error("signature is missing")]
  Missing,
  #[error("signature is not a hex-encoded SHA-256 MAC")]
  Malformed,
  #[error("signature does not match")]
  Mismatch,
  #[error("signing key rejected")]
  InvalidKey,
}

fn keyed(secret: &str) -> Result<HmacSha256, SignatureError> {
  HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)
}

fn payment_message(order_id: &str, payment_id: &str) -> String {
  format!("{}|{}", order_id, payment_id)
}

pub fn payment_signature(secret: &str, order_id: &str, payment_id: &str) -> Result<String, SignatureError> {
  let mut mac = keyed(secret)?;
  mac.update(payment_message(order_id, payment_id).as_bytes());
  Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn webhook_signature(secret: &str, raw_body: &[u8]) -> Result<String, SignatureError> {
  let mut mac = keyed(secret)?;
  mac.update(raw_body);
  Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_payment_signature(
  secret: &str,
  order_id: &str,
  payment_id: &str,
  provided: &str,
) -> Result<(), SignatureError> {
  let mut mac = keyed(secret)?;
  mac.update(payment_message(order_id, payment_id).as_bytes());
  check(mac, provided)
}

pub fn verify_webhook_signature(secret: &str, raw_body: &[u8], provided: &str) -> Result<(), SignatureError> {
  let mut mac = keyed(secret)?;
  mac.update(raw_body);
  check(mac, provided)
}

/// Constant-time comparison through `verify_slice`.
fn check(mac: HmacSha256, provided: &str) -> Result<(), SignatureError> {
  if provided.is_empty() {
    return Err(SignatureError::Missing);
  }
  let bytes = hex::decode(provided).map_err(|_| SignatureError::Malformed)?;
  if bytes.len() != SIGNATURE_LEN {
    return Err(SignatureError::Malformed);
  }
  mac.verify_slice(&bytes).map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
  use super::*;

  const SECRET: &str = "key_secret";

  fn flip_char(s: &str, idx: usize) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    chars[idx] = if chars[idx] == '0' { '1' } else { '0' };
    chars.into_iter().collect()
  }

  #[test]
  fn accepts_matching_payment_signature() {
    let sig = payment_signature(SECRET, "order_1", "pay_1").unwrap();
    assert_eq!(sig.len(), 64);
    assert_eq!(verify_payment_signature(SECRET, "order_1", "pay_1", &sig), Ok(()));
  }

  #[test]
  fn any_flipped_signature_char_is_rejected() {
    let sig = payment_signature(SECRET, "order_1", "pay_1").unwrap();
    for idx in 0..sig.len() {
      let tampered = flip_char(&sig, idx);
      assert_eq!(
        verify_payment_signature(SECRET, "order_1", "pay_1", &tampered),
        Err(SignatureError::Mismatch),
        "flip at {}",
        idx
      );
    }
  }

  #[test]
  fn rejects_empty_and_wrong_length_signatures() {
    let sig = payment_signature(SECRET, "order_1", "pay_1").unwrap();
    assert_eq!(
      verify_payment_signature(SECRET, "order_1", "pay_1", ""),
      Err(SignatureError::Missing)
    );
    assert_eq!(
      verify_payment_signature(SECRET, "order_1", "pay_1", &sig[..62]),
      Err(SignatureError::Malformed)
    );
    assert_eq!(
      verify_payment_signature(SECRET, "order_1", "pay_1", &format!("{}00", sig)),
      Err(SignatureError::Malformed)
    );
    assert_eq!(
      verify_payment_signature(SECRET, "order_1", "pay_1", "zz"),
      Err(SignatureError::Malformed)
    );
  }

  #[test]
  fn signature_binds_both_identifiers_and_secret() {
    let sig = payment_signature(SECRET, "order_1", "pay_1").unwrap();
    assert!(verify_payment_signature(SECRET, "order_1", "pay_2", &sig).is_err());
    assert!(verify_payment_signature(SECRET, "order_2", "pay_1", &sig).is_err());
    assert!(verify_payment_signature("other_secret", "order_1", "pay_1", &sig).is_err());
  }

  #[test]
  fn webhook_signature_covers_every_body_byte() {
    let body = br#"{"event":"refund.processed","payload":{}}"#.to_vec();
    let sig = webhook_signature("whsec", &body).unwrap();
    assert_eq!(verify_webhook_signature("whsec", &body, &sig), Ok(()));

    for idx in 0..body.len() {
      let mut tampered = body.clone();
      tampered[idx] ^= 0x01;
      assert_eq!(
        verify_webhook_signature("whsec", &tampered, &sig),
        Err(SignatureError::Mismatch)
      );
    }
    assert!(verify_webhook_signature("whsec", b"", &sig).is_err());
  }
}
