// services/platter_api/src/services/otp.rs

use rand::Rng;

/// Six-digit handoff code, leading zeros kept.
pub fn generate_delivery_otp() -> String {
  let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
  format!("{:06}", code)
}
