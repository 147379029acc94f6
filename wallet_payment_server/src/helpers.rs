use std::fmt::Write as _;

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// The HMAC-SHA256 of the raw request body, hex-encoded. This is what the gateway puts in the `verif-hash` header.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data);
    let digest = mac.finalize().into_bytes();
    digest.iter().fold(String::with_capacity(2 * digest.len()), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_hmac_vector() {
        // RFC 4231 test case 2.
        let mac = calculate_hmac("Jefe", b"what do ya want for nothing?");
        assert_eq!(mac, "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843");
    }

    #[test]
    fn different_secrets_disagree() {
        let body = br#"{"event":"charge.completed","data":{}}"#;
        assert_ne!(calculate_hmac("secret-a", body), calculate_hmac("secret-b", body));
    }

    #[test]
    fn a_single_flipped_byte_changes_the_signature() {
        let mac_a = calculate_hmac("s", b"amount=5000");
        let mac_b = calculate_hmac("s", b"amount=5001");
        assert_ne!(mac_a, mac_b);
    }
}
