//! Deterministic fingerprints for audit correlation.

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::domain::PaymentRequest;

/// Stable hex digest of a payment request's identifying fields.
///
/// Logged with every saga step and attached to alerts so operators can
/// correlate records across the ledger, the approval queue, and the chain.
pub fn request_fingerprint(request: &PaymentRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.request_id.as_bytes());
    hasher.update(request.requester_id.as_bytes());
    hasher.update(request.vendor_identifier.as_bytes());
    hasher.update(request.amount.to_string().as_bytes());
    hasher.update(request.currency.as_bytes());
    hex_digest(hasher)
}

/// Deterministic pseudo transaction hash for simulated broadcasts.
pub fn pseudo_reference(to: &str, amount: Decimal, sequence: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(to.as_bytes());
    hasher.update(amount.to_string().as_bytes());
    hasher.update(sequence.to_be_bytes());
    format!("0x{}", hex_digest(hasher))
}

fn hex_digest(hasher: Sha256) -> String {
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fingerprint_is_deterministic_per_request() {
        let request = PaymentRequest::new("cfo", "acme", dec!(45), "MNEE");
        assert_eq!(request_fingerprint(&request), request_fingerprint(&request));

        let other = PaymentRequest::new("cfo", "acme", dec!(45), "MNEE");
        assert_ne!(request_fingerprint(&request), request_fingerprint(&other));
    }

    #[test]
    fn pseudo_reference_varies_with_sequence() {
        let a = pseudo_reference("0xabc", dec!(45), 7);
        let b = pseudo_reference("0xabc", dec!(45), 8);
        assert_ne!(a, b);
        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 66);
    }
}
