use subtle::ConstantTimeEq;

/// Constant-time string comparison to prevent timing attacks.
/// Used for checking the `X-API-Key` header against the configured key.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
