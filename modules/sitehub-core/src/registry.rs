//! Credential → tenant resolution.

use sitehub_common::TenantRecord;

/// In-memory view of the tenant registry. Records are created by the
/// external registration process; this engine only reads them.
pub struct TenantRegistry {
    records: Vec<TenantRecord>,
}

impl TenantRegistry {
    pub fn new(records: Vec<TenantRecord>) -> Self {
        Self { records }
    }

    /// Look up a tenant by its opaque credential. A missing credential is a
    /// normal outcome, not an error; callers branch on `None`.
    pub fn resolve(&self, credential: &str) -> Option<&TenantRecord> {
        self.records
            .iter()
            .find(|record| constant_time_eq(record.credential.as_bytes(), credential.as_bytes()))
    }
}

/// Constant-time comparison to prevent timing attacks on credential guessing.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_exact_credential() {
        let registry = TenantRegistry::new(vec![
            TenantRecord::new("VL-TEST-0001", "https://example.com", "Example"),
            TenantRecord::new("VL-TEST-0002", "https://other.com", "Other"),
        ]);

        let tenant = registry.resolve("VL-TEST-0002").unwrap();
        assert_eq!(tenant.site_url, "https://other.com");
    }

    #[test]
    fn unknown_credential_resolves_to_none() {
        let registry = TenantRegistry::new(vec![TenantRecord::new(
            "VL-TEST-0001",
            "https://example.com",
            "Example",
        )]);

        assert!(registry.resolve("VL-TEST-9999").is_none());
        assert!(registry.resolve("").is_none());
        assert!(registry.resolve("VL-TEST-000").is_none());
    }

    #[test]
    fn constant_time_eq_matches_plain_equality() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
        assert!(constant_time_eq(b"", b""));
    }
}
