/// Email-domain helpers for internal/external recipient classification

/// Extract the domain part of an email address, lower-cased
pub fn extract_domain(email: &str) -> Option<String> {
    email.rsplit('@').next().filter(|d| *d != email).map(|d| d.to_lowercase())
}

/// An address is internal iff its domain equals the organization domain
/// (case-insensitive). Addresses without a domain are external.
pub fn is_internal(email: &str, organization_domain: &str) -> bool {
    match extract_domain(email) {
        Some(domain) => domain == organization_domain.to_lowercase(),
        None => false,
    }
}
