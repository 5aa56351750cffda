/// Protocol version compatibility check.
///
/// Versions are `major.minor.patch` strings and are compatible iff they
/// share the major and minor components; patch is ignored. E.g. 2.18.5 is
/// compatible with 2.18.1 but not with 2.17.5 or 3.0.0. A malformed version
/// string is treated as incompatible rather than an error: corrupt input
/// from an untrusted client must not take the gate down.
pub fn is_protocol_version_compatible(client_version: &str, concent_version: &str) -> bool {
    match (
        split_major_minor(client_version),
        split_major_minor(concent_version),
    ) {
        (Some((client_major, client_minor)), Some((concent_major, concent_minor))) => {
            client_major == concent_major && client_minor == concent_minor
        }
        _ => false,
    }
}

/// Version gate over an optional client declaration.
///
/// A client that does not declare a version is assumed compatible; older
/// clients predate the version header.
pub fn is_declared_version_supported(declared: Option<&str>, concent_version: &str) -> bool {
    match declared {
        None => true,
        Some(version) => is_protocol_version_compatible(version, concent_version),
    }
}

fn split_major_minor(version: &str) -> Option<(&str, &str)> {
    let mut parts = version.split('.');
    let major = parts.next()?;
    let minor = parts.next()?;
    parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_is_ignored() {
        assert!(is_protocol_version_compatible("2.18.5", "2.18.1"));
    }

    #[test]
    fn test_minor_must_match() {
        assert!(!is_protocol_version_compatible("2.18.5", "2.17.5"));
    }

    #[test]
    fn test_major_must_match() {
        assert!(!is_protocol_version_compatible("3.0.0", "2.18.1"));
    }

    #[test]
    fn test_malformed_versions_are_incompatible() {
        assert!(!is_protocol_version_compatible("2.18", "2.18.1"));
        assert!(!is_protocol_version_compatible("2.18.1.4", "2.18.1"));
        assert!(!is_protocol_version_compatible("", "2.18.1"));
    }

    #[test]
    fn test_missing_declaration_is_permissive() {
        assert!(is_declared_version_supported(None, "2.18.1"));
        assert!(is_declared_version_supported(Some("2.18.5"), "2.18.1"));
        assert!(!is_declared_version_supported(Some("2.17.5"), "2.18.1"));
    }
}
