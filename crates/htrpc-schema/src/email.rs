//! Address well-formedness check used by the `Email` validator.

const MAX_ADDRESS_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;
const MAX_LABEL_LEN: usize = 63;

/// Local-part characters allowed outside quotes.
const LOCAL_SPECIALS: &str = "!#$%&'*+/=?^_`{|}~-.";

/// Check `addr` is a plausible `local@domain` address.
///
/// The local part accepts dot-atoms (no leading, trailing or doubled dots).
/// The domain must have at least two labels of alphanumerics and inner
/// hyphens.
pub(crate) fn is_email(addr: &str) -> bool {
    if addr.len() > MAX_ADDRESS_LEN {
        return false;
    }
    let mut parts = addr.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => is_local_part(local) && is_domain(domain),
        _ => false,
    }
}

fn is_local_part(local: &str) -> bool {
    if local.is_empty() || local.len() > MAX_LOCAL_LEN {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || LOCAL_SPECIALS.contains(c))
}

fn is_domain(domain: &str) -> bool {
    domain.split('.').count() >= 2 && domain.split('.').all(is_label)
}

fn is_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
