//! Frame kinds carried in the header.

/// A request envelope travelling client to server.
pub const REQUEST: u16 = 1;

/// A response envelope travelling server to client.
pub const RESPONSE: u16 = 2;

/// Returns a human-readable name for a frame kind.
pub fn kind_name(kind: u16) -> &'static str {
    match kind {
        REQUEST => "REQUEST",
        RESPONSE => "RESPONSE",
        _ => "UNKNOWN",
    }
}

/// Returns true if the kind is one this protocol defines.
pub fn is_known(kind: u16) -> bool {
    matches!(kind, REQUEST | RESPONSE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_known_kinds() {
        assert_eq!(kind_name(REQUEST), "REQUEST");
        assert_eq!(kind_name(RESPONSE), "RESPONSE");
        assert_eq!(kind_name(0), "UNKNOWN");
        assert!(is_known(REQUEST));
        assert!(!is_known(7));
    }
}
