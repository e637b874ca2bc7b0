//! Port descriptor comparisons.

use netalloc_types::{Endpoint, EndpointSpec, PortConfig};

/// Returns true if every field of the two descriptors except the published
/// port agrees.
///
/// Two absent descriptors are equal; an absent and a present one are not.
pub fn ports_mostly_equal(some: Option<&PortConfig>, other: Option<&PortConfig>) -> bool {
    match (some, other) {
        (None, None) => true,
        (Some(some), Some(other)) => {
            some.name == other.name
                && some.target_port == other.target_port
                && some.protocol == other.protocol
                && some.publish_mode == other.publish_mode
        }
        _ => false,
    }
}

/// Returns true if the descriptors are mostly equal and share the same
/// published port.
pub fn ports_equal(some: Option<&PortConfig>, other: Option<&PortConfig>) -> bool {
    ports_mostly_equal(some, other)
        && some.map(|p| p.published_port) == other.map(|p| p.published_port)
}

/// Returns true if `endpoint` already reflects `spec`, in which case the
/// caller can skip calling allocate.
///
/// The comparison is made against the spec stored on the endpoint, which
/// always matches its realized ports. Order of descriptors is ignored.
pub fn already_allocated(endpoint: Option<&Endpoint>, spec: Option<&EndpointSpec>) -> bool {
    let endpoint = match (endpoint, spec) {
        (None, None) => return true,
        (None, Some(_)) => return false,
        (Some(endpoint), _) => endpoint,
    };

    // never allocated against any spec
    if endpoint.spec.is_none() && spec.is_some() {
        return false;
    }

    let current: &[PortConfig] = endpoint
        .spec
        .as_ref()
        .map(|s| s.ports.as_slice())
        .unwrap_or(&[]);
    let wanted: &[PortConfig] = spec.map(|s| s.ports.as_slice()).unwrap_or(&[]);

    // spec removed while ports are still held: deallocation pending
    if spec.is_none() && !current.is_empty() {
        return false;
    }

    if current.len() != wanted.len() {
        return false;
    }

    current
        .iter()
        .all(|port| wanted.iter().any(|w| ports_equal(Some(port), Some(w))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use netalloc_types::Protocol;

    fn web() -> PortConfig {
        PortConfig::new("web", Protocol::Tcp, 80)
    }

    fn dns() -> PortConfig {
        PortConfig::new("dns", Protocol::Udp, 53)
    }

    #[test]
    fn test_mostly_equal_ignores_published_port() {
        let a = web().published(8080);
        let b = web().published(30001);
        assert!(ports_mostly_equal(Some(&a), Some(&b)));
        assert!(!ports_equal(Some(&a), Some(&b)));
        assert!(ports_equal(Some(&a), Some(&a.clone())));
    }

    #[test]
    fn test_mostly_equal_field_mismatch() {
        let base = web();

        let mut renamed = web();
        renamed.name = "http".to_string();
        assert!(!ports_mostly_equal(Some(&base), Some(&renamed)));

        let mut retargeted = web();
        retargeted.target_port = 81;
        assert!(!ports_mostly_equal(Some(&base), Some(&retargeted)));

        let mut udp = web();
        udp.protocol = Protocol::Udp;
        assert!(!ports_mostly_equal(Some(&base), Some(&udp)));

        assert!(!ports_mostly_equal(Some(&base), Some(&web().host_mode())));
    }

    #[test]
    fn test_mostly_equal_absent() {
        assert!(ports_mostly_equal(None, None));
        assert!(ports_equal(None, None));
        assert!(!ports_mostly_equal(Some(&web()), None));
        assert!(!ports_mostly_equal(None, Some(&web())));
    }

    #[test]
    fn test_already_allocated_absent_combinations() {
        let spec = EndpointSpec::new(vec![web()]);

        assert!(already_allocated(None, None));
        assert!(!already_allocated(None, Some(&spec)));

        let unallocated = Endpoint::new();
        assert!(!already_allocated(Some(&unallocated), Some(&spec)));
        assert!(already_allocated(Some(&unallocated), None));

        let allocated =
            Endpoint::allocated(Some(spec.clone()), vec![web().published(30000)]);
        assert!(!already_allocated(Some(&allocated), None));

        let empty = Endpoint::allocated(Some(EndpointSpec::default()), vec![]);
        assert!(already_allocated(Some(&empty), None));
    }

    #[test]
    fn test_already_allocated_ignores_order() {
        let stored = EndpointSpec::new(vec![web(), dns().published(5353)]);
        let endpoint = Endpoint::allocated(Some(stored), vec![]);

        let reordered = EndpointSpec::new(vec![dns().published(5353), web()]);
        assert!(already_allocated(Some(&endpoint), Some(&reordered)));
    }

    #[test]
    fn test_already_allocated_detects_changes() {
        let stored = EndpointSpec::new(vec![web(), dns()]);
        let endpoint = Endpoint::allocated(Some(stored), vec![]);

        let fewer = EndpointSpec::new(vec![web()]);
        assert!(!already_allocated(Some(&endpoint), Some(&fewer)));

        let republished = EndpointSpec::new(vec![web().published(8080), dns()]);
        assert!(!already_allocated(Some(&endpoint), Some(&republished)));

        let renamed = EndpointSpec::new(vec![web(), PortConfig::new("mdns", Protocol::Udp, 53)]);
        assert!(!already_allocated(Some(&endpoint), Some(&renamed)));
    }
}
