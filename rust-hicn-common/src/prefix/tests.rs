//! Unit tests for name prefixes

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_prefix_parse_and_display() {
        let prefix: Prefix = "b001::/64".parse().unwrap();

        assert_eq!(prefix.len(), 64);
        assert!(!prefix.is_ipv4());
        assert_eq!(prefix.to_string(), "b001::/64");

        let v4: Prefix = "10.0.0.0/8".parse().unwrap();
        assert!(v4.is_ipv4());
        assert_eq!(v4.to_string(), "10.0.0.0/8");
    }

    #[test]
    fn test_prefix_masks_host_bits() {
        let a: Prefix = "b001::1234/64".parse().unwrap();
        let b: Prefix = "b001::/64".parse().unwrap();
        assert_eq!(a, b);

        let c: Prefix = "192.168.1.77/24".parse().unwrap();
        assert_eq!(c.to_string(), "192.168.1.0/24");

        let all: Prefix = "1.2.3.4/0".parse().unwrap();
        assert_eq!(all.to_string(), "0.0.0.0/0");
    }

    #[test]
    fn test_bare_address_is_host_prefix() {
        let host: Prefix = "b001::1".parse().unwrap();
        assert_eq!(host.len(), 128);
        assert_eq!(host.to_string(), "b001::1/128");
    }

    #[test]
    fn test_invalid_prefixes() {
        assert!("10.0.0.0/33".parse::<Prefix>().is_err());
        assert!("b001::/129".parse::<Prefix>().is_err());
        assert!("not-an-address/8".parse::<Prefix>().is_err());
        assert!("10.0.0.0/x".parse::<Prefix>().is_err());
    }

    #[test]
    fn test_prefix_containment() {
        let short: Prefix = "b001::/16".parse().unwrap();
        let long: Prefix = "b001:0:0:1::/64".parse().unwrap();
        let v4: Prefix = "10.0.0.0/8".parse().unwrap();

        assert!(short.is_prefix_of(&long));
        assert!(!long.is_prefix_of(&short));
        assert!(!v4.is_prefix_of(&long));
        assert!(v4.contains(&"10.1.2.3".parse().unwrap()));
        assert!(!v4.contains(&"11.1.2.3".parse().unwrap()));
    }

    #[test]
    fn test_prefix_tlv() {
        let prefix: Prefix = "b001::/64".parse().unwrap();
        let element = prefix.to_tlv();
        assert_eq!(element.tlv_type, tlv::TLV_PREFIX);
        assert_eq!(element.value.len(), 17);
        assert_eq!(Prefix::from_tlv(&element).unwrap(), prefix);

        let truncated = TlvElement::new(tlv::TLV_PREFIX, element.value.slice(..9));
        assert!(Prefix::from_tlv(&truncated).is_err());
    }
}
