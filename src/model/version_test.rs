use super::Version;

#[test]
fn parse_accepts_digits_colon_digits() {
    let v = Version::parse("1441716120:345000000").unwrap();
    assert_eq!(v, Version::new(1441716120, 345000000));
    assert_eq!(v.to_string(), "1441716120:345000000");
}

#[test]
fn parse_rejects_malformed_versions() {
    for raw in ["", "12", "12:", ":12", "a:1", "1:b", "1:2:3", "-1:0", "1:1000000000", " 1:2"] {
        assert!(Version::parse(raw).is_err(), "{raw:?} should be rejected");
    }
}

#[test]
fn parse_keeps_components_within_range() {
    assert_eq!(Version::parse("0:999999999").unwrap(), Version::new(0, 999_999_999));
    assert_eq!(Version::parse("18446744073709551615:0").unwrap().seconds, u64::MAX);
    assert_eq!(Version::parse("007:01").unwrap(), Version::new(7, 1));

    // A nanosecond field of a full second or more would alias a later version
    assert!(Version::parse("1:1000000000").is_err());
    assert!(Version::parse("18446744073709551616:0").is_err());
}

#[test]
fn ordering_compares_seconds_before_nanoseconds() {
    let a = Version::new(10, 999_999_999);
    let b = Version::new(11, 0);
    assert!(a < b);
    assert!(Version::new(11, 1) > b);
    assert_eq!(Version::new(11, 0).cmp(&b), std::cmp::Ordering::Equal);
}

#[test]
fn ordering_is_numeric_not_textual() {
    // "9" sorts after "10" as text but not as a number
    assert!(Version::parse("9:0").unwrap() < Version::parse("10:0").unwrap());
    assert!(Version::parse("1:9").unwrap() < Version::parse("1:10").unwrap());
}

#[test]
fn succ_rolls_nanoseconds_into_seconds() {
    assert_eq!(Version::new(1, 5).succ(), Version::new(1, 6));
    assert_eq!(Version::new(1, 999_999_999).succ(), Version::new(2, 0));
}

#[test]
fn now_is_strictly_increasing_in_process() {
    let mut last = Version::now();
    for _ in 0..1000 {
        let next = Version::now();
        assert!(next > last);
        last = next;
    }
}

#[test]
fn serde_uses_the_string_form() {
    let v = Version::new(3, 4);
    assert_eq!(serde_json::to_value(v).unwrap(), serde_json::json!("3:4"));

    let back: Version = serde_json::from_value(serde_json::json!("3:4")).unwrap();
    assert_eq!(back, v);
    assert!(serde_json::from_value::<Version>(serde_json::json!("3-4")).is_err());
}
