//! End-to-end evaluation semantics against JSON observable records.

use serde_json::{json, Value};
use stix_pattern::{evaluate, matching_records};

fn file_record() -> Value {
    json!({
        "type": "file",
        "name": "malware.exe",
        "size": 4096,
        "hashes": {
            "SHA-256": "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            "MD5": "d41d8cd98f00b204e9800998ecf8427e"
        },
        "created": "2020-06-01T12:00:00Z"
    })
}

#[test]
fn equality_on_a_simple_field() {
    let record = json!({"type": "file", "name": "a.exe"});
    assert!(evaluate("[file:name = 'a.exe']", &record));
    assert!(!evaluate("[file:name = 'b.exe']", &record));
}

#[test]
fn not_prefix_inverts_each_comparison() {
    let record = file_record();
    let cases = [
        "file:name = 'malware.exe'",
        "file:name = 'other.exe'",
        "file:size > 100",
        "file:size < 100",
        "file:name LIKE 'mal%'",
        "file:name IN ('a.exe', 'malware.exe')",
        "file:hashes.'SHA-256' EXISTS",
    ];
    for comparison in cases {
        let plain = format!("[{}]", comparison);
        let negated = format!("[NOT {}]", comparison);
        assert_eq!(
            evaluate(&negated, &record),
            !evaluate(&plain, &record),
            "negation law failed for {:?}",
            comparison
        );
    }
}

#[test]
fn like_is_full_string_wildcard_match() {
    assert!(evaluate(
        "[file:name LIKE 'mal%']",
        &json!({"type": "file", "name": "malware.exe"})
    ));
    assert!(!evaluate(
        "[file:name LIKE 'mal%']",
        &json!({"type": "file", "name": "good.exe"})
    ));
    // '%' is required even for suffix context: LIKE is not substring
    assert!(!evaluate(
        "[file:name LIKE 'ware']",
        &json!({"type": "file", "name": "malware.exe"})
    ));
    assert!(evaluate(
        "[file:name LIKE '_alware.exe']",
        &json!({"type": "file", "name": "malware.exe"})
    ));
}

#[test]
fn conjunction_inside_an_observation() {
    let pattern = "[file:name = 'a.exe' AND file:size > 100]";
    assert!(evaluate(
        pattern,
        &json!({"type": "file", "name": "a.exe", "size": 200})
    ));
    assert!(!evaluate(
        pattern,
        &json!({"type": "file", "name": "a.exe", "size": 50})
    ));
}

#[test]
fn disjunction_inside_an_observation() {
    let pattern = "[file:name = 'a.exe' OR file:size > 100]";
    assert!(evaluate(
        pattern,
        &json!({"type": "file", "name": "b.exe", "size": 200})
    ));
    assert!(!evaluate(
        pattern,
        &json!({"type": "file", "name": "b.exe", "size": 50})
    ));
}

#[test]
fn in_checks_set_membership() {
    let record = file_record();
    assert!(evaluate(
        "[file:name IN ('a.exe', 'malware.exe', 'b.exe')]",
        &record
    ));
    assert!(!evaluate("[file:name IN ('a.exe', 'b.exe')]", &record));
    assert!(evaluate("[file:size IN (1024, 4096)]", &record));
}

#[test]
fn matches_applies_an_anchored_regex() {
    let record = file_record();
    assert!(evaluate("[file:name MATCHES '[a-z]+\\\\.exe']", &record));
    assert!(!evaluate("[file:name MATCHES 'mal']", &record));
}

#[test]
fn quoted_key_path_resolution() {
    let record = file_record();
    assert!(evaluate(
        "[file:hashes.'SHA-256' = 'e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855']",
        &record
    ));
    assert!(!evaluate("[file:hashes.'SHA-1' EXISTS]", &record));
}

#[test]
fn wildcard_index_matches_any_element() {
    let record = json!({
        "type": "network-traffic",
        "dst_port": 443,
        "protocols": ["ipv4", "tcp", "https"]
    });
    assert!(evaluate("[network-traffic:protocols[*] = 'tcp']", &record));
    assert!(!evaluate("[network-traffic:protocols[*] = 'smtp']", &record));
    assert!(evaluate("[network-traffic:protocols[1] = 'tcp']", &record));
    assert!(!evaluate("[network-traffic:protocols[0] = 'tcp']", &record));
}

#[test]
fn temporal_ordering_on_timestamp_fields() {
    let record = file_record();
    assert!(evaluate(
        "[file:created > t'2020-01-01T00:00:00Z']",
        &record
    ));
    assert!(!evaluate(
        "[file:created > t'2021-01-01T00:00:00Z']",
        &record
    ));
    assert!(evaluate(
        "[file:created = t'2020-06-01T12:00:00.000Z']",
        &record
    ));
}

#[test]
fn ordering_against_absent_or_unordered_values_is_false() {
    let record = file_record();
    // absent property
    assert!(!evaluate("[file:missing > 100]", &record));
    // string value vs numeric literal
    assert!(!evaluate("[file:name > 100]", &record));
}

#[test]
fn exists_tests_path_presence() {
    let record = file_record();
    assert!(evaluate("[file:hashes.MD5 EXISTS]", &record));
    assert!(!evaluate("[file:parent_directory_ref EXISTS]", &record));
    assert!(evaluate("[NOT file:parent_directory_ref EXISTS]", &record));
}

#[test]
fn issubset_and_issuperset_treat_operands_as_scalar_sets() {
    let record = json!({
        "type": "network-traffic",
        "protocols": ["tcp", "https"]
    });
    assert!(evaluate(
        "[network-traffic:protocols ISSUBSET ('ipv4', 'tcp', 'https')]",
        &record
    ));
    assert!(!evaluate(
        "[network-traffic:protocols ISSUBSET ('ipv4', 'tcp')]",
        &record
    ));
    assert!(evaluate(
        "[network-traffic:protocols ISSUPERSET ('tcp')]",
        &record
    ));
    assert!(evaluate(
        "[network-traffic:protocols ISSUPERSET 'tcp']",
        &record
    ));
    assert!(!evaluate(
        "[network-traffic:protocols ISSUPERSET ('tcp', 'smtp')]",
        &record
    ));
}

#[test]
fn observation_against_wrong_record_type_does_not_match() {
    let record = json!({"type": "process", "name": "cmd.exe"});
    assert!(!evaluate("[file:name = 'cmd.exe']", &record));
    assert!(evaluate("[process:name = 'cmd.exe']", &record));
}

#[test]
fn followedby_requires_both_sides_on_a_single_record() {
    let record = file_record();
    assert!(evaluate(
        "[file:name = 'malware.exe'] FOLLOWEDBY [file:size > 100]",
        &record
    ));
    assert!(!evaluate(
        "[file:name = 'malware.exe'] FOLLOWEDBY [file:size > 100000]",
        &record
    ));
}

#[test]
fn qualifiers_delegate_to_the_wrapped_observation() {
    let record = file_record();
    let inner = "[file:name = 'malware.exe']";
    let qualified = [
        format!("{} WITHIN 5 MINUTES", inner),
        format!("{} REPEATS 3 TIMES", inner),
        format!(
            "{} START t'2020-01-01T00:00:00Z' STOP t'2021-01-01T00:00:00Z'",
            inner
        ),
    ];
    for pattern in &qualified {
        assert_eq!(
            evaluate(pattern, &record),
            evaluate(inner, &record),
            "qualifier changed the single-record result for {:?}",
            pattern
        );
    }
}

#[test]
fn evaluation_faults_become_non_matches() {
    let record = file_record();
    // invalid regex in MATCHES
    assert!(!evaluate("[file:name MATCHES '(']", &record));
    // LIKE against a non-string value
    assert!(!evaluate("[file:size LIKE '4%']", &record));
    // IN without a set literal
    assert!(!evaluate("[file:name IN 'malware.exe']", &record));
}

#[test]
fn matching_records_filters_a_collection() {
    let records = vec![
        json!({"type": "file", "name": "a.exe", "size": 10}),
        json!({"type": "file", "name": "b.exe", "size": 5000}),
        json!({"type": "process", "name": "a.exe"}),
        json!({"type": "file", "name": "c.dll", "size": 9000}),
    ];
    let matched = matching_records("[file:size > 100]", &records);
    assert_eq!(matched.len(), 2);
    assert_eq!(matched[0]["name"], json!("b.exe"));
    assert_eq!(matched[1]["name"], json!("c.dll"));

    // an invalid pattern filters nothing and does not panic
    assert!(matching_records("[file:size >", &records).is_empty());
}
