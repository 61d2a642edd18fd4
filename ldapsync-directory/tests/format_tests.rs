use ldapsync_directory::{format_entry, format_value};
use ldapsync_types::{AttributeValue, DirectoryEntry};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// ── Value rules ─────────────────────────────────────────────────

#[test]
fn integer_becomes_decimal_string() {
    assert_eq!(format_value(&AttributeValue::Integer(512)), Some("512".to_string()));
    assert_eq!(format_value(&AttributeValue::Integer(-7)), Some("-7".to_string()));
}

#[test]
fn empty_list_becomes_null() {
    assert_eq!(format_value(&AttributeValue::Multi(Vec::new())), None);
}

#[test]
fn list_is_joined_with_pipe() {
    let value = AttributeValue::from(vec!["Sales", "EMEA", "Remote"]);
    assert_eq!(format_value(&value), Some("Sales|EMEA|Remote".to_string()));
}

#[test]
fn text_passes_through() {
    assert_eq!(
        format_value(&AttributeValue::from("a|b with spaces")),
        Some("a|b with spaces".to_string())
    );
}

// ── Entry formatting ────────────────────────────────────────────

#[test]
fn record_follows_configured_order_not_entry_order() {
    let entry = DirectoryEntry::new("cn=alice")
        .with_attribute("mail", "alice@example.com")
        .with_attribute("sAMAccountName", "alice");

    let record = format_entry(&entry, &fields(&["sAMAccountName", "mail"]));
    let json = serde_json::to_string(&record).unwrap();
    assert_eq!(json, r#"{"sAMAccountName":"alice","mail":"alice@example.com"}"#);
}

#[test]
fn missing_attribute_is_null() {
    let entry = DirectoryEntry::new("cn=bob").with_attribute("sn", "Builder");
    let record = format_entry(&entry, &fields(&["sn", "department"]));
    assert_eq!(record.get("sn"), Some(Some("Builder")));
    assert_eq!(record.get("department"), Some(None));
}

#[test]
fn lookup_uses_configured_spelling_for_keys() {
    let entry = DirectoryEntry::new("cn=carol").with_attribute("samaccountname", "carol");
    let record = format_entry(&entry, &fields(&["sAMAccountName"]));
    assert_eq!(record.fields().collect::<Vec<_>>(), vec!["sAMAccountName"]);
    assert_eq!(record.get("sAMAccountName"), Some(Some("carol")));
}

#[test]
fn attributes_outside_the_list_are_dropped() {
    let entry = DirectoryEntry::new("cn=dave")
        .with_attribute("mail", "dave@example.com")
        .with_attribute("userPassword", "secret");
    let record = format_entry(&entry, &fields(&["mail"]));
    assert_eq!(record.len(), 1);
    assert_eq!(record.get("userPassword"), None);
}

// ── Properties ──────────────────────────────────────────────────

fn attribute_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{1,12}", 0..8).prop_map(|set| set.into_iter().collect())
}

fn attribute_value() -> impl Strategy<Value = AttributeValue> {
    prop_oneof![
        any::<i64>().prop_map(AttributeValue::Integer),
        "[ -~]{0,20}".prop_map(AttributeValue::Text),
        prop::collection::vec("[ -~]{0,10}", 0..5).prop_map(AttributeValue::Multi),
    ]
}

proptest! {
    /// Keys equal the configured list in order, whatever the entry holds.
    #[test]
    fn keys_match_configured_fields(
        fields in attribute_names(),
        present in prop::collection::vec((("[a-z]{1,12}"), attribute_value()), 0..8),
    ) {
        let mut entry = DirectoryEntry::new("cn=prop");
        for (name, value) in present {
            entry.insert(name, value);
        }

        let record = format_entry(&entry, &fields);
        let keys: Vec<&str> = record.fields().collect();
        let expected: Vec<&str> = fields.iter().map(String::as_str).collect();
        prop_assert_eq!(keys, expected);
    }

    #[test]
    fn non_empty_lists_join_with_pipe(values in prop::collection::vec("[a-zA-Z0-9 ]{0,10}", 1..6)) {
        let formatted = format_value(&AttributeValue::Multi(values.clone()));
        prop_assert_eq!(formatted, Some(values.join("|")));
    }

    #[test]
    fn integers_format_exactly(n in any::<i64>()) {
        prop_assert_eq!(format_value(&AttributeValue::Integer(n)), Some(n.to_string()));
    }
}
