//! Tests for the adapter registry and shared helpers.

use super::*;
use crate::Vendor;
use serde_json::json;

#[test]
fn test_builtin_registry_covers_every_vendor() {
    let registry = AdapterRegistry::with_builtin_vendors();
    for vendor in Vendor::all() {
        assert!(registry.contains(vendor), "no adapter for {vendor}");
        assert_eq!(registry.get(vendor).unwrap().vendor(), vendor);
    }
}

#[test]
fn test_empty_registry_has_no_adapters() {
    let registry = AdapterRegistry::new();
    assert!(!registry.contains(Vendor::Msg91));
    assert!(registry.get(Vendor::Msg91).is_none());
}

#[test]
fn test_register_replaces_existing_entry() {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(Msg91Adapter));
    registry.register(Arc::new(Msg91Adapter));
    assert!(registry.contains(Vendor::Msg91));
}

#[test]
fn test_string_field_trims_and_drops_empty() {
    let obj = json!({ "a": "  hi  ", "b": "", "c": 5 });
    assert_eq!(string_field(&obj, "a"), Some("hi".to_string()));
    assert_eq!(string_field(&obj, "b"), None);
    assert_eq!(string_field(&obj, "c"), None);
    assert_eq!(string_field(&obj, "missing"), None);
}

#[test]
fn test_stringy_field_stringifies_numbers() {
    let obj = json!({ "status": 16, "word": "sent", "nul": null });
    assert_eq!(stringy_field(&obj, "status"), Some("16".to_string()));
    assert_eq!(stringy_field(&obj, "word"), Some("sent".to_string()));
    assert_eq!(stringy_field(&obj, "nul"), None);
}
