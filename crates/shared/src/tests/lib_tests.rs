use crate::{
    domain::{position_of, same_item, sorted_collection, ItemKey},
    error::{ApiException, ErrorCode},
};

fn names(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|name| name.to_string()).collect()
}

#[test]
fn item_comparison_ignores_case() {
    assert!(same_item("Apple", "apple"));
    assert!(same_item("KIWI", "kiwi"));
    assert!(!same_item("Apple", "Apples"));
    assert_eq!(ItemKey::new("Mango"), ItemKey::from("mANGO"));
}

#[test]
fn position_lookup_is_case_insensitive() {
    let items = names(&["Banana", "Apple", "Cherry"]);
    assert_eq!(position_of(&items, "apple"), Some(1));
    assert_eq!(position_of(&items, "CHERRY"), Some(2));
    assert_eq!(position_of(&items, "Kiwi"), None);
}

#[test]
fn sorting_is_case_sensitive_lexicographic() {
    let items = names(&["banana", "Cherry", "Apple"]);
    assert_eq!(sorted_collection(&items), names(&["Apple", "Cherry", "banana"]));
}

#[test]
fn exception_messages_match_data_source_contract() {
    assert_eq!(
        ApiException::already_exists("Apple").to_string(),
        "Apple already exists"
    );
    assert_eq!(
        ApiException::already_in_use("Kiwi").to_string(),
        "Kiwi already in use"
    );
    assert_eq!(ApiException::not_found("Grape").to_string(), "Grape not found");
    assert_eq!(ApiException::not_found("Grape").code, ErrorCode::NotFound);
}

#[test]
fn exception_serializes_with_snake_case_code() {
    let value = serde_json::to_value(ApiException::already_exists("Pear")).expect("serialize");
    assert_eq!(value["code"], "duplicate_name");
    assert_eq!(value["message"], "Pear already exists");
}
