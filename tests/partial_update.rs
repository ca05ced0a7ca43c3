use marketplace_api::update::{PartialUpdate, ProductColumn, UserColumn};
use uuid::Uuid;

#[test]
fn renders_only_supplied_columns() {
    let mut update = PartialUpdate::<UserColumn>::new();
    update.maybe_set(UserColumn::Username, None::<String>);
    update.set(UserColumn::Email, "new@example.com".to_string());

    let query = update.by_id(Uuid::new_v4());
    assert_eq!(
        query.sql(),
        "UPDATE users SET email = $1 WHERE id = $2 RETURNING *"
    );
}

#[test]
fn renders_columns_in_call_order() {
    let mut update = PartialUpdate::<ProductColumn>::new();
    update.set(ProductColumn::Name, "Walnut Desk Organizer".to_string());
    update.set(ProductColumn::Price, 1999_i64);
    update.maybe_set(ProductColumn::Stock, Some(3_i32));

    let query = update.by_id(Uuid::new_v4());
    assert_eq!(
        query.sql(),
        "UPDATE products SET name = $1, price = $2, stock = $3 WHERE id = $4 RETURNING *"
    );
}

#[test]
fn zero_supplied_fields_is_reported_empty() {
    let mut update = PartialUpdate::<UserColumn>::new();
    update.maybe_set(UserColumn::Email, None::<String>);
    update.maybe_set(UserColumn::Username, None::<String>);

    // Callers branch on this and return the current record without
    // executing any statement.
    assert!(update.is_empty());
}

#[test]
fn values_are_bound_not_interpolated() {
    let hostile = "x'; DROP TABLE users; --".to_string();
    let mut update = PartialUpdate::<UserColumn>::new();
    update.set(UserColumn::Username, hostile);

    let query = update.by_id(Uuid::new_v4());
    assert!(!query.sql().contains("DROP TABLE"));
    assert_eq!(
        query.sql(),
        "UPDATE users SET username = $1 WHERE id = $2 RETURNING *"
    );
}
