use marketplace_api::services::product_service::{
    CatalogFilter, build_catalog_count, build_catalog_listing,
};

fn filter(category: Option<&str>, search: Option<&str>) -> CatalogFilter {
    CatalogFilter {
        category: category.map(String::from),
        search: search.map(String::from),
    }
}

fn listing_where(sql: &str) -> &str {
    let start = sql.find(" WHERE").expect("listing has a WHERE clause");
    let end = sql.find(" ORDER BY").expect("listing has an ORDER BY clause");
    &sql[start..end]
}

fn count_where(sql: &str) -> &str {
    let start = sql.find(" WHERE").expect("count has a WHERE clause");
    &sql[start..]
}

// The listing and its total are separate statements; this pins them to
// identical predicates for every filter combination.
#[test]
fn listing_and_count_share_predicates() {
    let combos = [
        filter(None, None),
        filter(Some("all"), None),
        filter(Some("garden"), None),
        filter(None, Some("mug")),
        filter(Some("garden"), Some("mug")),
        filter(Some(""), Some("")),
    ];

    for combo in &combos {
        let listing = build_catalog_listing(combo, 20, 0);
        let count = build_catalog_count(combo);
        assert_eq!(
            listing_where(listing.sql()),
            count_where(count.sql()),
            "predicate drift for category={:?} search={:?}",
            combo.category,
            combo.search
        );
    }
}

#[test]
fn category_sentinel_disables_the_filter() {
    let all = build_catalog_listing(&filter(Some("all"), None), 20, 0);
    let none = build_catalog_listing(&filter(None, None), 20, 0);
    assert_eq!(all.sql(), none.sql());

    let garden = build_catalog_listing(&filter(Some("garden"), None), 20, 0);
    assert!(garden.sql().contains("category = "));
}

#[test]
fn empty_search_is_skipped() {
    let empty = build_catalog_listing(&filter(None, Some("")), 20, 0);
    assert!(!empty.sql().contains("ILIKE"));

    let with_search = build_catalog_listing(&filter(None, Some("mug")), 20, 0);
    assert!(with_search.sql().contains("name ILIKE "));
}

#[test]
fn only_active_products_are_visible() {
    let listing = build_catalog_listing(&filter(None, None), 20, 0);
    assert!(listing.sql().starts_with("SELECT * FROM products WHERE is_active = TRUE"));
    let count = build_catalog_count(&filter(None, None));
    assert!(count.sql().starts_with("SELECT COUNT(*) FROM products WHERE is_active = TRUE"));
}
