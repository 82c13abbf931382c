use chrono::{DateTime, Duration, TimeZone, Utc};
use keystone_catalog::{
    category_config, category_service, product_config, product_service, Category, CategoryId,
    Product, ProductRow, CATEGORY_LOG_BASE_ID, PRODUCT_LOG_BASE_ID,
};
use keystone_core::{DataRequest, ServiceErrorKind, ViolationCode};
use keystone_infra::{InMemoryStore, StorageBusinessService};
use keystone_observability::EventCapture;

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

#[tokio::test]
async fn product_lifecycle_keeps_creation_audit_fields() {
    let store = InMemoryStore::new();
    let products = product_service(store.begin(), &product_config());
    let (capture, _guard) = EventCapture::install();

    let id = products
        .add(Some(&Product::draft("SKU-1", "Bolt", 125, "alice", at())))
        .await
        .unwrap();
    assert_eq!(id, 1);

    let mut edit = products.retrieve_by_id(&id).await.unwrap();
    edit.price_cents = 150;
    edit.audit.created_by = "bob".to_string();
    edit.audit.touch("bob", at() + Duration::days(1));
    products.modify(Some(&edit)).await.unwrap();

    let stored = products.retrieve_by_id(&id).await.unwrap();
    assert_eq!(stored.price_cents, 150);
    assert_eq!(stored.audit.created_by, "alice");
    assert_eq!(stored.audit.last_modified_by, "bob");
    assert_eq!(store.row_count::<Product, ProductRow>().unwrap(), 1);

    let base = PRODUCT_LOG_BASE_ID;
    let ids: Vec<_> = capture.correlated().iter().filter_map(|e| e.event_id()).collect();
    assert_eq!(ids, vec![base + 1, base + 2, base + 3, base + 2]);
}

#[tokio::test]
async fn product_field_rules_run_alongside_audit_rules() {
    let store = InMemoryStore::new();
    let products = product_service(store.begin(), &product_config());

    let err = products
        .add(Some(&Product::draft("", "Bolt", 125, "alice", at())))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ServiceErrorKind::ModelValidation);
    assert_eq!(err.violations().len(), 1);
    assert_eq!(err.violations()[0].field_name, "sku");
    assert_eq!(err.violations()[0].code, ViolationCode::ValueIsEmpty);
    assert_eq!(store.commit_count(), 0);
}

#[tokio::test]
async fn missing_product_is_reported_before_validation() {
    let store = InMemoryStore::new();
    let products = product_service(store.begin(), &product_config());
    let (capture, _guard) = EventCapture::install();

    let mut ghost = Product::draft("", "", 0, "", DateTime::<Utc>::default());
    ghost.id = 77;
    let err = products.modify(Some(&ghost)).await.unwrap_err();

    assert_eq!(err.kind(), ServiceErrorKind::ObjectNotFound);
    let events = capture.with_event_id(PRODUCT_LOG_BASE_ID + 3);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].str_field("object_id"), Some("77"));
}

#[tokio::test]
async fn categories_use_their_own_log_base_and_uuid_keys() {
    let store = InMemoryStore::new();
    let categories = category_service(store.begin(), &category_config());
    let (capture, _guard) = EventCapture::install();

    let id = categories
        .add(Some(&Category::new("Fasteners").with_description("Bolts and nuts")))
        .await
        .unwrap();
    assert_ne!(id, CategoryId::default());

    let page = categories.items(&DataRequest::page(0, 10)).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].description.as_deref(), Some("Bolts and nuts"));

    categories.remove_by_id(&id).await.unwrap();
    let err = categories.retrieve_by_id(&id).await.unwrap_err();
    assert_eq!(err.kind(), ServiceErrorKind::ObjectNotFound);

    let base = CATEGORY_LOG_BASE_ID;
    let ids: Vec<_> = capture.correlated().iter().filter_map(|e| e.event_id()).collect();
    assert_eq!(ids, vec![base + 1, base + 5, base + 4, base + 2]);
    assert!(capture
        .correlated()
        .iter()
        .all(|event| event.str_field("entity") == Some("Category")));
}

#[tokio::test]
async fn product_and_category_services_share_one_store() {
    let store = InMemoryStore::new();
    let products = product_service(store.begin(), &product_config());
    let categories = category_service(store.begin(), &category_config());

    products
        .add(Some(&Product::draft("SKU-1", "Bolt", 125, "alice", at())))
        .await
        .unwrap();
    categories.add(Some(&Category::new("Fasteners"))).await.unwrap();

    assert_eq!(store.commit_count(), 2);
    assert_eq!(store.row_count::<Product, ProductRow>().unwrap(), 1);
    assert_eq!(store.row_count::<Category, Category>().unwrap(), 1);
}

#[tokio::test]
async fn changing_a_product_sku_is_rejected_without_committing() {
    let store = InMemoryStore::new();
    let products = product_service(store.begin(), &product_config());
    let id = products
        .add(Some(&Product::draft("SKU-1", "Bolt", 125, "alice", at())))
        .await
        .unwrap();
    let (capture, _guard) = EventCapture::install();

    let mut edit = products.retrieve_by_id(&id).await.unwrap();
    edit.sku = "SKU-9".to_string();
    edit.audit.touch("bob", at() + Duration::hours(1));
    let err = products.modify(Some(&edit)).await.unwrap_err();

    assert_eq!(err.kind(), ServiceErrorKind::FieldCanNotBeUpdated);
    assert_eq!(err.code(), 3);
    assert_eq!(store.commit_count(), 1);
    assert_eq!(products.retrieve_by_id(&id).await.unwrap().sku, "SKU-1");

    let failures = capture.with_event_id(PRODUCT_LOG_BASE_ID + 3);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].field("error_code").and_then(|v| v.as_i64()), Some(3));
}
