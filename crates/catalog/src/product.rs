use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;

use keystone_core::{
    require_non_empty, validate_audit_on_add, validate_audit_on_modify, AuditAccess, AuditTrail,
    Auditable, Entity, EntityValidator, PersistedRow, ValidationResult,
};
use keystone_infra::{PgTable, RepositoryFactory, SqlValue, StorageService, StorageServiceConfig};

/// Log base of the product service.
pub const PRODUCT_LOG_BASE_ID: i64 = 1000;

/// Sellable catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub name: String,
    /// Price in the smallest currency unit (e.g. cents).
    pub price_cents: i64,
    #[serde(flatten)]
    pub audit: AuditTrail,
}

impl Product {
    /// A product not yet persisted, stamped as created by `user` at `at`.
    pub fn draft(
        sku: impl Into<String>,
        name: impl Into<String>,
        price_cents: i64,
        user: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            sku: sku.into(),
            name: name.into(),
            price_cents,
            audit: AuditTrail::created(user, at),
        }
    }
}

impl Entity for Product {
    type Key = i64;
    const ENTITY_NAME: &'static str = "Product";

    fn id(&self) -> &i64 {
        &self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn audit_access() -> Option<AuditAccess<Self>> {
        Some(AuditAccess::of())
    }
}

impl Auditable for Product {
    fn audit_trail(&self) -> &AuditTrail {
        &self.audit
    }

    fn audit_trail_mut(&mut self) -> &mut AuditTrail {
        &mut self.audit
    }
}

/// Storage row of the `products` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub created_by: String,
    pub creation_time: DateTime<Utc>,
    pub last_modified_by: String,
    pub last_modification_time: DateTime<Utc>,
}

impl PersistedRow<Product> for ProductRow {
    fn from_entity(entity: &Product) -> Self {
        Self {
            id: entity.id,
            sku: entity.sku.clone(),
            name: entity.name.clone(),
            price_cents: entity.price_cents,
            created_by: entity.audit.created_by.clone(),
            creation_time: entity.audit.creation_time,
            last_modified_by: entity.audit.last_modified_by.clone(),
            last_modification_time: entity.audit.last_modification_time,
        }
    }

    fn to_entity(&self) -> Product {
        Product {
            id: self.id,
            sku: self.sku.clone(),
            name: self.name.clone(),
            price_cents: self.price_cents,
            audit: AuditTrail {
                created_by: self.created_by.clone(),
                creation_time: self.creation_time,
                last_modified_by: self.last_modified_by.clone(),
                last_modification_time: self.last_modification_time,
            },
        }
    }

    fn apply_entity(&mut self, entity: &Product) {
        let id = self.id;
        *self = Self::from_entity(entity);
        self.id = id;
    }

    fn key(&self) -> &i64 {
        &self.id
    }
}

impl PgTable<Product> for ProductRow {
    const TABLE: &'static str = "products";
    const KEY_COLUMN: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &[
        "sku",
        "name",
        "price_cents",
        "created_by",
        "creation_time",
        "last_modified_by",
        "last_modification_time",
    ];
    const KEY_SEQUENCE: Option<&'static str> = Some("products_id_seq");

    fn key_value(key: &i64) -> SqlValue {
        SqlValue::from(*key)
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.sku.as_str().into(),
            self.name.as_str().into(),
            self.price_cents.into(),
            self.created_by.as_str().into(),
            self.creation_time.into(),
            self.last_modified_by.as_str().into(),
            self.last_modification_time.into(),
        ]
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            sku: row.try_get("sku")?,
            name: row.try_get("name")?,
            price_cents: row.try_get("price_cents")?,
            created_by: row.try_get("created_by")?,
            creation_time: row.try_get("creation_time")?,
            last_modified_by: row.try_get("last_modified_by")?,
            last_modification_time: row.try_get("last_modification_time")?,
        })
    }
}

/// Audit passes plus non-empty `sku` and `name`. The `sku` is fixed once the
/// product is stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductValidator;

impl ProductValidator {
    fn require_fields(item: &Product, result: &mut ValidationResult) {
        require_non_empty("sku", &item.sku, result);
        require_non_empty("name", &item.name, result);
    }
}

impl EntityValidator<Product> for ProductValidator {
    fn validate_on_add(&self, item: &Product) -> ValidationResult {
        let mut result = ValidationResult::new();
        validate_audit_on_add(&item.audit, &mut result);
        Self::require_fields(item, &mut result);
        result
    }

    fn validate_on_modify(&self, incoming: &Product, stored: &Product) -> ValidationResult {
        let mut result = ValidationResult::new();
        validate_audit_on_modify(&incoming.audit, &stored.audit, &mut result);
        Self::require_fields(incoming, &mut result);
        result
    }

    fn locked_field(&self, incoming: &Product, stored: &Product) -> Option<&'static str> {
        (incoming.sku != stored.sku).then_some("sku")
    }
}

pub type ProductService<U> = StorageService<Product, ProductRow, U, ProductValidator>;

/// Service config with the product log base.
pub fn product_config() -> StorageServiceConfig {
    StorageServiceConfig::default().with_log_base_id(PRODUCT_LOG_BASE_ID)
}

pub fn product_service<U>(unit_of_work: U, config: &StorageServiceConfig) -> ProductService<U>
where
    U: RepositoryFactory<Product, ProductRow>,
{
    StorageService::new(unit_of_work, ProductValidator, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use keystone_core::ViolationCode;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn row_mapping_keeps_key_on_apply() {
        let mut product = Product::draft("SKU-1", "Bolt", 125, "alice", at());
        product.id = 9;
        let mut row = ProductRow::from_entity(&product);

        let mut incoming = product.clone();
        incoming.id = 42;
        incoming.name = "Hex bolt".to_string();
        row.apply_entity(&incoming);

        assert_eq!(row.id, 9);
        assert_eq!(row.to_entity().name, "Hex bolt");
        assert_eq!(row.values().len(), ProductRow::COLUMNS.len());
    }

    #[test]
    fn validator_combines_audit_and_field_rules() {
        let product = Product {
            sku: " ".to_string(),
            ..Product::draft("", "Bolt", 1, "", DateTime::<Utc>::default())
        };

        let result = ProductValidator.validate_on_add(&product);
        assert!(result.has("sku", ViolationCode::ValueIsEmpty));
        assert!(result.has_code(ViolationCode::CreatedByIsEmpty));
        assert!(result.has_code(ViolationCode::CreationTimeValueIsNotValid));
        assert!(!result.has("name", ViolationCode::ValueIsEmpty));
    }

    #[test]
    fn validator_checks_monotonic_modification() {
        let stored = Product::draft("SKU-1", "Bolt", 125, "alice", at());
        let mut incoming = stored.clone();
        incoming.audit.touch("bob", at() - Duration::hours(1));

        let result = ProductValidator.validate_on_modify(&incoming, &stored);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn sku_is_locked_after_creation() {
        let stored = Product::draft("SKU-1", "Bolt", 125, "alice", at());
        let mut incoming = stored.clone();
        incoming.name = "Hex bolt".to_string();
        assert_eq!(ProductValidator.locked_field(&incoming, &stored), None);

        incoming.sku = "SKU-2".to_string();
        assert_eq!(ProductValidator.locked_field(&incoming, &stored), Some("sku"));
    }
}
