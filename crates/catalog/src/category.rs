use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;

use keystone_core::{require_non_empty, Entity, EntityValidator, ValidationResult};
use keystone_infra::{PgTable, RepositoryFactory, SqlValue, StorageService, StorageServiceConfig};

/// Log base of the category service.
pub const CATEGORY_LOG_BASE_ID: i64 = 1100;

keystone_core::uuid_key!(
    /// Category identifier.
    CategoryId
);

/// Grouping of products. Categories carry no audit trail and are stored as
/// their own rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CategoryId::default(),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Entity for Category {
    type Key = CategoryId;
    const ENTITY_NAME: &'static str = "Category";

    fn id(&self) -> &CategoryId {
        &self.id
    }

    fn set_id(&mut self, id: CategoryId) {
        self.id = id;
    }
}

impl PgTable<Category> for Category {
    const TABLE: &'static str = "categories";
    const KEY_COLUMN: &'static str = "id";
    const COLUMNS: &'static [&'static str] = &["name", "description"];

    fn key_value(key: &CategoryId) -> SqlValue {
        SqlValue::from(*key.as_uuid())
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.name.as_str().into(),
            SqlValue::Text(self.description.clone()),
        ]
    }

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: CategoryId::from_uuid(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryValidator;

impl EntityValidator<Category> for CategoryValidator {
    fn validate_on_add(&self, item: &Category) -> ValidationResult {
        let mut result = ValidationResult::new();
        require_non_empty("name", &item.name, &mut result);
        result
    }

    fn validate_on_modify(&self, incoming: &Category, _stored: &Category) -> ValidationResult {
        self.validate_on_add(incoming)
    }
}

pub type CategoryService<U> = StorageService<Category, Category, U, CategoryValidator>;

pub fn category_config() -> StorageServiceConfig {
    StorageServiceConfig::default().with_log_base_id(CATEGORY_LOG_BASE_ID)
}

pub fn category_service<U>(unit_of_work: U, config: &StorageServiceConfig) -> CategoryService<U>
where
    U: RepositoryFactory<Category, Category>,
{
    StorageService::new(unit_of_work, CategoryValidator, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::{PrimaryKey, ViolationCode};

    #[test]
    fn new_categories_have_unset_keys() {
        let category = Category::new("Fasteners").with_description("Bolts, nuts, screws");
        assert!(category.id.is_unset());
        assert_eq!(category.values()[1], SqlValue::Text(Some("Bolts, nuts, screws".into())));
    }

    #[test]
    fn blank_names_are_rejected_on_both_passes() {
        let category = Category::new("  ");
        assert!(CategoryValidator
            .validate_on_add(&category)
            .has("name", ViolationCode::ValueIsEmpty));
        assert!(!CategoryValidator
            .validate_on_modify(&category, &Category::new("x"))
            .is_valid());
    }

    #[test]
    fn category_is_not_auditable() {
        assert!(Category::audit_access().is_none());
    }
}
