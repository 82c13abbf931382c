//! Catalog domain module.
//!
//! Products (auditable, integer keys) and categories (UUID keys, no audit
//! trail), each served through the generic storage business service.

pub mod category;
pub mod product;

pub use category::{
    category_config, category_service, Category, CategoryId, CategoryService, CategoryValidator,
    CATEGORY_LOG_BASE_ID,
};
pub use product::{
    product_config, product_service, Product, ProductRow, ProductService, ProductValidator,
    PRODUCT_LOG_BASE_ID,
};
