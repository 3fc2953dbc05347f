pub mod catalog_service;
pub mod code_service;

pub use catalog_service::CatalogService;
pub use code_service::{CodeService, CodeServiceError, LegacyIdSource, NextCodePreview};
