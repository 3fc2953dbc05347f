pub mod book_repository;
pub mod error;
pub mod location_repository;
pub mod models;
pub mod pool;
pub mod report_repository;

pub use book_repository::BookRepository;
pub use error::DbError;
pub use location_repository::LocationRepository;
pub use models::*;
pub use report_repository::ReportRepository;
