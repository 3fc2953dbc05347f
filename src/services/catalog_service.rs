use tracing::{debug, info, instrument};

use crate::db::{Book, BookRepository, NewBook};
use crate::legacy_code::{candidate_number, code_for_location, next_code_for, LegacyCodeAllocator};
use crate::services::code_service::{CodeServiceError, DEFAULT_CANDIDATE_LIMIT};

/// Catalogues new books, allocating their legacy code in the same transaction.
///
/// Allocation for a location holds a transaction-scoped advisory lock on that
/// location, so two writers never compute the same next code.
#[derive(Clone)]
pub struct CatalogService {
    book_repo: BookRepository,
    allocator: LegacyCodeAllocator,
}

impl CatalogService {
    pub fn new(book_repo: BookRepository) -> Self {
        Self {
            book_repo,
            allocator: LegacyCodeAllocator::default(),
        }
    }

    #[instrument(skip(self, book), fields(location = %book.location, title = %book.title))]
    pub async fn catalog(&self, book: &NewBook) -> Result<Book, CodeServiceError> {
        let config = self.allocator.config_for(&book.location)?;

        let mut tx = self.book_repo.begin().await?;
        BookRepository::lock_location(&mut tx, config.label()).await?;

        let ids =
            BookRepository::fetch_legacy_ids_with(&mut *tx, config, DEFAULT_CANDIDATE_LIMIT).await?;
        let code = next_code_for(config, &ids)?;

        let inserted = BookRepository::insert_with_code(&mut tx, &code, config.label(), book).await?;
        tx.commit().await?;

        info!("Allocated {} for \"{}\"", inserted.legacy_id, book.title);
        Ok(inserted)
    }
    /// Move the book carrying `legacy_id` to `location`.
    ///
    /// The book keeps its number under the new pool's suffix when that code
    /// is free and inside the pool; otherwise it gets the pool's next code.
    /// `None` when no book carries `legacy_id`.
    #[instrument(skip(self))]
    pub async fn relocate(
        &self,
        legacy_id: &str,
        location: &str,
    ) -> Result<Option<Book>, CodeServiceError> {
        let config = self.allocator.config_for(location)?;

        let mut tx = self.book_repo.begin().await?;
        BookRepository::lock_location(&mut tx, config.label()).await?;

        let Some(book) = BookRepository::find_for_update(&mut tx, legacy_id).await? else {
            debug!("No book with code {}", legacy_id);
            return Ok(None);
        };

        let kept = match code_for_location(&book.legacy_id, config) {
            Some(code) if candidate_number(&code, config).is_some() => {
                if BookRepository::code_in_use(&mut tx, &code, book.id).await? {
                    None
                } else {
                    Some(code)
                }
            }
            _ => None,
        };

        let code = match kept {
            Some(code) => code,
            None => {
                let ids = BookRepository::fetch_legacy_ids_with(
                    &mut *tx,
                    config,
                    DEFAULT_CANDIDATE_LIMIT,
                )
                .await?;
                next_code_for(config, &ids)?
            }
        };

        let moved = BookRepository::relocate(&mut tx, book.id, &code, config.label()).await?;
        tx.commit().await?;

        info!("Moved {} to {} as {}", book.legacy_id, config.label(), moved.legacy_id);
        Ok(Some(moved))
    }
}
