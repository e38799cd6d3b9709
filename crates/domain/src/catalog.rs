//! Catalog rules for books and genres.
//!
//! Conventional plumbing around the catalog store: uniqueness and
//! referential checks, soft deletes, and listing pass-throughs. Reads
//! never see soft-deleted records; unique fields stay reserved after a
//! soft delete.

use common::{BookId, GenreId};
use store::{
    Book, BookFilter, BookPatch, Genre, GenreSortKey, NewBook, Page, SortDir, Store, StoreError,
};

use crate::error::CatalogError;

/// Service enforcing the catalog's create/update/delete rules.
#[derive(Clone)]
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    /// Creates a new catalog service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    // -- genres --

    #[tracing::instrument(skip(self))]
    pub async fn create_genre(&self, name: &str) -> Result<Genre, CatalogError> {
        let name = valid_genre_name(name)?;
        if self.store.find_genre_by_name(name).await?.is_some() {
            return Err(CatalogError::DuplicateGenreName(name.to_string()));
        }
        match self.store.insert_genre(name).await {
            Ok(genre) => Ok(genre),
            Err(StoreError::Duplicate { .. }) => {
                Err(CatalogError::DuplicateGenreName(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_genre(&self, id: GenreId) -> Result<Genre, CatalogError> {
        self.store
            .find_genre(id)
            .await?
            .ok_or(CatalogError::GenreNotFound(id))
    }

    pub async fn list_genres(
        &self,
        search: Option<&str>,
        sort_key: GenreSortKey,
        sort_dir: SortDir,
        page: Page,
    ) -> Result<(Vec<Genre>, u64), CatalogError> {
        Ok(self
            .store
            .list_genres(search, sort_key, sort_dir, page)
            .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_genre(&self, id: GenreId, name: &str) -> Result<Genre, CatalogError> {
        let name = valid_genre_name(name)?;
        let existing = self.get_genre(id).await?;
        if name != existing.name && self.store.find_genre_by_name(name).await?.is_some() {
            return Err(CatalogError::DuplicateGenreName(name.to_string()));
        }
        match self.store.update_genre_name(id, name).await {
            Ok(genre) => Ok(genre),
            Err(StoreError::NotFound) => Err(CatalogError::GenreNotFound(id)),
            Err(StoreError::Duplicate { .. }) => {
                Err(CatalogError::DuplicateGenreName(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Soft-deletes a genre. Refused while any non-deleted book still
    /// references it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_genre(&self, id: GenreId) -> Result<(), CatalogError> {
        self.get_genre(id).await?;
        let book_count = self.store.count_active_books_in_genre(id).await?;
        if book_count > 0 {
            return Err(CatalogError::GenreHasBooks {
                genre_id: id,
                book_count,
            });
        }
        match self.store.soft_delete_genre(id).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => Err(CatalogError::GenreNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    // -- books --

    #[tracing::instrument(skip(self, book), fields(title = %book.title))]
    pub async fn create_book(&self, book: NewBook) -> Result<Book, CatalogError> {
        if book.title.trim().is_empty() {
            return Err(CatalogError::InvalidTitle);
        }
        if book.writer.trim().is_empty() {
            return Err(CatalogError::InvalidWriter);
        }
        if book.publisher.trim().is_empty() {
            return Err(CatalogError::InvalidPublisher);
        }
        valid_publication_year(book.publication_year)?;
        if !book.price.is_positive() {
            return Err(CatalogError::InvalidPrice);
        }
        self.get_genre(book.genre_id).await?;
        if self.store.find_book_by_title(&book.title).await?.is_some() {
            return Err(CatalogError::DuplicateTitle(book.title));
        }
        match self.store.insert_book(book).await {
            Ok(book) => Ok(book),
            Err(StoreError::Duplicate { value, .. }) => Err(CatalogError::DuplicateTitle(value)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_book(&self, id: BookId) -> Result<Book, CatalogError> {
        self.store
            .find_book(id)
            .await?
            .ok_or(CatalogError::BookNotFound(id))
    }

    pub async fn list_books(
        &self,
        filter: &BookFilter,
        page: Page,
    ) -> Result<(Vec<Book>, u64), CatalogError> {
        Ok(self.store.list_books(filter, page).await?)
    }

    /// Lists the books of one genre; fails if the genre does not exist.
    pub async fn list_books_in_genre(
        &self,
        genre_id: GenreId,
        mut filter: BookFilter,
        page: Page,
    ) -> Result<(Genre, Vec<Book>, u64), CatalogError> {
        let genre = self.get_genre(genre_id).await?;
        filter.genre_id = Some(genre_id);
        let (books, total) = self.store.list_books(&filter, page).await?;
        Ok((genre, books, total))
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn update_book(&self, id: BookId, patch: BookPatch) -> Result<Book, CatalogError> {
        let existing = self.get_book(id).await?;
        if let Some(ref title) = patch.title {
            if title.trim().is_empty() {
                return Err(CatalogError::InvalidTitle);
            }
            if *title != existing.title && self.store.find_book_by_title(title).await?.is_some() {
                return Err(CatalogError::DuplicateTitle(title.clone()));
            }
        }
        if let Some(ref writer) = patch.writer {
            if writer.trim().is_empty() {
                return Err(CatalogError::InvalidWriter);
            }
        }
        if let Some(ref publisher) = patch.publisher {
            if publisher.trim().is_empty() {
                return Err(CatalogError::InvalidPublisher);
            }
        }
        if let Some(year) = patch.publication_year {
            valid_publication_year(year)?;
        }
        if let Some(price) = patch.price {
            if !price.is_positive() {
                return Err(CatalogError::InvalidPrice);
            }
        }
        if let Some(genre_id) = patch.genre_id {
            self.get_genre(genre_id).await?;
        }
        match self.store.update_book(id, patch).await {
            Ok(book) => Ok(book),
            Err(StoreError::NotFound) => Err(CatalogError::BookNotFound(id)),
            Err(StoreError::Duplicate { value, .. }) => Err(CatalogError::DuplicateTitle(value)),
            Err(e) => Err(e.into()),
        }
    }

    /// Soft-deletes a book; it disappears from listings and new orders
    /// but stays resolvable from order history.
    #[tracing::instrument(skip(self))]
    pub async fn delete_book(&self, id: BookId) -> Result<(), CatalogError> {
        match self.store.soft_delete_book(id).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => Err(CatalogError::BookNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }
}

fn valid_genre_name(name: &str) -> Result<&str, CatalogError> {
    let trimmed = name.trim();
    if trimmed.chars().count() < 2 {
        return Err(CatalogError::InvalidName);
    }
    Ok(trimmed)
}

fn valid_publication_year(year: i32) -> Result<(), CatalogError> {
    use chrono::Datelike;
    if !(1000..=chrono::Utc::now().year()).contains(&year) {
        return Err(CatalogError::InvalidPublicationYear);
    }
    Ok(())
}
