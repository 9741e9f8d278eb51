//! Book management.

use crate::{Book, Currency, ResultEngine, books, util::normalize_required_name};

use sea_orm::prelude::*;

use super::Engine;

impl Engine {
    /// Add a new book.
    pub async fn new_book(
        &self,
        name: &str,
        user_id: &str,
        currency: Option<Currency>,
    ) -> ResultEngine<String> {
        let name = normalize_required_name(name, "book")?;
        let mut book = Book::new(name, user_id);
        book.currency = currency.unwrap_or_default();
        let book_id = book.id.clone();
        books::ActiveModel::from(&book).insert(&self.database).await?;
        Ok(book_id)
    }

    /// Return a user [`Book`].
    pub async fn book(&self, book_id: &str, user_id: &str) -> ResultEngine<Book> {
        let model = self.require_book(&self.database, book_id, user_id).await?;
        Book::try_from(model)
    }
}
