use chrono::NaiveDate;

use crate::domain::model::book::Book;
use crate::domain::model::catalog::{Catalog, CheckoutReceipt, ReturnReceipt};
use crate::domain::model::id::{Isbn, MemberId};
use crate::domain::model::member::Member;
use crate::domain::model::policy::Policy;
use crate::domain::repository::CatalogRepository;

use super::error::AppError;

/// 検索対象のフィールド。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Title,
    Author,
    Genre,
}

/// Catalogに対するユースケース。
/// load → mutate → save のパターンで操作する。
pub struct CatalogService<R: CatalogRepository> {
    repo: R,
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Catalogを新規作成して永続化する。既存Catalogがあれば上書き。
    pub fn create_catalog(&self, name: &str) -> Result<Catalog, AppError> {
        let catalog = Catalog::new(name);
        self.persist(&catalog)?;
        Ok(catalog)
    }

    pub fn add_book(&self, book: Book) -> Result<(), AppError> {
        let mut catalog = self.load_catalog()?;
        catalog.add_book(book)?;
        self.persist(&catalog)
    }

    pub fn remove_book(&self, isbn: &Isbn) -> Result<Book, AppError> {
        let mut catalog = self.load_catalog()?;
        let book = catalog.remove_book(isbn)?;
        self.persist(&catalog)?;
        Ok(book)
    }

    pub fn add_member(&self, member: Member) -> Result<(), AppError> {
        let mut catalog = self.load_catalog()?;
        catalog.add_member(member)?;
        self.persist(&catalog)
    }

    pub fn remove_member(&self, id: MemberId) -> Result<Member, AppError> {
        let mut catalog = self.load_catalog()?;
        let member = catalog.remove_member(id)?;
        self.persist(&catalog)?;
        Ok(member)
    }

    /// 会員のポリシーを差し替える（昇格・降格）。
    pub fn change_policy(&self, id: MemberId, policy: Policy) -> Result<Member, AppError> {
        let mut catalog = self.load_catalog()?;
        let member = catalog.change_policy(id, policy)?.clone();
        self.persist(&catalog)?;
        Ok(member)
    }

    /// 貸出。検証に失敗した場合は保存しない。
    pub fn check_out(&self, isbn: &Isbn, member_id: MemberId) -> Result<CheckoutReceipt, AppError> {
        let mut catalog = self.load_catalog()?;
        let receipt = catalog.check_out(isbn, member_id)?;
        self.persist(&catalog)?;
        Ok(receipt)
    }

    pub fn return_book(&self, isbn: &Isbn, member_id: MemberId) -> Result<ReturnReceipt, AppError> {
        let mut catalog = self.load_catalog()?;
        let receipt = catalog.return_book(isbn, member_id)?;
        self.persist(&catalog)?;
        Ok(receipt)
    }

    pub fn overdue_books(&self, today: NaiveDate) -> Result<Vec<Book>, AppError> {
        let catalog = self.load_catalog()?;
        Ok(catalog.overdue_books(today).into_iter().cloned().collect())
    }

    pub fn search(&self, field: SearchField, query: &str) -> Result<Vec<Book>, AppError> {
        let catalog = self.load_catalog()?;
        let found = match field {
            SearchField::Title => catalog.search_by_title(query),
            SearchField::Author => catalog.search_by_author(query),
            SearchField::Genre => catalog.search_by_genre(query),
        };
        Ok(found.into_iter().cloned().collect())
    }

    pub fn find_member(&self, id: MemberId) -> Result<Member, AppError> {
        let catalog = self.load_catalog()?;
        Ok(catalog.find_member(id)?.clone())
    }

    /// Catalog全体を読み取る。
    pub fn read_catalog(&self) -> Result<Catalog, AppError> {
        self.load_catalog()
    }

    /// 外部で組み立てたCatalogを保存する。
    pub fn save_catalog(&self, catalog: &Catalog) -> Result<(), AppError> {
        self.persist(catalog)
    }

    // --- private ---

    fn load_catalog(&self) -> Result<Catalog, AppError> {
        self.repo
            .load()
            .map_err(|e| AppError::Storage(Box::new(e)))?
            .ok_or(AppError::CatalogNotFound)
    }

    fn persist(&self, catalog: &Catalog) -> Result<(), AppError> {
        self.repo
            .save(catalog)
            .map_err(|e| AppError::Storage(Box::new(e)))
    }
}
