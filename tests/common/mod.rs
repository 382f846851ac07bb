//! Shared test harness for integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::NaiveDate;

use library_catalog::application::service::CatalogService;
use library_catalog::domain::model::book::Book;
use library_catalog::domain::model::catalog::Catalog;
use library_catalog::domain::model::id::{Isbn, MemberId};
use library_catalog::domain::model::member::Member;
use library_catalog::domain::model::policy::MemberPolicy;
use library_catalog::domain::repository::CatalogRepository;
use library_catalog::infra::document::CatalogDocument;

// =============================================================================
// InMemoryRepo — テスト用リポジトリ
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[error("in-memory store error")]
pub struct InMemoryError;

/// ファイルI/O不要のインメモリリポジトリ。保存形式はJSONドキュメントと同じ。
pub struct InMemoryRepo {
    store: RefCell<HashMap<String, String>>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            store: RefCell::new(HashMap::new()),
        }
    }

    /// 保存済みのJSON文字列。
    pub fn raw(&self) -> Option<String> {
        self.store.borrow().get("catalog").cloned()
    }
}

impl CatalogRepository for InMemoryRepo {
    type Error = InMemoryError;

    fn load(&self) -> Result<Option<Catalog>, Self::Error> {
        let store = self.store.borrow();
        match store.get("catalog") {
            Some(json) => {
                let document: CatalogDocument = serde_json::from_str(json).unwrap();
                Ok(Some(document.into_catalog().unwrap()))
            }
            None => Ok(None),
        }
    }

    fn save(&self, catalog: &Catalog) -> Result<(), Self::Error> {
        let json = serde_json::to_string(&CatalogDocument::from_catalog(catalog)).unwrap();
        self.store.borrow_mut().insert("catalog".to_string(), json);
        Ok(())
    }
}

// =============================================================================
// TestCatalog — テスト用Catalog作成ヘルパー
// =============================================================================

pub const ALICE: MemberId = MemberId::new(101);
pub const CHARLIE: MemberId = MemberId::new(201);
pub const DANA: MemberId = MemberId::new(301);

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// テスト用のCatalog。ISBNを短い名前で引ける。
pub struct TestCatalog {
    pub catalog: Catalog,
    pub isbns: HashMap<&'static str, Isbn>,
}

impl TestCatalog {
    /// 標準的なテスト用Catalog:
    /// ```text
    /// City Library
    ///   gatsby  The Great Gatsby          (Fiction, 1925)
    ///   dune    Dune                      (Science Fiction, 1965)
    ///   time    A Brief History of Time   (Science, 1988)
    ///
    ///   101 Alice Smith    Faculty (fixed)
    ///   201 Charlie Brown  Student (fixed)
    ///   301 Dana Lee       Regular Member (attached)
    /// ```
    pub fn standard() -> Self {
        let mut catalog = Catalog::new("City Library");
        let mut isbns = HashMap::new();

        for (key, title, author, isbn, genre, year) in [
            (
                "gatsby",
                "The Great Gatsby",
                "F. Scott Fitzgerald",
                "978-0-7432-7356-5",
                "Fiction",
                1925,
            ),
            (
                "dune",
                "Dune",
                "Frank Herbert",
                "978-0-441-01359-3",
                "Science Fiction",
                1965,
            ),
            (
                "time",
                "A Brief History of Time",
                "Stephen Hawking",
                "978-0-553-38016-3",
                "Science",
                1988,
            ),
        ] {
            let isbn = Isbn::parse(isbn).unwrap();
            catalog
                .add_book(Book::new(title, author, isbn.clone(), genre, year))
                .unwrap();
            isbns.insert(key, isbn);
        }

        catalog.add_member(Member::faculty("Alice Smith", ALICE)).unwrap();
        catalog
            .add_member(Member::student("Charlie Brown", CHARLIE))
            .unwrap();
        catalog
            .add_member(Member::with_policy("Dana Lee", DANA, MemberPolicy::regular()))
            .unwrap();

        Self { catalog, isbns }
    }

    /// 貸出済みの状態を含むCatalog:
    /// ```text
    /// 2025-01-01 dune   → Charlie (due 2025-01-15)
    /// 2025-01-02 time   → Charlie, 2025-01-05 returned
    /// 2025-01-10 gatsby → Alice   (due 2025-02-09)
    /// ```
    pub fn with_loans() -> Self {
        let mut tc = Self::standard();
        let dune = tc.isbn("dune");
        let time = tc.isbn("time");
        let gatsby = tc.isbn("gatsby");

        tc.catalog.check_out_on(&dune, CHARLIE, date(2025, 1, 1)).unwrap();
        tc.catalog.check_out_on(&time, CHARLIE, date(2025, 1, 2)).unwrap();
        tc.catalog.return_book_on(&time, CHARLIE, date(2025, 1, 5)).unwrap();
        tc.catalog.check_out_on(&gatsby, ALICE, date(2025, 1, 10)).unwrap();
        tc
    }

    pub fn isbn(&self, key: &str) -> Isbn {
        self.isbns[key].clone()
    }

    /// InMemoryRepoにCatalogを保存してCatalogServiceを返す。
    pub fn service_with_catalog(catalog: &Catalog) -> CatalogService<InMemoryRepo> {
        let repo = InMemoryRepo::new();
        repo.save(catalog).unwrap();
        CatalogService::new(repo)
    }
}

// =============================================================================
// Assertion helpers
// =============================================================================

/// 結果がErrで、メッセージに指定文字列を含むことをassert。
#[allow(dead_code)]
pub fn assert_error_contains<T: std::fmt::Debug>(
    result: Result<T, impl std::fmt::Display>,
    expected: &str,
) {
    match result {
        Err(e) => {
            let msg = e.to_string();
            assert!(
                msg.contains(expected),
                "Expected error containing '{expected}', got: '{msg}'"
            );
        }
        Ok(v) => panic!("Expected error containing '{expected}', got Ok({v:?})"),
    }
}
