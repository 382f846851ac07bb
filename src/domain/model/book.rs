use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::id::{Isbn, MemberId};

/// 貸出状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    CheckedOut,
}

/// 蔵書。書誌情報は不変、貸出状態はCatalog経由でのみ変わる。
///
/// `checked_out_by` と `due_date` は `status == CheckedOut` のときだけ両方Some。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    title: String,
    author: String,
    isbn: Isbn,
    genre: String,
    publication_year: i32,
    status: AvailabilityStatus,
    checked_out_by: Option<MemberId>,
    due_date: Option<NaiveDate>,
}

impl Book {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        isbn: Isbn,
        genre: impl Into<String>,
        publication_year: i32,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            isbn,
            genre: genre.into(),
            publication_year,
            status: AvailabilityStatus::Available,
            checked_out_by: None,
            due_date: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn isbn(&self) -> &Isbn {
        &self.isbn
    }

    pub fn genre(&self) -> &str {
        &self.genre
    }

    pub fn publication_year(&self) -> i32 {
        self.publication_year
    }

    pub fn status(&self) -> AvailabilityStatus {
        self.status
    }

    pub fn checked_out_by(&self) -> Option<MemberId> {
        self.checked_out_by
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn is_available(&self) -> bool {
        self.status == AvailabilityStatus::Available
    }

    pub fn is_checked_out(&self) -> bool {
        !self.is_available()
    }

    /// 貸出中かつ期限が `today` より前。
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_checked_out() && self.due_date.is_some_and(|due| due < today)
    }

    // --- 内部操作（Catalog経由でのみ呼ばれる） ---

    pub(crate) fn mark_checked_out(&mut self, member_id: MemberId, due_date: NaiveDate) {
        self.status = AvailabilityStatus::CheckedOut;
        self.checked_out_by = Some(member_id);
        self.due_date = Some(due_date);
    }

    pub(crate) fn mark_available(&mut self) {
        self.status = AvailabilityStatus::Available;
        self.checked_out_by = None;
        self.due_date = None;
    }
}

impl std::fmt::Display for Book {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} by {} ({}) - ISBN: {}",
            self.title, self.author, self.publication_year, self.isbn
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dune() -> Book {
        Book::new(
            "Dune",
            "Frank Herbert",
            Isbn::parse("978-0441172719").unwrap(),
            "Sci-Fi",
            1965,
        )
    }

    #[test]
    fn new_book_is_available() {
        let book = dune();
        assert!(book.is_available());
        assert!(book.checked_out_by().is_none());
        assert!(book.due_date().is_none());
    }

    #[test]
    fn mark_checked_out_then_available_clears_loan() {
        let mut book = dune();
        book.mark_checked_out(MemberId::new(7), date(2025, 3, 1));
        assert_eq!(book.status(), AvailabilityStatus::CheckedOut);
        assert_eq!(book.checked_out_by(), Some(MemberId::new(7)));

        book.mark_available();
        assert_eq!(book, dune());
    }

    #[test]
    fn overdue_is_strictly_after_due_date() {
        let mut book = dune();
        book.mark_checked_out(MemberId::new(7), date(2025, 3, 1));
        assert!(!book.is_overdue(date(2025, 3, 1)));
        assert!(book.is_overdue(date(2025, 3, 2)));
    }

    #[test]
    fn display_format() {
        assert_eq!(
            dune().to_string(),
            "Dune by Frank Herbert (1965) - ISBN: 978-0441172719"
        );
    }
}
