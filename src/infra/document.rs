//! Catalog <-> 永続化ドキュメントの変換。
//!
//! 本と会員の相互参照はISBN / 会員IDに平坦化して書き出し、
//! 読み込み時に3パスで再接続する。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::model::book::{AvailabilityStatus, Book};
use crate::domain::model::catalog::{self, Catalog};
use crate::domain::model::id::{Isbn, MemberId};
use crate::domain::model::member::{CheckoutRecord, Member};
use crate::domain::model::policy::{CheckoutPolicy, MemberKind, MemberPolicy, Policy};

pub const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid {field} '{value}' in record {owner}: {source}")]
    InvalidDate {
        field: &'static str,
        owner: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub library_name: String,
    #[serde(default)]
    pub books: Vec<BookRecord>,
    #[serde(default)]
    pub members: Vec<MemberRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub genre: String,
    pub publication_year: i32,
    pub availability_status: AvailabilityStatus,
    #[serde(default)]
    pub checked_out_by_id: Option<u32>,
    #[serde(default)]
    pub due_date: Option<String>,
}

/// 会員レコード。保有中の本は本レコード側の `checked_out_by_id` から復元するため、
/// `checked_book_isbns` は読み込みでは参照しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub name: String,
    pub member_id: u32,
    #[serde(default)]
    pub member_class: String,
    #[serde(default)]
    pub member_type: Option<String>,
    #[serde(default)]
    pub checkout_limit: Option<usize>,
    #[serde(default)]
    pub checkout_days: Option<u32>,
    #[serde(default)]
    pub checked_book_isbns: Vec<String>,
    #[serde(default)]
    pub checkout_history: Vec<HistoryRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub book_isbn: String,
    #[serde(default)]
    pub checkout_date: Option<String>,
    #[serde(default)]
    pub return_date: Option<String>,
}

impl CatalogDocument {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self {
            library_name: catalog.name().to_string(),
            books: catalog.books().map(BookRecord::from_book).collect(),
            members: catalog.members().map(MemberRecord::from_member).collect(),
        }
    }

    pub fn into_catalog(self) -> Result<Catalog, DocumentError> {
        self.into_catalog_on(catalog::today())
    }

    /// 3パスで復元する。`today` は `checkout_date` 欠落時の補完値。
    ///
    /// 1. 本（貸出状態は保留）
    /// 2. 会員（`member_class` からポリシーを選ぶ）
    /// 3. 貸出関係と履歴の再接続（解決できない参照はその1件だけ捨てる）
    pub fn into_catalog_on(self, today: NaiveDate) -> Result<Catalog, DocumentError> {
        let mut catalog = Catalog::new(self.library_name);

        let mut loans = Vec::new();
        for record in &self.books {
            let Ok(isbn) = Isbn::parse(&record.isbn) else {
                tracing::warn!(isbn = %record.isbn, "skipping book record with invalid ISBN");
                continue;
            };
            let due_date = parse_date(record.due_date.as_deref(), "due_date", &record.isbn)?;
            let book = Book::new(
                record.title.as_str(),
                record.author.as_str(),
                isbn.clone(),
                record.genre.as_str(),
                record.publication_year,
            );
            if let Err(e) = catalog.add_book(book) {
                tracing::warn!(error = %e, "skipping book record");
                continue;
            }
            match (record.availability_status, record.checked_out_by_id, due_date) {
                (AvailabilityStatus::CheckedOut, Some(holder), Some(due)) => {
                    loans.push((isbn, MemberId::new(holder), due));
                }
                (AvailabilityStatus::CheckedOut, _, _) => {
                    tracing::warn!(%isbn, "checked-out book without holder or due date, restored as available");
                }
                (AvailabilityStatus::Available, Some(holder), _) => {
                    tracing::warn!(%isbn, holder, "available book carries a holder, ignored");
                }
                (AvailabilityStatus::Available, None, _) => {}
            }
        }

        let mut accepted = Vec::new();
        for record in &self.members {
            let member = record.to_member();
            let id = member.id();
            match catalog.add_member(member) {
                Ok(()) => accepted.push((id, record)),
                Err(e) => tracing::warn!(error = %e, "skipping member record"),
            }
        }

        for (isbn, member_id, due_date) in loans {
            if !catalog.restore_loan(&isbn, member_id, due_date) {
                tracing::warn!(%isbn, %member_id, "holder not found, book restored as available");
            }
        }

        for (member_id, record) in accepted {
            for entry in &record.checkout_history {
                let Ok(isbn) = Isbn::parse(&entry.book_isbn) else {
                    tracing::warn!(%member_id, isbn = %entry.book_isbn, "skipping history entry with invalid ISBN");
                    continue;
                };
                let checkout_date =
                    parse_date(entry.checkout_date.as_deref(), "checkout_date", &entry.book_isbn)?
                        .unwrap_or(today);
                let return_date =
                    parse_date(entry.return_date.as_deref(), "return_date", &entry.book_isbn)?;
                let restored = catalog.restore_record(
                    member_id,
                    CheckoutRecord::new(isbn.clone(), checkout_date, return_date),
                );
                if !restored {
                    tracing::warn!(%member_id, %isbn, "history entry references a missing book, skipped");
                }
            }
        }

        Ok(catalog)
    }
}

impl BookRecord {
    fn from_book(book: &Book) -> Self {
        Self {
            title: book.title().to_string(),
            author: book.author().to_string(),
            isbn: book.isbn().to_string(),
            genre: book.genre().to_string(),
            publication_year: book.publication_year(),
            availability_status: book.status(),
            checked_out_by_id: book.checked_out_by().map(|id| id.get()),
            due_date: book.due_date().map(format_date),
        }
    }
}

impl MemberRecord {
    fn from_member(member: &Member) -> Self {
        Self {
            name: member.name().to_string(),
            member_id: member.id().get(),
            member_class: member.policy().class_name().to_string(),
            member_type: Some(member.type_name().to_string()),
            checkout_limit: Some(member.checkout_limit()),
            checkout_days: Some(member.checkout_days()),
            checked_book_isbns: member
                .checked_books()
                .iter()
                .map(|isbn| isbn.to_string())
                .collect(),
            checkout_history: member
                .checkout_history()
                .iter()
                .map(|r| HistoryRecord {
                    book_isbn: r.isbn().to_string(),
                    checkout_date: Some(format_date(r.checkout_date())),
                    return_date: r.return_date().map(format_date),
                })
                .collect(),
        }
    }

    /// `member_class` から会員を作る。未知のクラスは基本会員に落とす。
    fn to_member(&self) -> Member {
        let id = MemberId::new(self.member_id);
        if let Some(kind) = MemberKind::from_class_name(&self.member_class) {
            return Member::new(self.name.as_str(), id, kind);
        }
        if self.member_class == Policy::COMPOSITION_CLASS {
            return Member::with_policy(self.name.as_str(), id, self.attached_policy());
        }
        tracing::warn!(
            member_id = self.member_id,
            member_class = %self.member_class,
            "unknown member class, loading as base member"
        );
        Member::basic(self.name.as_str(), id)
    }

    fn attached_policy(&self) -> MemberPolicy {
        let type_name = self.member_type.as_deref().unwrap_or("Regular Member");
        match (self.checkout_limit, self.checkout_days) {
            (Some(_), Some(days)) if days > MemberPolicy::MAX_CHECKOUT_DAYS => {
                tracing::warn!(
                    member_id = self.member_id,
                    days,
                    "checkout_days out of range, using preset policy"
                );
                MemberPolicy::preset(type_name)
            }
            (Some(limit), Some(days)) => MemberPolicy::new(type_name, limit, days),
            _ => MemberPolicy::preset(type_name),
        }
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

/// null・欠落・空文字はNone。それ以外で解析できなければエラー。
fn parse_date(
    value: Option<&str>,
    field: &'static str,
    owner: &str,
) -> Result<Option<NaiveDate>, DocumentError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, DATE_FMT)
            .map(Some)
            .map_err(|source| DocumentError::InvalidDate {
                field,
                owner: owner.to_string(),
                value: s.to_string(),
                source,
            }),
    }
}
