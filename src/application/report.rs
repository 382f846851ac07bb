use chrono::NaiveDate;

use crate::domain::model::book::Book;
use crate::domain::model::catalog::Catalog;
use crate::domain::model::member::Member;

use super::service::SearchField;

/// Catalog → 人が読むMarkdownテキストへの変換
pub struct ReportService;

impl ReportService {
    /// 全蔵書と貸出状態の一覧。
    pub fn render_books(catalog: &Catalog) -> String {
        let mut buf = format!(
            "# {} ({} books, {} available)\n\n",
            catalog.name(),
            catalog.book_count(),
            catalog.available_count()
        );
        if catalog.book_count() == 0 {
            buf.push_str("No books in the library!\n");
            return buf;
        }
        for (i, book) in catalog.books().enumerate() {
            buf.push_str(&format!("{}. {}\n", i + 1, book));
            match (book.checked_out_by(), book.due_date()) {
                (Some(holder_id), Some(due)) => {
                    let holder = catalog
                        .get_member(holder_id)
                        .map(|m| m.name().to_string())
                        .unwrap_or_else(|| format!("member {holder_id}"));
                    buf.push_str(&format!(
                        "   Status: Checked out by {} (Due: {})\n",
                        holder, due
                    ));
                }
                _ => buf.push_str("   Status: Available\n"),
            }
        }
        buf
    }

    /// 会員情報・保有本・貸出履歴。
    pub fn render_member(catalog: &Catalog, member: &Member) -> String {
        let mut buf = format!("## {}\n\n", member);

        buf.push_str("Holding:\n");
        if member.checked_books().is_empty() {
            buf.push_str("- (none)\n");
        }
        for isbn in member.checked_books() {
            match catalog.get_book(isbn) {
                Some(book) => {
                    let due = book
                        .due_date()
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "?".to_string());
                    buf.push_str(&format!("- {} (ISBN {}, due {})\n", book.title(), isbn, due));
                }
                None => buf.push_str(&format!("- ISBN {} (removed from catalog)\n", isbn)),
            }
        }

        buf.push('\n');
        buf.push_str(&Self::render_history(catalog, member));
        buf
    }

    /// 貸出履歴。返却済みも含めて古い順。
    pub fn render_history(catalog: &Catalog, member: &Member) -> String {
        let history = member.checkout_history();
        if history.is_empty() {
            return "No checkout history\n".to_string();
        }
        let mut buf = format!(
            "### Checkout history for {} ({} total)\n\n",
            member.name(),
            member.total_books_checked_out()
        );
        for (i, record) in history.iter().enumerate() {
            let title = catalog
                .get_book(record.isbn())
                .map(|b| b.title().to_string())
                .unwrap_or_else(|| record.isbn().to_string());
            let status = match record.return_date() {
                Some(d) => format!("Returned: {d}"),
                None => "Currently checked out".to_string(),
            };
            buf.push_str(&format!(
                "{}. {} - Checked out: {} - {}\n",
                i + 1,
                title,
                record.checkout_date(),
                status
            ));
        }
        buf
    }

    pub fn render_search(field: SearchField, query: &str, books: &[Book]) -> String {
        let label = match field {
            SearchField::Title => "title",
            SearchField::Author => "author",
            SearchField::Genre => "genre",
        };
        if books.is_empty() {
            return format!("No books found with {label} matching '{query}'\n");
        }
        let mut buf = format!("# Books with {label} matching '{query}' ({})\n\n", books.len());
        for book in books {
            buf.push_str(&format!("- {}\n", book));
        }
        buf
    }

    pub fn render_overdue(catalog: &Catalog, books: &[Book], today: NaiveDate) -> String {
        if books.is_empty() {
            return "No books found passing due date\n".to_string();
        }
        let mut buf = format!("# Overdue books as of {} ({})\n\n", today, books.len());
        for book in books {
            let Some(due) = book.due_date() else {
                continue;
            };
            let days = (today - due).num_days();
            let holder = book
                .checked_out_by()
                .map(|id| {
                    catalog
                        .get_member(id)
                        .map(|m| m.name().to_string())
                        .unwrap_or_else(|| format!("member {id}"))
                })
                .unwrap_or_else(|| "?".to_string());
            buf.push_str(&format!(
                "- '{}' is overdue by {} days (due: {}), held by {}\n",
                book.title(),
                days,
                due,
                holder
            ));
        }
        buf
    }
}
