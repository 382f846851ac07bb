use chrono::NaiveDate;

use super::id::{Isbn, MemberId};
use super::policy::{CheckoutPolicy, MemberKind, MemberPolicy, Policy};

/// 貸出履歴の1件。返却時に `return_date` だけが埋まる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRecord {
    isbn: Isbn,
    checkout_date: NaiveDate,
    return_date: Option<NaiveDate>,
}

impl CheckoutRecord {
    pub fn new(isbn: Isbn, checkout_date: NaiveDate, return_date: Option<NaiveDate>) -> Self {
        Self {
            isbn,
            checkout_date,
            return_date,
        }
    }

    pub fn isbn(&self) -> &Isbn {
        &self.isbn
    }

    pub fn checkout_date(&self) -> NaiveDate {
        self.checkout_date
    }

    pub fn return_date(&self) -> Option<NaiveDate> {
        self.return_date
    }

    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

/// 会員。保有中の本はISBNで持ち、Book本体はCatalogが所有する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    name: String,
    id: MemberId,
    policy: Policy,
    checked_books: Vec<Isbn>,
    checkout_history: Vec<CheckoutRecord>,
}

impl Member {
    pub fn new(name: impl Into<String>, id: MemberId, policy: impl Into<Policy>) -> Self {
        Self {
            name: name.into(),
            id,
            policy: policy.into(),
            checked_books: Vec::new(),
            checkout_history: Vec::new(),
        }
    }

    pub fn basic(name: impl Into<String>, id: MemberId) -> Self {
        Self::new(name, id, MemberKind::Member)
    }

    pub fn student(name: impl Into<String>, id: MemberId) -> Self {
        Self::new(name, id, MemberKind::Student)
    }

    pub fn faculty(name: impl Into<String>, id: MemberId) -> Self {
        Self::new(name, id, MemberKind::Faculty)
    }

    pub fn regular(name: impl Into<String>, id: MemberId) -> Self {
        Self::new(name, id, MemberKind::RegularMember)
    }

    pub fn with_policy(name: impl Into<String>, id: MemberId, policy: MemberPolicy) -> Self {
        Self::new(name, id, policy)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn checked_books(&self) -> &[Isbn] {
        &self.checked_books
    }

    pub fn checkout_history(&self) -> &[CheckoutRecord] {
        &self.checkout_history
    }

    pub fn has_book(&self, isbn: &Isbn) -> bool {
        self.checked_books.contains(isbn)
    }

    pub fn total_books_checked_out(&self) -> usize {
        self.checkout_history.len()
    }

    pub fn open_records(&self) -> impl Iterator<Item = &CheckoutRecord> + '_ {
        self.checkout_history.iter().filter(|r| r.is_open())
    }

    /// ポリシーを差し替える。保有本と履歴はそのまま。
    pub fn set_policy(&mut self, policy: impl Into<Policy>) {
        self.policy = policy.into();
    }

    pub fn upgrade_to_faculty(&mut self) {
        self.policy = self.policy.switched_to(MemberKind::Faculty);
    }

    pub fn downgrade_to_student(&mut self) {
        self.policy = self.policy.switched_to(MemberKind::Student);
    }

    // --- 内部操作（Catalog経由でのみ呼ばれる） ---

    pub(crate) fn record_checkout(&mut self, isbn: Isbn, today: NaiveDate) {
        self.checked_books.push(isbn.clone());
        self.checkout_history
            .push(CheckoutRecord::new(isbn, today, None));
    }

    /// 保有リストから外し、開いている履歴を閉じる。
    /// 開いている履歴が見つからなければfalse（保有状態の解除は行う）。
    pub(crate) fn record_return(&mut self, isbn: &Isbn, today: NaiveDate) -> bool {
        self.checked_books.retain(|held| held != isbn);
        match self
            .checkout_history
            .iter_mut()
            .find(|r| r.isbn == *isbn && r.is_open())
        {
            Some(record) => {
                record.return_date = Some(today);
                true
            }
            None => false,
        }
    }

    /// 読み込み時の再接続用。重複は追加しない。
    pub(crate) fn attach_book(&mut self, isbn: Isbn) {
        if !self.checked_books.contains(&isbn) {
            self.checked_books.push(isbn);
        }
    }

    pub(crate) fn push_record(&mut self, record: CheckoutRecord) {
        self.checkout_history.push(record);
    }
}

impl CheckoutPolicy for Member {
    fn type_name(&self) -> &str {
        self.policy.type_name()
    }

    fn checkout_limit(&self) -> usize {
        self.policy.checkout_limit()
    }

    fn checkout_days(&self) -> u32 {
        self.policy.checkout_days()
    }
}

impl std::fmt::Display for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} (ID: {}) - Books: {}/{}",
            self.type_name(),
            self.name,
            self.id,
            self.checked_books.len(),
            self.checkout_limit()
        )
    }
}
