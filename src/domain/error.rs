use super::model::id::{Isbn, MemberId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("book with ISBN '{0}' not found")]
    BookNotFound(Isbn),

    #[error("member with ID {0} not found")]
    MemberNotFound(MemberId),

    #[error("'{title}' is currently checked out")]
    BookUnavailable { isbn: Isbn, title: String },

    #[error("book with ISBN '{0}' is not checked out")]
    BookNotCheckedOut(Isbn),

    #[error("member {member_id} does not have book '{isbn}'")]
    WrongMember { isbn: Isbn, member_id: MemberId },

    #[error("{member_name} has reached the checkout limit of {limit} books")]
    CheckoutLimitExceeded { member_name: String, limit: usize },

    #[error("due date for {member_name} is out of range ({days} days)")]
    DueDateOutOfRange { member_name: String, days: u32 },

    #[error("book with ISBN '{0}' already exists")]
    DuplicateBook(Isbn),

    #[error("member with ID {0} already exists")]
    DuplicateMember(MemberId),

    #[error("invalid {kind}: '{value}'")]
    InvalidIdentifier { kind: &'static str, value: String },
}
