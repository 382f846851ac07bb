/// 貸出ポリシーの問い合わせ口。Catalogはこのtraitだけを見る。
pub trait CheckoutPolicy {
    fn type_name(&self) -> &str;
    fn checkout_limit(&self) -> usize;
    fn checkout_days(&self) -> u32;
}

/// 種別固定のポリシー。数値は種別ごとの定数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Member,
    Student,
    Faculty,
    RegularMember,
}

impl MemberKind {
    /// 永続化ドキュメントの `member_class` に書く名前。
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Member => "Member",
            Self::Student => "Student",
            Self::Faculty => "Faculty",
            Self::RegularMember => "RegularMember",
        }
    }

    pub fn from_class_name(s: &str) -> Option<Self> {
        match s {
            "Member" => Some(Self::Member),
            "Student" => Some(Self::Student),
            "Faculty" => Some(Self::Faculty),
            "RegularMember" => Some(Self::RegularMember),
            _ => None,
        }
    }
}

impl CheckoutPolicy for MemberKind {
    fn type_name(&self) -> &str {
        match self {
            Self::Member => "Member",
            Self::Student => "Student",
            Self::Faculty => "Faculty",
            Self::RegularMember => "Regular Member",
        }
    }

    fn checkout_limit(&self) -> usize {
        match self {
            Self::Member | Self::RegularMember => 3,
            Self::Student => 2,
            Self::Faculty => 5,
        }
    }

    fn checkout_days(&self) -> u32 {
        match self {
            Self::Member | Self::Student | Self::RegularMember => 14,
            Self::Faculty => 30,
        }
    }
}

/// 会員に後付けする差し替え可能なポリシー値。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPolicy {
    type_name: String,
    checkout_limit: usize,
    checkout_days: u32,
}

impl MemberPolicy {
    /// 独自ポリシーで受け付ける貸出期間の上限（日）。
    pub const MAX_CHECKOUT_DAYS: u32 = 3650;

    pub fn new(type_name: impl Into<String>, checkout_limit: usize, checkout_days: u32) -> Self {
        Self {
            type_name: type_name.into(),
            checkout_limit,
            checkout_days,
        }
    }

    pub fn student() -> Self {
        Self::from_kind(MemberKind::Student)
    }

    pub fn faculty() -> Self {
        Self::from_kind(MemberKind::Faculty)
    }

    pub fn regular() -> Self {
        Self::from_kind(MemberKind::RegularMember)
    }

    /// 種別名から既定ポリシーを引く。未知の名前はRegular Member扱い。
    pub fn preset(type_name: &str) -> Self {
        match type_name {
            "Student" => Self::student(),
            "Faculty" => Self::faculty(),
            _ => Self::regular(),
        }
    }

    pub fn from_kind(kind: MemberKind) -> Self {
        Self::new(kind.type_name(), kind.checkout_limit(), kind.checkout_days())
    }
}

impl CheckoutPolicy for MemberPolicy {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn checkout_limit(&self) -> usize {
        self.checkout_limit
    }

    fn checkout_days(&self) -> u32 {
        self.checkout_days
    }
}

/// 会員に結び付いたポリシー。固定種別か後付けの値のどちらか。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    Fixed(MemberKind),
    Attached(MemberPolicy),
}

impl Policy {
    pub const COMPOSITION_CLASS: &'static str = "MemberComposition";

    /// 永続化ドキュメントの `member_class`。
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Fixed(kind) => kind.class_name(),
            Self::Attached(_) => Self::COMPOSITION_CLASS,
        }
    }

    /// 同じ表現のまま別種別へ切り替えたポリシーを返す。
    pub(crate) fn switched_to(&self, kind: MemberKind) -> Self {
        match self {
            Self::Fixed(_) => Self::Fixed(kind),
            Self::Attached(_) => Self::Attached(MemberPolicy::from_kind(kind)),
        }
    }

    fn inner(&self) -> &dyn CheckoutPolicy {
        match self {
            Self::Fixed(kind) => kind,
            Self::Attached(policy) => policy,
        }
    }
}

impl CheckoutPolicy for Policy {
    fn type_name(&self) -> &str {
        self.inner().type_name()
    }

    fn checkout_limit(&self) -> usize {
        self.inner().checkout_limit()
    }

    fn checkout_days(&self) -> u32 {
        self.inner().checkout_days()
    }
}

impl From<MemberKind> for Policy {
    fn from(kind: MemberKind) -> Self {
        Self::Fixed(kind)
    }
}

impl From<MemberPolicy> for Policy {
    fn from(policy: MemberPolicy) -> Self {
        Self::Attached(policy)
    }
}
