//! Fixed choice sets stored as their display labels.

macro_rules! choice_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? } default $default:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Every label, in declaration order; offered to clients as choices.
            pub fn labels() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($label => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }
    };
}

choice_enum!(PaymentMode {
    Cash => "Cash",
    BankTransfer => "Bank Transfer",
    Upi => "UPI",
    Cheque => "Cheque",
} default Cash);

choice_enum!(PaymentStatus {
    Paid => "Paid",
    Pending => "Pending",
    Partial => "Partial",
} default Pending);

choice_enum!(AttendanceStatus {
    Present => "Present",
    Absent => "Absent",
    Leave => "Leave",
    HalfDay => "Half Day",
} default Present);

choice_enum!(NoticeCategory {
    General => "General",
    Academic => "Academic",
    Event => "Event",
    Holiday => "Holiday",
    Exam => "Exam",
} default General);

choice_enum!(NoticePriority {
    Low => "Low",
    Medium => "Medium",
    High => "High",
} default Medium);

choice_enum!(Audience {
    All => "All",
    Students => "Students",
    Teachers => "Teachers",
    Parents => "Parents",
} default All);

choice_enum!(GalleryCategory {
    Building => "Building",
    Students => "Students",
    Events => "Events",
    Sports => "Sports",
    AnnualDay => "Annual Day",
    Other => "Other",
} default Other);

choice_enum!(VerificationStatus {
    Pending => "Pending",
    Verified => "Verified",
    Rejected => "Rejected",
} default Pending);
