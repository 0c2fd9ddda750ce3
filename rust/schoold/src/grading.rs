//! Percentage and letter-grade derivation for exam results.
//!
//! Marks are integer hundredths (see [`crate::decimal`]). Grade bands are
//! decided on the exact ratio, the stored percentage is the ratio quantized
//! to two places with round-half-even.

use thiserror::Error;

/// Largest value a marks field can hold: five digits, two of them fractional.
pub const MAX_MARKS_HUNDREDTHS: i64 = 99_999;

/// Overall percentage at or above which a report card passes.
pub const PASS_PERCENT: i64 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    APlus,
    A,
    BPlus,
    B,
    C,
    D,
    F,
}

/// Lower percentage bound of each band, best first. F takes the remainder.
const BANDS: [(i64, Grade); 6] = [
    (90, Grade::APlus),
    (80, Grade::A),
    (70, Grade::BPlus),
    (60, Grade::B),
    (50, Grade::C),
    (40, Grade::D),
];

impl Grade {
    pub fn from_ratio(obtained: i64, total: i64) -> Self {
        if total <= 0 {
            return Grade::F;
        }
        // obtained / total * 100 >= bound  <=>  obtained * 100 >= bound * total
        let scaled = i128::from(obtained) * 100;
        for (bound, grade) in BANDS {
            if scaled >= i128::from(bound) * i128::from(total) {
                return grade;
            }
        }
        Grade::F
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GradingError {
    #[error("total marks must be greater than zero")]
    NonPositiveTotal,
    #[error("marks obtained must not be negative")]
    NegativeObtained,
    #[error("marks obtained must not exceed total marks")]
    ObtainedExceedsTotal,
    #[error("marks must not exceed 999.99")]
    OutOfRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Graded {
    pub percentage_hundredths: i64,
    pub grade: Grade,
}

/// `obtained / total * 100` in hundredths, rounded half-to-even.
/// Returns 0 when `total` is not positive.
pub fn percentage_hundredths(obtained: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    let num = i128::from(obtained) * 10_000;
    let den = i128::from(total);
    let q = num / den;
    let r = num % den;
    let rounded = match (2 * r).cmp(&den) {
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal if q % 2 != 0 => q + 1,
        _ => q,
    };
    rounded as i64
}

pub fn compute(obtained: i64, total: i64) -> Result<Graded, GradingError> {
    if total <= 0 {
        return Err(GradingError::NonPositiveTotal);
    }
    if obtained < 0 {
        return Err(GradingError::NegativeObtained);
    }
    if obtained > MAX_MARKS_HUNDREDTHS || total > MAX_MARKS_HUNDREDTHS {
        return Err(GradingError::OutOfRange);
    }
    if obtained > total {
        return Err(GradingError::ObtainedExceedsTotal);
    }
    Ok(Graded {
        percentage_hundredths: percentage_hundredths(obtained, total),
        grade: Grade::from_ratio(obtained, total),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    Pass,
    Fail,
}

impl PassStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PassStatus::Pass => "PASS",
            PassStatus::Fail => "FAIL",
        }
    }
}

/// Aggregate over one student's verified subject results for one exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportCard {
    pub obtained_hundredths: i64,
    pub total_hundredths: i64,
    pub percentage_hundredths: i64,
    pub grade: Grade,
    pub status: PassStatus,
    pub subjects: usize,
}

impl ReportCard {
    pub fn summarize<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        let mut obtained = 0i64;
        let mut total = 0i64;
        let mut subjects = 0usize;
        for (o, t) in rows {
            obtained += o;
            total += t;
            subjects += 1;
        }
        let passed =
            total > 0 && i128::from(obtained) * 100 >= i128::from(PASS_PERCENT) * i128::from(total);
        ReportCard {
            obtained_hundredths: obtained,
            total_hundredths: total,
            percentage_hundredths: percentage_hundredths(obtained, total),
            grade: Grade::from_ratio(obtained, total),
            status: if passed {
                PassStatus::Pass
            } else {
                PassStatus::Fail
            },
            subjects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges_are_inclusive() {
        assert_eq!(Grade::from_ratio(9000, 10000), Grade::APlus);
        assert_eq!(Grade::from_ratio(8999, 10000), Grade::A);
        assert_eq!(Grade::from_ratio(8000, 10000), Grade::A);
        assert_eq!(Grade::from_ratio(7000, 10000), Grade::BPlus);
        assert_eq!(Grade::from_ratio(6000, 10000), Grade::B);
        assert_eq!(Grade::from_ratio(5000, 10000), Grade::C);
        assert_eq!(Grade::from_ratio(4000, 10000), Grade::D);
        assert_eq!(Grade::from_ratio(3999, 10000), Grade::F);
        assert_eq!(Grade::from_ratio(0, 10000), Grade::F);
    }

    #[test]
    fn grade_uses_exact_ratio_not_rounded_percentage() {
        // 89.995% rounds to 90.00 for display but is still an A.
        let g = compute(17999, 20000).expect("valid marks");
        assert_eq!(g.percentage_hundredths, 9000);
        assert_eq!(g.grade, Grade::A);
    }

    #[test]
    fn percentage_rounds_half_to_even() {
        // 1/8 = 12.5% exactly; 1/16 = 6.25%; 1/32 = 3.125% -> 3.12; 3/32 = 9.375% -> 9.38
        assert_eq!(percentage_hundredths(100, 800), 1250);
        assert_eq!(percentage_hundredths(100, 1600), 625);
        assert_eq!(percentage_hundredths(100, 3200), 312);
        assert_eq!(percentage_hundredths(300, 3200), 938);
        // 2/3 = 66.666..% -> 66.67
        assert_eq!(percentage_hundredths(200, 300), 6667);
        assert_eq!(percentage_hundredths(5, 0), 0);
    }

    #[test]
    fn compute_is_idempotent() {
        let a = compute(4550, 5000).expect("valid");
        let b = compute(4550, 5000).expect("valid");
        assert_eq!(a, b);
        assert_eq!(a.percentage_hundredths, 9100);
        assert_eq!(a.grade, Grade::APlus);
    }

    #[test]
    fn compute_validates_inputs() {
        assert_eq!(compute(10, 0), Err(GradingError::NonPositiveTotal));
        assert_eq!(compute(-1, 100), Err(GradingError::NegativeObtained));
        assert_eq!(compute(101, 100), Err(GradingError::ObtainedExceedsTotal));
        assert_eq!(compute(100, 100_000), Err(GradingError::OutOfRange));
        assert!(compute(0, 100).is_ok());
    }

    #[test]
    fn report_card_totals_and_status() {
        let card = ReportCard::summarize([(8000, 10000), (3000, 10000)]);
        assert_eq!(card.obtained_hundredths, 11000);
        assert_eq!(card.total_hundredths, 20000);
        assert_eq!(card.percentage_hundredths, 5500);
        assert_eq!(card.grade, Grade::C);
        assert_eq!(card.status, PassStatus::Pass);
        assert_eq!(card.subjects, 2);

        let failing = ReportCard::summarize([(3999, 10000)]);
        assert_eq!(failing.status, PassStatus::Fail);

        let empty = ReportCard::summarize(Vec::<(i64, i64)>::new());
        assert_eq!(empty.percentage_hundredths, 0);
        assert_eq!(empty.grade, Grade::F);
        assert_eq!(empty.status, PassStatus::Fail);
        assert_eq!(empty.subjects, 0);
    }
}
