#![forbid(unsafe_code)]

//! Monetary amounts and cash denominations.
//!
//! Amounts are whole dollars stored as `u64`. The reference budget is
//! 32 million, far below any overflow concern, but arithmetic on sums still
//! uses saturating operations.

/// A whole-dollar amount.
pub type Amount = u64;

/// Format an amount with a leading `$` and comma thousands separators.
///
/// ```
/// use allot_core::money::format_amount;
/// assert_eq!(format_amount(32_000_000), "$32,000,000");
/// assert_eq!(format_amount(0), "$0");
/// ```
pub fn format_amount(amount: Amount) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push('$');
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// A draggable cash denomination (one bill of `value` dollars).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denomination {
    /// Short label printed on the bill, e.g. `$10M`.
    pub label: String,
    /// Value of one bill.
    pub value: Amount,
}

impl Denomination {
    /// Create a new denomination.
    pub fn new(label: impl Into<String>, value: Amount) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }

    /// How many whole bills of this denomination fit in `remaining`.
    #[inline]
    pub fn bills_in(&self, remaining: Amount) -> u64 {
        if self.value == 0 {
            return 0;
        }
        remaining / self.value
    }

    /// The four stacks offered by the reference deployment.
    pub fn reference_set() -> Vec<Denomination> {
        vec![
            Denomination::new("$10M", 10_000_000),
            Denomination::new("$5M", 5_000_000),
            Denomination::new("$1M", 1_000_000),
            Denomination::new("$100K", 100_000),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_thousands_groups() {
        assert_eq!(format_amount(7), "$7");
        assert_eq!(format_amount(999), "$999");
        assert_eq!(format_amount(1_000), "$1,000");
        assert_eq!(format_amount(100_000), "$100,000");
        assert_eq!(format_amount(1_234_567), "$1,234,567");
    }

    #[test]
    fn bills_in_remaining() {
        let ten = Denomination::new("$10M", 10_000_000);
        assert_eq!(ten.bills_in(32_000_000), 3);
        assert_eq!(ten.bills_in(9_999_999), 0);
        assert_eq!(Denomination::new("free", 0).bills_in(5), 0);
    }

    #[test]
    fn reference_set_is_descending() {
        let set = Denomination::reference_set();
        assert_eq!(set.len(), 4);
        assert!(set.windows(2).all(|w| w[0].value > w[1].value));
    }
}
