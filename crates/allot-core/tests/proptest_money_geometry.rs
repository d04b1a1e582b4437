//! Property-based invariant tests for money formatting and geometry.
//!
//! 1. Formatting round-trips: stripping `$` and `,` yields the decimal digits.
//! 2. Separators appear every three digits from the right.
//! 3. Distance is symmetric and non-negative.
//! 4. A box always contains its own center when it has positive area.

use allot_core::geometry::{Bounds, Point, Size};
use allot_core::money::format_amount;
use proptest::prelude::*;

proptest! {
    #[test]
    fn format_strips_back_to_digits(amount in any::<u64>()) {
        let formatted = format_amount(amount);
        prop_assert!(formatted.starts_with('$'));
        let digits: String = formatted.chars().filter(|c| c.is_ascii_digit()).collect();
        prop_assert_eq!(digits, amount.to_string());
    }

    #[test]
    fn separator_groups_are_three_wide(amount in any::<u64>()) {
        let formatted = format_amount(amount);
        let groups: Vec<&str> = formatted[1..].split(',').collect();
        prop_assert!(!groups[0].is_empty() && groups[0].len() <= 3);
        for g in &groups[1..] {
            prop_assert_eq!(g.len(), 3);
        }
    }

    #[test]
    fn distance_symmetric(ax in -1e6f64..1e6, ay in -1e6f64..1e6, bx in -1e6f64..1e6, by in -1e6f64..1e6) {
        let a = Point::new(ax, ay);
        let b = Point::new(bx, by);
        prop_assert!(a.distance(&b) >= 0.0);
        prop_assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn bounds_contain_center(cx in -1e4f64..1e4, cy in -1e4f64..1e4, w in 0.01f64..1e3, h in 0.01f64..1e3) {
        let b = Bounds::centered_at(Point::new(cx, cy), Size::new(w, h));
        prop_assert!(b.contains(Point::new(cx, cy)));
    }
}
