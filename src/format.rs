// 💰 Rupee formatting for the console
//
// Indian digit grouping: the last three digits, then pairs.
//   123456.0   -> ₹1,23,456.00
//   2_50_000.0 -> ₹2.50L   (compact)

/// Group an unsigned integer string the Indian way: 12345678 -> 1,23,45,678
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);

    let mut pairs = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (front, back) = rest.split_at(rest.len() - 2);
        pairs.push(back);
        rest = front;
    }
    pairs.push(rest);
    pairs.reverse();

    format!("{},{}", pairs.join(","), tail)
}

/// Full amount with paise: ₹1,23,456.00
pub fn format_inr(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", amount.abs());
    let (whole, paise) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    format!("{sign}₹{}.{paise}", group_indian(whole))
}

/// Short form for dense tables: ₹1.5K, ₹2.50L, ₹1.20Cr
pub fn format_inr_compact(amount: f64) -> String {
    const THOUSAND: f64 = 1_000.0;
    const LAKH: f64 = 1_00_000.0;
    const CRORE: f64 = 1_00_00_000.0;

    let sign = if amount < 0.0 { "-" } else { "" };
    let magnitude = amount.abs();

    if magnitude >= CRORE {
        format!("{sign}₹{:.2}Cr", magnitude / CRORE)
    } else if magnitude >= LAKH {
        format!("{sign}₹{:.2}L", magnitude / LAKH)
    } else if magnitude >= THOUSAND {
        format!("{sign}₹{:.1}K", magnitude / THOUSAND)
    } else {
        // Small amounts keep up to two decimals, trailing zeros dropped
        let fixed = format!("{:.2}", magnitude);
        let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
        format!("{sign}₹{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indian_grouping() {
        assert_eq!(format_inr(0.0), "₹0.00");
        assert_eq!(format_inr(999.5), "₹999.50");
        assert_eq!(format_inr(1000.0), "₹1,000.00");
        assert_eq!(format_inr(123456.0), "₹1,23,456.00");
        assert_eq!(format_inr(12345678.9), "₹1,23,45,678.90");
        assert_eq!(format_inr(-2500.0), "-₹2,500.00");
    }

    #[test]
    fn test_compact_thresholds() {
        assert_eq!(format_inr_compact(950.0), "₹950");
        assert_eq!(format_inr_compact(99.25), "₹99.25");
        assert_eq!(format_inr_compact(1500.0), "₹1.5K");
        assert_eq!(format_inr_compact(99_999.0), "₹100.0K");
        assert_eq!(format_inr_compact(2_50_000.0), "₹2.50L");
        assert_eq!(format_inr_compact(1_20_00_000.0), "₹1.20Cr");
    }

    #[test]
    fn test_compact_negative_amounts_keep_thresholds() {
        assert_eq!(format_inr_compact(-5000.0), "-₹5.0K");
        assert_eq!(format_inr_compact(-2_50_000.0), "-₹2.50L");
        assert_eq!(format_inr_compact(-1_20_00_000.0), "-₹1.20Cr");
        assert_eq!(format_inr_compact(-99.5), "-₹99.5");
    }
}
