/// Render an amount in minor units as pounds, e.g. `1234` -> `£12.34`.
pub fn format_pence(amount_pence: i64) -> String {
    let sign = if amount_pence < 0 { "-" } else { "" };
    let abs = amount_pence.unsigned_abs();
    format!("{}£{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_whole_and_fractional_pounds() {
        assert_eq!(format_pence(0), "£0.00");
        assert_eq!(format_pence(5), "£0.05");
        assert_eq!(format_pence(1234), "£12.34");
        assert_eq!(format_pence(250000), "£2500.00");
    }

    #[test]
    fn formats_negative_amounts() {
        assert_eq!(format_pence(-5), "-£0.05");
        assert_eq!(format_pence(-1999), "-£19.99");
    }

    #[test]
    fn handles_extremes_without_overflow() {
        assert!(format_pence(i64::MIN).starts_with("-£"));
    }
}
