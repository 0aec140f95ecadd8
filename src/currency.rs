pub const CURRENCY_SYMBOL: &str = "$";

/// Renders `1234.5` as `$1,234.50`. Cents round half away from zero.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i128;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();

    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{sign}{CURRENCY_SYMBOL}{grouped}.{:02}", cents % 100)
}
