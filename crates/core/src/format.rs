use rust_decimal::Decimal;

pub const NOT_AVAILABLE: &str = "N/D";

/// Colombian peso amount with dot thousands and comma decimals: `$1.234.567,80 COP`.
pub fn format_cop(value: Option<Decimal>) -> String {
    let Some(value) = value else {
        return NOT_AVAILABLE.to_string();
    };

    let rounded = value.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let plain = format!("{:.2}", rounded.abs());
    let (integer, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    format!("${sign}{grouped},{fraction} COP")
}
