//! pt-BR currency formatting.

/// Format a monetary amount as Brazilian reais: `R$ 1.234,56`.
///
/// Non-finite values render as `R$ 0,00` — a broken amount must not take the
/// whole row with it.
pub fn format_brl(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let mut integer = (cents / 100).to_string();
    let fraction = cents % 100;

    // Group thousands with '.'
    let mut grouped = String::new();
    while integer.len() > 3 {
        let split = integer.len() - 3;
        grouped = format!(".{}{}", &integer[split..], grouped);
        integer.truncate(split);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}R$ {integer}{grouped},{fraction:02}")
}

/// Missing values display as zero.
pub fn format_brl_opt(value: Option<f64>) -> String {
    format_brl(value.unwrap_or(0.0))
}
