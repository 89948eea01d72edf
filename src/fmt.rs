/// Format a float as a dollar amount with thousands separators: $1,234.56
pub fn money(val: f64) -> String {
    let cents = (val.abs() * 100.0).round() as i64;
    let (dollars, rem) = (cents / 100, cents % 100);

    let digits = dollars.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    let sign = if cents > 0 && val < 0.0 { "-" } else { "" };
    format!("{sign}${out}.{rem:02}")
}

/// Render a [0,1] confidence as a whole percentage: 0.92 -> "92%"
pub fn percent(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}
