/// Format a float as a comma-free dollar amount: -$1234.56
pub fn dollars(val: f64) -> String {
    let cents = format!("{:.2}", val.abs());
    if val < 0.0 && cents != "0.00" {
        format!("-${cents}")
    } else {
        format!("${cents}")
    }
}

/// Format a count with thousands separators: 12,345
pub fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut with_commas = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    with_commas.chars().rev().collect()
}

/// Cut `text` to `max` characters, marking the cut with "...".
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    format!("{head}...")
}
