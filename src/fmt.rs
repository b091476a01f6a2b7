use chrono::NaiveDate;

/// Format a float as Brazilian reais with thousands separators: R$ 1.234,56
pub fn money(val: f64) -> String {
    let negative = val < 0.0;
    let abs = val.abs();
    let cents = format!("{:.2}", abs);
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_dots = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_dots.push('.');
        }
        with_dots.push(c);
    }
    let with_dots: String = with_dots.chars().rev().collect();

    if negative {
        format!("-R$ {with_dots},{dec_part}")
    } else {
        format!("R$ {with_dots},{dec_part}")
    }
}

pub fn money_opt(val: Option<f64>) -> String {
    val.map(money).unwrap_or_default()
}

/// dd/mm/yyyy, blank when missing.
pub fn date_br(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d/%m/%Y").to_string()).unwrap_or_default()
}

pub fn status_label(cancelled: bool) -> &'static str {
    if cancelled {
        "Cancelled"
    } else {
        "Active"
    }
}

pub fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(1234.56), "R$ 1.234,56");
        assert_eq!(money(-500.00), "-R$ 500,00");
        assert_eq!(money(0.0), "R$ 0,00");
        assert_eq!(money(1000000.99), "R$ 1.000.000,99");
        assert_eq!(money(42.10), "R$ 42,10");
        assert_eq!(money_opt(None), "");
    }

    #[test]
    fn test_date_br() {
        assert_eq!(date_br(NaiveDate::from_ymd_opt(2025, 1, 9)), "09/01/2025");
        assert_eq!(date_br(None), "");
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "note", "notes"), "1 note");
        assert_eq!(plural(3, "note", "notes"), "3 notes");
    }
}
