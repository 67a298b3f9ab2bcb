use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};

use slank_core::metrics::MealTotals;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// A proportional per-meal bar, one letter per column: B/L/D/S by share of
/// the day's calories. Empty when nothing was consumed.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn meal_bar(totals: &MealTotals, width: usize) -> String {
    let consumed = totals.consumed();
    if consumed <= 0.0 || width == 0 {
        return String::new();
    }
    let boundaries = [
        totals.breakfast,
        totals.breakfast + totals.lunch,
        totals.breakfast + totals.lunch + totals.dinner,
        consumed,
    ];
    let letters = ['B', 'L', 'D', 'S'];

    let mut bar = String::with_capacity(width);
    for i in 0..width {
        let p = (i as f64 + 0.5) / width as f64 * consumed;
        let idx = boundaries.iter().position(|&b| p < b).unwrap_or(3);
        bar.push(letters[idx]);
    }
    bar
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_meal_bar_proportions() {
        let totals = MealTotals {
            breakfast: 500.0,
            lunch: 500.0,
            dinner: 0.0,
            snack: 0.0,
        };
        assert_eq!(meal_bar(&totals, 10), "BBBBBLLLLL");
    }

    #[test]
    fn test_meal_bar_empty_day() {
        let totals = MealTotals {
            breakfast: 0.0,
            lunch: 0.0,
            dinner: 0.0,
            snack: 0.0,
        };
        assert_eq!(meal_bar(&totals, 10), "");
    }

    #[test]
    fn test_meal_bar_all_snack() {
        let totals = MealTotals {
            breakfast: 0.0,
            lunch: 0.0,
            dinner: 0.0,
            snack: 420.0,
        };
        assert_eq!(meal_bar(&totals, 4), "SSSS");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }
}
