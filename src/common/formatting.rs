// src/common/formatting.rs

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// "(11) 99999-0000" para celular, "(11) 9999-0000" para fixo; demais formatos passam intactos.
pub fn format_phone_display(raw: &str) -> String {
    let digits = digits_only(raw);
    match digits.len() {
        11 => format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..]),
        10 => format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
        _ => raw.to_string(),
    }
}

/// Formata em reais: "R$ 1.234,56".
pub fn format_brl(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((&text, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{}R$ {},{}", if negative { "-" } else { "" }, grouped, frac_part)
}

/// Aceita "R$ 1.234,56", "150,00", "150.5" e "1234".
pub fn parse_brl(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };
    Decimal::from_str(&normalized).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

// =========================================================================
//  DESSERIALIZADORES TOLERANTES (documentos antigos)
// =========================================================================

/// Valor monetário como número JSON ou texto em formato brasileiro.
pub fn money<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(Decimal::ZERO),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map_err(serde::de::Error::custom),
        Value::String(s) if s.trim().is_empty() => Ok(Decimal::ZERO),
        Value::String(s) => parse_brl(s)
            .ok_or_else(|| serde::de::Error::custom(format!("valor monetário inválido: {s}"))),
        other => Err(serde::de::Error::custom(format!("valor monetário inválido: {other}"))),
    }
}

/// Data ISO opcional; texto vazio vira `None`. Aceita também "dd/mm/aaaa".
pub fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_date(text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("data inválida: {text}"))),
    }
}

pub fn date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(raw.trim()).ok_or_else(|| serde::de::Error::custom(format!("data inválida: {raw}")))
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%d/%m/%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn phone_display() {
        assert_eq!(format_phone_display("11999990000"), "(11) 99999-0000");
        assert_eq!(format_phone_display("(11) 9999-0000"), "(11) 9999-0000");
        assert_eq!(format_phone_display("123"), "123");
    }

    #[test]
    fn brl_formatting_groups_thousands() {
        assert_eq!(format_brl(Decimal::new(123456, 2)), "R$ 1.234,56");
        assert_eq!(format_brl(Decimal::new(15, 0)), "R$ 15,00");
        assert_eq!(format_brl(Decimal::new(1234567890, 2)), "R$ 12.345.678,90");
    }

    #[test]
    fn brl_parsing_accepts_both_separators() {
        assert_eq!(parse_brl("R$ 1.234,56"), Some(Decimal::new(123456, 2)));
        assert_eq!(parse_brl("150,00"), Some(Decimal::new(15000, 2)));
        assert_eq!(parse_brl("150.5"), Some(Decimal::new(1505, 1)));
        assert_eq!(parse_brl("abc"), None);
    }

    #[test]
    fn dates_are_shown_day_first() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(format_date(date), "07/03/2025");
    }
}
