//! Price extraction from free-text listing titles.
//!
//! Two literal formats are recognised, checked in order: a `UYU` amount and a `$` amount.
//! Commas are thousands separators; there are no decimals and no negatives.

use std::sync::LazyLock;

use regex::Regex;

static UYU_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"UYU\s?(\d[\d,]*)").expect("valid UYU price pattern"));

static DOLLAR_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d[\d,]*)").expect("valid dollar price pattern"));

/// Returns the price mentioned in `title`, or `None` when no recognised amount is present.
///
/// Only the first match of the first pattern that matches at all is considered, so a title
/// carrying both a `UYU` and a `$` amount is priced by the `UYU` one.
pub fn extract(title: &str) -> Option<u64> {
    let captures = UYU_PRICE
        .captures(title)
        .or_else(|| DOLLAR_PRICE.captures(title))?;

    let digits: String = captures[1].chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}
