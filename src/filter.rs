//! Admission rules for priced candidates.

use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;
use crate::model::{DedupIndex, NormalizedKey};

pub const DEFAULT_SCAN_CAP: usize = 20;

/// Inclusive admissible price range. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceBand {
    min: Option<u64>,
    max: Option<u64>,
}

impl PriceBand {
    pub fn new(min: Option<u64>, max: Option<u64>) -> Result<Self, ConfigError> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(ConfigError::PriceBand { min: lo, max: hi });
            }
        }
        Ok(Self { min, max })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn min(&self) -> Option<u64> {
        self.min
    }

    pub fn max(&self) -> Option<u64> {
        self.max
    }
}

/// What the per-pass counter counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CapPolicy {
    /// Every admitted candidate counts against the cap.
    #[default]
    Admitted,
    /// Every candidate reached while scanning counts, admitted or not.
    Scanned,
}

impl FromStr for CapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admitted" => Ok(CapPolicy::Admitted),
            "scanned" => Ok(CapPolicy::Scanned),
            other => Err(format!("unknown cap policy '{other}'")),
        }
    }
}

/// A candidate ready for filtering.
#[derive(Debug, Clone)]
pub struct PricedCandidate<'a> {
    pub key: &'a NormalizedKey,
    pub price: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admitted,
    CapReached,
    Duplicate,
    NoPrice,
    AboveMax { price: u64, max: u64 },
    BelowMin { price: u64, min: u64 },
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Verdict::Admitted)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Admitted => write!(f, "admitted"),
            Verdict::CapReached => write!(f, "scan cap reached"),
            Verdict::Duplicate => write!(f, "already seen"),
            Verdict::NoPrice => write!(f, "no valid price found"),
            Verdict::AboveMax { price, max } => write!(f, "price {price} above {max}"),
            Verdict::BelowMin { price, min } => write!(f, "price {price} below {min}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListingFilter {
    band: PriceBand,
    cap: usize,
    policy: CapPolicy,
}

impl ListingFilter {
    pub fn new(band: PriceBand, cap: usize, policy: CapPolicy) -> Self {
        Self { band, cap, policy }
    }

    pub fn band(&self) -> PriceBand {
        self.band
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn policy(&self) -> CapPolicy {
        self.policy
    }

    pub fn cap_reached(&self, counted: usize) -> bool {
        counted >= self.cap
    }

    /// Rules run in order and stop at the first rejection.
    pub fn admit(
        &self,
        candidate: &PricedCandidate<'_>,
        seen: &DedupIndex,
        counted: usize,
    ) -> Verdict {
        if self.cap_reached(counted) {
            return Verdict::CapReached;
        }
        if seen.contains(candidate.key) {
            return Verdict::Duplicate;
        }
        let Some(price) = candidate.price else {
            return Verdict::NoPrice;
        };
        if let Some(max) = self.band.max {
            if price > max {
                return Verdict::AboveMax { price, max };
            }
        }
        if let Some(min) = self.band.min {
            if price < min {
                return Verdict::BelowMin { price, min };
            }
        }
        Verdict::Admitted
    }

    pub fn admits(
        &self,
        candidate: &PricedCandidate<'_>,
        seen: &DedupIndex,
        counted: usize,
    ) -> bool {
        self.admit(candidate, seen, counted).is_admitted()
    }
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self::new(PriceBand::unbounded(), DEFAULT_SCAN_CAP, CapPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rental_filter() -> ListingFilter {
        let band = PriceBand::new(Some(14000), Some(19000)).unwrap();
        ListingFilter::new(band, DEFAULT_SCAN_CAP, CapPolicy::Admitted)
    }

    fn priced(key: &NormalizedKey, price: u64) -> PricedCandidate<'_> {
        PricedCandidate { key, price: Some(price) }
    }

    #[test]
    fn band_is_inclusive_at_both_ends() {
        let filter = rental_filter();
        let seen = DedupIndex::new();
        let key = NormalizedKey::from_url("https://x/item/1");

        assert_eq!(
            filter.admit(&priced(&key, 13999), &seen, 0),
            Verdict::BelowMin { price: 13999, min: 14000 }
        );
        assert!(filter.admits(&priced(&key, 14000), &seen, 0));
        assert!(filter.admits(&priced(&key, 19000), &seen, 0));
        assert_eq!(
            filter.admit(&priced(&key, 19001), &seen, 0),
            Verdict::AboveMax { price: 19001, max: 19000 }
        );
    }

    #[test]
    fn open_bounds_admit_anything_priced() {
        let filter = ListingFilter::default();
        let seen = DedupIndex::new();
        let key = NormalizedKey::from_url("https://x/item/1");
        assert!(filter.admits(&priced(&key, 0), &seen, 0));
        assert!(filter.admits(&priced(&key, u64::MAX), &seen, 0));
    }

    #[test]
    fn max_only_band() {
        let filter = ListingFilter::new(
            PriceBand::new(None, Some(16000)).unwrap(),
            DEFAULT_SCAN_CAP,
            CapPolicy::Admitted,
        );
        let seen = DedupIndex::new();
        let key = NormalizedKey::from_url("https://x/item/1");
        assert!(filter.admits(&priced(&key, 1), &seen, 0));
        assert!(!filter.admits(&priced(&key, 16001), &seen, 0));
    }

    #[test]
    fn unknown_price_is_rejected() {
        let filter = ListingFilter::default();
        let key = NormalizedKey::from_url("https://x/item/1");
        let candidate = PricedCandidate { key: &key, price: None };
        assert_eq!(filter.admit(&candidate, &DedupIndex::new(), 0), Verdict::NoPrice);
    }

    #[test]
    fn seen_key_is_rejected_before_price_checks() {
        let filter = rental_filter();
        let key = NormalizedKey::from_url("https://x/item/1?ref=2");
        let seen: DedupIndex = [NormalizedKey::from_url("https://x/item/1")].into_iter().collect();
        let candidate = PricedCandidate { key: &key, price: None };
        assert_eq!(filter.admit(&candidate, &seen, 0), Verdict::Duplicate);
    }

    #[test]
    fn cap_is_checked_first() {
        let filter = rental_filter();
        let key = NormalizedKey::from_url("https://x/item/1");
        let seen: DedupIndex = [key.clone()].into_iter().collect();
        assert_eq!(
            filter.admit(&priced(&key, 15000), &seen, DEFAULT_SCAN_CAP),
            Verdict::CapReached
        );
        assert!(filter.admits(&priced(&key, 15000), &DedupIndex::new(), DEFAULT_SCAN_CAP - 1));
    }

    #[test]
    fn inverted_band_is_a_config_error() {
        assert!(PriceBand::new(Some(20000), Some(10000)).is_err());
        assert!(PriceBand::new(Some(10000), Some(10000)).is_ok());
    }

    #[test]
    fn cap_policy_parses_case_insensitively() {
        assert_eq!("Scanned".parse::<CapPolicy>().unwrap(), CapPolicy::Scanned);
        assert_eq!(" admitted ".parse::<CapPolicy>().unwrap(), CapPolicy::Admitted);
        assert!("sometimes".parse::<CapPolicy>().is_err());
    }
}
