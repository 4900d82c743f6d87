//! Value Objects for the storefront

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Promo code value object, normalized to upper case
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromoCodeKey(String);

impl PromoCodeKey {
    pub fn new(value: impl AsRef<str>) -> Result<Self, CodeError> {
        let value = value.as_ref().trim().to_uppercase();
        if value.is_empty() { return Err(CodeError::Empty); }
        if value.len() > 50 { return Err(CodeError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for PromoCodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CodeError { Empty, TooLong }
impl std::error::Error for CodeError {}
impl fmt::Display for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "Promo code is empty"), Self::TooLong => write!(f, "Promo code is too long") }
    }
}

/// Human-readable order number, `TS-YYYYMMDD-NNNN`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn generate(at: DateTime<Utc>, rng: &mut impl Rng) -> Self {
        let suffix: u16 = rng.gen_range(0..10_000);
        Self(format!("TS-{}-{:04}", at.format("%Y%m%d"), suffix))
    }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_string(self) -> String { self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Review rating, 1 to 5 stars
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Rating(u8);

impl Rating {
    pub const MAX: Rating = Rating(5);
    pub fn new(stars: i32) -> Result<Self, RatingError> {
        if (1..=5).contains(&stars) { Ok(Self(stars as u8)) } else { Err(RatingError(stars)) }
    }
    pub fn stars(&self) -> u8 { self.0 }
    pub fn is_max(&self) -> bool { *self == Self::MAX }
}

impl TryFrom<i32> for Rating {
    type Error = RatingError;
    fn try_from(v: i32) -> Result<Self, Self::Error> { Self::new(v) }
}

impl From<Rating> for i32 {
    fn from(r: Rating) -> i32 { i32::from(r.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct RatingError(pub i32);
impl std::error::Error for RatingError {}
impl fmt::Display for RatingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Rating must be between 1 and 5, got {}", self.0) }
}

/// URL slug derived from a display name
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().to_lowercase().chars() {
        if c.is_alphanumeric() || c == '_' {
            slug.push(c);
        } else if (c.is_whitespace() || c == '-') && !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') { slug.pop(); }
    slug
}

/// Trimmed text that must not be blank.
pub fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_promo_key() {
        assert_eq!(PromoCodeKey::new("  summer10 ").unwrap().as_str(), "SUMMER10");
        assert_eq!(PromoCodeKey::new("   "), Err(CodeError::Empty));
    }

    #[test]
    fn test_order_number_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap();
        let n = OrderNumber::generate(at, &mut StdRng::seed_from_u64(7));
        let s = n.as_str();
        assert!(s.starts_with("TS-20260307-"), "{s}");
        assert_eq!(s.len(), "TS-20260307-0000".len());
        assert!(s[12..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert!(Rating::new(5).unwrap().is_max());
        assert_eq!(serde_json::from_str::<Rating>("3").unwrap().stars(), 3);
        assert!(serde_json::from_str::<Rating>("9").is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Galaxy S24 Ultra -- 512GB "), "galaxy-s24-ultra-512gb");
        assert_eq!(slugify("USB-C (2m)"), "usb-c-2m");
    }
}
