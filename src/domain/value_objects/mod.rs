//! Value Objects for the order workflow

use serde::{Deserialize, Serialize};
use std::fmt;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone)] pub enum SkuError { Empty, TooLong }
impl std::error::Error for SkuError {}
impl fmt::Display for SkuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "SKU empty"), Self::TooLong => write!(f, "SKU too long") }
    }
}

/// Stock quantity value object. Never negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

/// Human-readable sequential order identifier, `ORD-` followed by at least three digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderSlug(String);

impl OrderSlug {
    pub const PREFIX: &'static str = "ORD-";

    pub fn from_number(number: u64) -> Self {
        Self(format!("{}{:03}", Self::PREFIX, number))
    }

    /// Wraps a slug read back from storage without re-validating it.
    pub fn from_stored(raw: impl Into<String>) -> Self { Self(raw.into()) }

    /// Extracts the numeric suffix of a slug.
    ///
    /// Leading digits after the first `-` are used and anything after them is ignored,
    /// so `ORD-007` and `ORD-12x` yield 7 and 12. Returns `None` when no digits follow.
    pub fn parse_number(raw: &str) -> Option<u64> {
        let (_, suffix) = raw.split_once('-')?;
        let digits: String = suffix.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    pub fn number(&self) -> Option<u64> { Self::parse_number(&self.0) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}
