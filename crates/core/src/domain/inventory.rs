use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomType(String);

impl RoomType {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(DomainError::InvalidRoomType(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display form used in search results, e.g. `suite` -> `Suite`.
    pub fn capitalized(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StayDate(NaiveDate);

impl StayDate {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
            .map(Self)
            .map_err(|_| DomainError::InvalidDate(raw.to_string()))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for StayDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InventoryKey {
    pub room_type: RoomType,
    pub date: StayDate,
}

impl InventoryKey {
    pub fn new(room_type: RoomType, date: StayDate) -> Self {
        Self { room_type, date }
    }

    pub fn parse(room_type: &str, date: &str) -> Result<Self, DomainError> {
        Ok(Self { room_type: RoomType::parse(room_type)?, date: StayDate::parse(date)? })
    }

    /// Stable document id, one per key.
    pub fn record_id(&self) -> String {
        format!("{}_{}", self.room_type, self.date)
    }
}

impl fmt::Display for InventoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.room_type, self.date)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: String,
    pub key: InventoryKey,
    pub available: u32,
    pub price: String,
    pub description: String,
    pub version: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// `1 - cos(self, other)`; `None` when the vectors cannot be compared.
    pub fn cosine_distance(&self, other: &Embedding) -> Option<f32> {
        if self.0.len() != other.0.len() || self.0.is_empty() {
            return None;
        }

        let mut dot = 0.0_f64;
        let mut left_norm = 0.0_f64;
        let mut right_norm = 0.0_f64;
        for (left, right) in self.0.iter().zip(other.0.iter()) {
            let (left, right) = (f64::from(*left), f64::from(*right));
            dot += left * right;
            left_norm += left * left;
            right_norm += right * right;
        }

        if left_norm == 0.0 || right_norm == 0.0 {
            return None;
        }

        Some((1.0 - dot / (left_norm.sqrt() * right_norm.sqrt())) as f32)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewInventoryRecord {
    pub key: InventoryKey,
    pub available: u32,
    pub price: String,
    pub description: String,
    pub embedding: Embedding,
}

impl NewInventoryRecord {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.description.trim().is_empty() {
            return Err(DomainError::InvariantViolation(format!(
                "inventory record {} requires a non-empty description",
                self.key
            )));
        }
        if self.embedding.dimensions() == 0 {
            return Err(DomainError::InvariantViolation(format!(
                "inventory record {} requires an embedding",
                self.key
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoomMatch {
    pub record: InventoryRecord,
    pub distance: f32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingRequest {
    pub key: InventoryKey,
    pub count: u32,
}

impl BookingRequest {
    pub fn new(key: InventoryKey, count: i64) -> Result<Self, DomainError> {
        if count < 1 || count > i64::from(u32::MAX) {
            return Err(DomainError::InvalidBookingCount(count));
        }
        Ok(Self { key, count: count as u32 })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingReceipt {
    pub key: InventoryKey,
    pub count: u32,
    pub remaining: u32,
    pub price: String,
}
