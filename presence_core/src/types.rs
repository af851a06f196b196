//! Core domain types for the presence kiosk.
//!
//! This module defines the fundamental types used throughout the system:
//! - Tokens and the token alphabet
//! - Committed check statuses
//! - Durable scan records
//! - The forced mode pinned by the external controller

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Tokens
// ============================================================================

/// Exact length of a token.
pub const TOKEN_LEN: usize = 22;

/// An opaque 22-character identity credential drawn from `[A-Za-z0-9_-]`.
///
/// Construction through [`Token::parse`] enforces the alphabet. Tokens read
/// back from the durable store are taken as-is.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Validate and wrap a candidate string
    pub fn parse(candidate: &str) -> Result<Self> {
        if is_token_shaped(candidate) {
            Ok(Self(candidate.to_owned()))
        } else {
            Err(Error::MalformedToken(candidate.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_token_shaped(candidate: &str) -> bool {
    candidate.len() == TOKEN_LEN && candidate.chars().all(is_token_char)
}

// ============================================================================
// Statuses and records
// ============================================================================

/// A committed presence status. Serialized as `0` / `1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CheckStatus {
    CheckedOut,
    CheckedIn,
}

impl CheckStatus {
    pub fn code(self) -> u8 {
        match self {
            CheckStatus::CheckedOut => 0,
            CheckStatus::CheckedIn => 1,
        }
    }
}

impl From<CheckStatus> for u8 {
    fn from(status: CheckStatus) -> u8 {
        status.code()
    }
}

impl TryFrom<u8> for CheckStatus {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(CheckStatus::CheckedOut),
            1 => Ok(CheckStatus::CheckedIn),
            other => Err(format!("invalid check status {}", other)),
        }
    }
}

/// A durable fact: at `epoch`, `token` transitioned to `status` at `location`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub token: Token,
    pub location: String,
    pub status: CheckStatus,
    pub epoch: i64,
}

impl ScanRecord {
    pub fn new(token: Token, location: impl Into<String>, status: CheckStatus, epoch: i64) -> Self {
        Self {
            token,
            location: location.into(),
            status,
            epoch,
        }
    }
}

// ============================================================================
// Forced mode
// ============================================================================

/// Device-wide override pinned by the external controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ForcedMode {
    #[default]
    Unset,
    CheckOut,
    CheckIn,
}
