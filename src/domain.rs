use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PhewasError;

/// Phenotype identifier in canonical textual form.
///
/// Manifests and per-phenotype tables may spell the same numeric code as
/// `20002` or `20002.0`; both parse to `20002` so the final join matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Phenocode(String);

impl Phenocode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phenocode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Phenocode {
    type Err = PhewasError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PhewasError::ManifestParse("empty phenocode".to_string()));
        }
        Ok(Self(canonical_code(trimmed).to_string()))
    }
}

impl TryFrom<String> for Phenocode {
    type Error = PhewasError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Phenocode> for String {
    fn from(value: Phenocode) -> Self {
        value.0
    }
}

fn canonical_code(value: &str) -> &str {
    let Some((integer, fraction)) = value.split_once('.') else {
        return value;
    };
    let digits = integer.strip_prefix('-').unwrap_or(integer);
    let is_integral = !digits.is_empty()
        && digits.chars().all(|ch| ch.is_ascii_digit())
        && !fraction.is_empty()
        && fraction.chars().all(|ch| ch == '0');
    if is_integral { integer } else { value }
}

/// Short label for a locus, used as a path component in every artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LocusName(String);

impl LocusName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocusName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocusName {
    type Err = PhewasError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && trimmed != "."
            && trimmed != ".."
            && !trimmed.contains(['/', '\\']);
        if !is_valid {
            return Err(PhewasError::InvalidName(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// A genomic interval already padded by its window.
///
/// `start` and `end` are the effective query bounds. They are not clamped, so
/// a window wider than the original start yields a negative `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locus {
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub window: i64,
}

impl Locus {
    pub fn new(chromosome: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            chromosome: chromosome.into(),
            start,
            end,
            window: 0,
        }
    }

    /// Parses `chrom:start-end` (or `chrom:start:end`) and pads both bounds by `window`.
    pub fn resolve(spec: &str, window: i64) -> Result<Self, PhewasError> {
        if window < 0 {
            return Err(PhewasError::InvalidWindow(window));
        }
        let malformed = || PhewasError::MalformedLocus(spec.to_string());

        let normalized = spec.trim().replace('-', ":");
        let tokens = normalized.split(':').collect::<Vec<_>>();
        let [chromosome, start, end] = tokens.as_slice() else {
            return Err(malformed());
        };
        if chromosome.is_empty() {
            return Err(malformed());
        }
        let start = start.parse::<i64>().map_err(|_| malformed())?;
        let end = end.parse::<i64>().map_err(|_| malformed())?;
        if start > end {
            return Err(malformed());
        }

        Ok(Self {
            chromosome: chromosome.to_string(),
            start: start.checked_sub(window).ok_or_else(malformed)?,
            end: end.checked_add(window).ok_or_else(malformed)?,
            window,
        })
    }

    /// Region string handed to the range query.
    pub fn region(&self) -> String {
        format!("{}:{}-{}", self.chromosome, self.start, self.end)
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.region())
    }
}
