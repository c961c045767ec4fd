//! Typed option values bound to settings storage
//!
//! Each flag wraps an optional mutable reference to the field it controls.
//! `set` parses the whole input into a temporary and only writes the target
//! once every element is valid, so a failed `set` leaves the field as it was.
//! `Display` renders text that `set` accepts and that reproduces the value.

use super::robots::RobotsMode;
use crate::humanize::{HumanDuration, ParseError};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlagError {
    #[error("flag is not bound to any storage")]
    Unbound,

    #[error("empty element at position {position} in '{input}'")]
    EmptyElement { input: String, position: usize },

    #[error("invalid integer '{element}': {source}")]
    InvalidInteger {
        element: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid duration: {0}")]
    InvalidDuration(#[from] ParseError),

    #[error(transparent)]
    InvalidRobotsMode(#[from] super::robots::UnknownRobotsMode),
}

pub type Result<T> = std::result::Result<T, FlagError>;

/// A settable option value
pub trait FlagValue: fmt::Display {
    fn set(&mut self, value: &str) -> Result<()>;
}

/// Split a comma list into trimmed, non-empty elements
pub fn split_list(input: &str) -> Result<Vec<&str>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    input
        .split(',')
        .enumerate()
        .map(|(position, element)| {
            let element = element.trim();
            if element.is_empty() {
                Err(FlagError::EmptyElement {
                    input: input.to_string(),
                    position,
                })
            } else {
                Ok(element)
            }
        })
        .collect()
}

/// Parse a comma list of strings
pub fn parse_string_list(input: &str) -> Result<Vec<String>> {
    Ok(split_list(input)?.into_iter().map(str::to_string).collect())
}

/// Parse a comma list of integers; the first bad element fails the whole list
pub fn parse_int_list<T>(input: &str) -> Result<Vec<T>>
where
    T: FromStr<Err = ParseIntError>,
{
    split_list(input)?
        .into_iter()
        .map(|element| {
            element.parse().map_err(|source| FlagError::InvalidInteger {
                element: element.to_string(),
                source,
            })
        })
        .collect()
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Comma-separated list of strings
#[derive(Debug, Default)]
pub struct StringListFlag<'a> {
    slice: Option<&'a mut Vec<String>>,
}

impl<'a> StringListFlag<'a> {
    pub fn new(slice: &'a mut Vec<String>) -> Self {
        Self { slice: Some(slice) }
    }
}

impl FlagValue for StringListFlag<'_> {
    fn set(&mut self, value: &str) -> Result<()> {
        let slice = self.slice.as_deref_mut().ok_or(FlagError::Unbound)?;
        let parsed = parse_string_list(value)?;
        *slice = parsed;
        Ok(())
    }
}

impl fmt::Display for StringListFlag<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slice.as_deref() {
            Some(slice) => f.write_str(&join(slice)),
            None => Ok(()),
        }
    }
}

/// Comma-separated list of integers
#[derive(Debug, Default)]
pub struct IntListFlag<'a, T = i64> {
    slice: Option<&'a mut Vec<T>>,
}

impl<'a, T> IntListFlag<'a, T> {
    pub fn new(slice: &'a mut Vec<T>) -> Self {
        Self { slice: Some(slice) }
    }
}

impl<T> FlagValue for IntListFlag<'_, T>
where
    T: FromStr<Err = ParseIntError> + fmt::Display,
{
    fn set(&mut self, value: &str) -> Result<()> {
        let slice = self.slice.as_deref_mut().ok_or(FlagError::Unbound)?;
        let parsed = parse_int_list(value)?;
        *slice = parsed;
        Ok(())
    }
}

impl<T: fmt::Display> fmt::Display for IntListFlag<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slice.as_deref() {
            Some(slice) => f.write_str(&join(slice)),
            None => Ok(()),
        }
    }
}

/// Duration in short text form ("1s", "1m30s")
#[derive(Debug, Default)]
pub struct DurationFlag<'a> {
    duration: Option<&'a mut Duration>,
}

impl<'a> DurationFlag<'a> {
    pub fn new(duration: &'a mut Duration) -> Self {
        Self {
            duration: Some(duration),
        }
    }
}

impl FlagValue for DurationFlag<'_> {
    fn set(&mut self, value: &str) -> Result<()> {
        let duration = self.duration.as_deref_mut().ok_or(FlagError::Unbound)?;
        let parsed: HumanDuration = value.parse()?;
        *duration = parsed.as_duration();
        Ok(())
    }
}

impl fmt::Display for DurationFlag<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.duration.as_deref() {
            Some(d) => write!(f, "{}", HumanDuration(*d)),
            None => Ok(()),
        }
    }
}

/// Robots mode stored as its integer index
#[derive(Debug, Default)]
pub struct RobotsFlag<'a> {
    mode: Option<&'a mut usize>,
}

impl<'a> RobotsFlag<'a> {
    pub fn new(mode: &'a mut usize) -> Self {
        Self { mode: Some(mode) }
    }

    /// Current mode; unbound or out-of-range storage reads as the default
    pub fn mode(&self) -> RobotsMode {
        self.mode
            .as_deref()
            .and_then(|index| RobotsMode::from_index(*index))
            .unwrap_or_default()
    }
}

impl FlagValue for RobotsFlag<'_> {
    fn set(&mut self, value: &str) -> Result<()> {
        let index = self.mode.as_deref_mut().ok_or(FlagError::Unbound)?;
        let mode: RobotsMode = value.parse()?;
        *index = mode.as_index();
        Ok(())
    }
}

impl fmt::Display for RobotsFlag<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mode().as_str())
    }
}
