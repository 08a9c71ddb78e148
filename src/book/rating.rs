/// Star rating definitions for catalog books
///
/// The catalog encodes ratings as an ordinal word in the rating element's class
/// list (`star-rating Three`). This module holds the fixed mapping between that
/// word and the numeric rating.
use std::fmt;

/// A book's star rating, from zero to five
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Rating {
    /// No rating, or a token outside the known vocabulary
    #[default]
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
}

impl Rating {
    /// All ratings in ascending order
    pub const ALL: [Rating; 6] = [
        Rating::Zero,
        Rating::One,
        Rating::Two,
        Rating::Three,
        Rating::Four,
        Rating::Five,
    ];

    /// Maps an ordinal token to its rating
    ///
    /// The mapping is total: absent or unrecognized tokens map to `Zero`.
    /// Matching is exact, the same way the catalog's class names are written.
    pub fn from_token(token: Option<&str>) -> Self {
        match token {
            Some("One") => Self::One,
            Some("Two") => Self::Two,
            Some("Three") => Self::Three,
            Some("Four") => Self::Four,
            Some("Five") => Self::Five,
            _ => Self::Zero,
        }
    }

    /// Numeric value of the rating (0–5)
    pub fn value(&self) -> u8 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
        }
    }

    /// Converts a stored numeric value back to a rating
    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// The ordinal word for this rating
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zero => "Zero",
            Self::One => "One",
            Self::Two => "Two",
            Self::Three => "Three",
            Self::Four => "Four",
            Self::Five => "Five",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
