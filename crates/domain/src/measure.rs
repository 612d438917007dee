use std::{fmt, ops::Mul};

use chrono::Duration;
use derive_more::{Display, Into};
use thiserror::Error;

#[derive(Debug, Default, Display, Clone, Copy, Into, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reps(u32);

impl Reps {
    pub const ONE: Reps = Reps(1);

    pub fn new(value: u32) -> Result<Self, RepsError> {
        if !(0..1000).contains(&value) {
            return Err(RepsError::OutOfRange);
        }

        Ok(Self(value))
    }
}

impl TryFrom<&str> for Reps {
    type Error = RepsError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().parse::<u32>() {
            Ok(parsed_value) => Reps::new(parsed_value),
            Err(_) => Err(RepsError::ParseError),
        }
    }
}

impl Mul<Time> for Reps {
    type Output = Time;

    fn mul(self, rhs: Time) -> Self::Output {
        Time(self.0 * rhs.0)
    }
}

impl Mul<Weight> for Reps {
    type Output = f32;

    #[allow(clippy::cast_precision_loss)]
    fn mul(self, rhs: Weight) -> Self::Output {
        self.0 as f32 * rhs.0
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum RepsError {
    #[error("Reps must be in the range 0 to 999")]
    OutOfRange,
    #[error("Reps must be an integer")]
    ParseError,
}

/// A duration in whole seconds, used for rest targets and time under tension.
#[derive(Debug, Default, Display, Clone, Copy, Into, PartialEq, Eq, PartialOrd, Ord)]
pub struct Time(u32);

impl Time {
    pub fn new(value: u32) -> Result<Self, TimeError> {
        if !(0..1000).contains(&value) {
            return Err(TimeError::OutOfRange);
        }

        Ok(Self(value))
    }

    #[must_use]
    pub fn duration(self) -> Duration {
        Duration::seconds(i64::from(self.0))
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<Time> for i64 {
    fn from(value: Time) -> Self {
        i64::from(value.0)
    }
}

impl TryFrom<&str> for Time {
    type Error = TimeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().parse::<u32>() {
            Ok(parsed_value) => Time::new(parsed_value),
            Err(_) => Err(TimeError::ParseError),
        }
    }
}

impl Mul<Reps> for Time {
    type Output = Time;

    fn mul(self, rhs: Reps) -> Self::Output {
        Time(self.0 * rhs.0)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum TimeError {
    #[error("Time must be in the range 0 to 999 s")]
    OutOfRange,
    #[error("Time must be an integer")]
    ParseError,
}

/// A load in kilograms with a resolution of 0.1 kg.
#[derive(Debug, Default, Display, Clone, Copy, Into, PartialEq, PartialOrd)]
pub struct Weight(f32);

impl Weight {
    pub fn new(value: f32) -> Result<Self, WeightError> {
        if !(0.0..1000.0).contains(&value) {
            return Err(WeightError::OutOfRange);
        }

        if (value * 10.0 - (value * 10.0).round()).abs() > 0.001 {
            return Err(WeightError::InvalidResolution);
        }

        Ok(Self((value * 10.0).round() / 10.0))
    }

    /// Rounds to the nearest valid weight instead of rejecting the value.
    #[must_use]
    pub fn rounded(value: f32) -> Self {
        Self(((value.clamp(0.0, 999.9)) * 10.0).round() / 10.0)
    }
}

impl TryFrom<&str> for Weight {
    type Error = WeightError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().parse::<f32>() {
            Ok(parsed_value) => Weight::new(parsed_value),
            Err(_) => Err(WeightError::ParseError),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum WeightError {
    #[error("Weight must be in the range 0.0 to 999.9 kg")]
    OutOfRange,
    #[error("Weight must be a multiple of 0.1 kg")]
    InvalidResolution,
    #[error("Weight must be a decimal")]
    ParseError,
}

/// Rate of perceived exertion, stored in tenths.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RPE(u8);

impl RPE {
    pub const ZERO: RPE = RPE(0);
    pub const ONE: RPE = RPE(10);
    pub const TWO: RPE = RPE(20);
    pub const THREE: RPE = RPE(30);
    pub const FOUR: RPE = RPE(40);
    pub const FIVE: RPE = RPE(50);
    pub const SIX: RPE = RPE(60);
    pub const SEVEN: RPE = RPE(70);
    pub const EIGHT: RPE = RPE(80);
    pub const NINE: RPE = RPE(90);
    pub const TEN: RPE = RPE(100);

    pub fn new(value: f32) -> Result<Self, RPEError> {
        if !(0.0..=10.0).contains(&value) {
            return Err(RPEError::OutOfRange);
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let v = (value * 10.0).round() as u8;

        if v % 5 != 0 || ((value * 10.0) - f32::from(v)).abs() > 0.001 {
            return Err(RPEError::InvalidResolution);
        }

        Ok(Self(v))
    }

    pub fn from_tenths(value: u8) -> Result<Self, RPEError> {
        if value > 100 {
            return Err(RPEError::OutOfRange);
        }
        if value % 5 != 0 {
            return Err(RPEError::InvalidResolution);
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn tenths(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn avg(values: &[RPE]) -> Option<RPE> {
        if values.is_empty() {
            None
        } else {
            let avg = values.iter().map(|rpe| rpe.0 as usize).sum::<usize>() / values.len();
            #[allow(clippy::cast_possible_truncation)]
            Some(RPE((avg - avg % 5) as u8))
        }
    }
}

impl From<RPE> for f32 {
    fn from(value: RPE) -> Self {
        f32::from(value.0) / 10.0
    }
}

impl TryFrom<&str> for RPE {
    type Error = RPEError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().parse::<f32>() {
            Ok(parsed_value) => RPE::new(parsed_value),
            Err(_) => Err(RPEError::ParseError),
        }
    }
}

impl fmt::Display for RPE {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", f32::from(*self))
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum RPEError {
    #[error("RPE must be in the range 0.0 to 10.0")]
    OutOfRange,
    #[error("RPE must be a multiple of 0.5")]
    InvalidResolution,
    #[error("RPE must be a decimal")]
    ParseError,
}

/// Repetitions in reserve, the complement of [`RPE`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct RIR(u8);

impl From<RPE> for RIR {
    fn from(value: RPE) -> Self {
        Self(100 - value.0)
    }
}

impl From<RIR> for f32 {
    fn from(value: RIR) -> Self {
        f32::from(value.0) / 10.0
    }
}

impl fmt::Display for RIR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", f32::from(*self))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, Ok(Reps(0)))]
    #[case(999, Ok(Reps(999)))]
    #[case(1000, Err(RepsError::OutOfRange))]
    fn test_reps_new(#[case] input: u32, #[case] expected: Result<Reps, RepsError>) {
        assert_eq!(Reps::new(input), expected);
    }

    #[rstest]
    #[case("0", Ok(Reps(0)))]
    #[case(" 12 ", Ok(Reps(12)))]
    #[case("1000", Err(RepsError::OutOfRange))]
    #[case("4.", Err(RepsError::ParseError))]
    #[case("", Err(RepsError::ParseError))]
    fn test_reps_from_str(#[case] input: &str, #[case] expected: Result<Reps, RepsError>) {
        assert_eq!(Reps::try_from(input), expected);
    }

    #[test]
    fn test_reps_mul() {
        assert_eq!(Reps(2) * Time(4), Time(8));
        assert_eq!(Time(4) * Reps(2), Time(8));
        assert_eq!(Reps(5) * Weight(20.5), 102.5);
    }

    #[rstest]
    #[case(0, Ok(Time(0)))]
    #[case(999, Ok(Time(999)))]
    #[case(1000, Err(TimeError::OutOfRange))]
    fn test_time_new(#[case] input: u32, #[case] expected: Result<Time, TimeError>) {
        assert_eq!(Time::new(input), expected);
    }

    #[rstest]
    #[case("90", Ok(Time(90)))]
    #[case("1000", Err(TimeError::OutOfRange))]
    #[case("1.5", Err(TimeError::ParseError))]
    fn test_time_from_str(#[case] input: &str, #[case] expected: Result<Time, TimeError>) {
        assert_eq!(Time::try_from(input), expected);
    }

    #[test]
    fn test_time_duration() {
        assert_eq!(Time(90).duration(), Duration::seconds(90));
        assert!(Time(0).is_zero());
        assert!(!Time(1).is_zero());
    }

    #[rstest]
    #[case(0.0, Ok(Weight(0.0)))]
    #[case(102.5, Ok(Weight(102.5)))]
    #[case(999.9, Ok(Weight(999.9)))]
    #[case(1000.0, Err(WeightError::OutOfRange))]
    #[case(-1.0, Err(WeightError::OutOfRange))]
    #[case(1.23, Err(WeightError::InvalidResolution))]
    fn test_weight_new(#[case] input: f32, #[case] expected: Result<Weight, WeightError>) {
        assert_eq!(Weight::new(input), expected);
    }

    #[rstest]
    #[case("2.0", Ok(Weight(2.0)))]
    #[case("8", Ok(Weight(8.0)))]
    #[case("", Err(WeightError::ParseError))]
    fn test_weight_from_str(#[case] input: &str, #[case] expected: Result<Weight, WeightError>) {
        assert_eq!(Weight::try_from(input), expected);
    }

    #[rstest]
    #[case(45.359_237, Weight(45.4))]
    #[case(-3.0, Weight(0.0))]
    #[case(2000.0, Weight(999.9))]
    fn test_weight_rounded(#[case] input: f32, #[case] expected: Weight) {
        assert_eq!(Weight::rounded(input), expected);
    }

    #[rstest]
    #[case(0.0, Ok(RPE::ZERO))]
    #[case(8.0, Ok(RPE::EIGHT))]
    #[case(9.5, Ok(RPE(95)))]
    #[case(10.0, Ok(RPE::TEN))]
    #[case(10.5, Err(RPEError::OutOfRange))]
    #[case(9.2, Err(RPEError::InvalidResolution))]
    fn test_rpe_new(#[case] input: f32, #[case] expected: Result<RPE, RPEError>) {
        assert_eq!(RPE::new(input), expected);
    }

    #[rstest]
    #[case(85, Ok(RPE(85)))]
    #[case(101, Err(RPEError::OutOfRange))]
    #[case(82, Err(RPEError::InvalidResolution))]
    fn test_rpe_from_tenths(#[case] input: u8, #[case] expected: Result<RPE, RPEError>) {
        assert_eq!(RPE::from_tenths(input), expected);
    }

    #[rstest]
    #[case(&[], None)]
    #[case(&[RPE::EIGHT], Some(RPE::EIGHT))]
    #[case(&[RPE::EIGHT, RPE::NINE], Some(RPE(85)))]
    #[case(&[RPE::SEVEN, RPE::EIGHT, RPE::EIGHT], Some(RPE(75)))]
    fn test_rpe_avg(#[case] values: &[RPE], #[case] expected: Option<RPE>) {
        assert_eq!(RPE::avg(values), expected);
    }

    #[rstest]
    #[case(RPE::EIGHT, "8")]
    #[case(RPE(95), "9.5")]
    fn test_rpe_display(#[case] input: RPE, #[case] expected: &str) {
        assert_eq!(input.to_string(), expected);
    }

    #[rstest]
    #[case(RPE(0), RIR(100))]
    #[case(RPE(80), RIR(20))]
    #[case(RPE(100), RIR(0))]
    fn test_rir_from_rpe(#[case] rpe: RPE, #[case] expected: RIR) {
        assert_eq!(RIR::from(rpe), expected);
    }
}
