use async_trait::async_trait;

use crate::{ReadError, Time, UpdateError, UserID, Weight};

#[async_trait]
pub trait PreferencesRepository: Send + Sync + 'static {
    /// Returns the stored preferences or the defaults if none were written yet.
    async fn read_preferences(&self, user_id: UserID) -> Result<Preferences, ReadError>;
    async fn write_preferences(
        &self,
        user_id: UserID,
        preferences: Preferences,
    ) -> Result<Preferences, UpdateError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preferences {
    pub weight_unit: WeightUnit,
    pub theme: Theme,
    pub default_rest: Time,
    pub show_rpe: bool,
    pub beep_volume: u8,
}

impl Preferences {
    pub fn validate(&self) -> Result<(), PreferencesError> {
        if self.beep_volume > 100 {
            return Err(PreferencesError::BeepVolumeOutOfRange(self.beep_volume));
        }
        Ok(())
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            weight_unit: WeightUnit::Kg,
            theme: Theme::System,
            default_rest: Time::new(90).unwrap_or_default(),
            show_rpe: true,
            beep_volume: 80,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PreferencesError {
    #[error("Beep volume must be in the range 0 to 100 ({0} > 100)")]
    BeepVolumeOutOfRange(u8),
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum WeightUnit {
    #[default]
    Kg,
    Lb,
}

impl WeightUnit {
    pub const KG_PER_LB: f32 = 0.453_592_37;

    #[must_use]
    pub fn from_kg(self, weight: Weight) -> f32 {
        let kg = f32::from(weight);
        match self {
            WeightUnit::Kg => kg,
            WeightUnit::Lb => (kg / Self::KG_PER_LB * 10.0).round() / 10.0,
        }
    }

    #[must_use]
    pub fn to_kg(self, value: f32) -> Weight {
        match self {
            WeightUnit::Kg => Weight::rounded(value),
            WeightUnit::Lb => Weight::rounded(value * Self::KG_PER_LB),
        }
    }
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_preferences_default() {
        let preferences = Preferences::default();
        assert_eq!(preferences.weight_unit, WeightUnit::Kg);
        assert_eq!(preferences.theme, Theme::System);
        assert_eq!(preferences.default_rest, Time::new(90).unwrap());
        assert!(preferences.show_rpe);
        assert_eq!(preferences.beep_volume, 80);
        assert_eq!(preferences.validate(), Ok(()));
    }

    #[test]
    fn test_preferences_validate() {
        let preferences = Preferences {
            beep_volume: 101,
            ..Preferences::default()
        };
        assert_eq!(
            preferences.validate(),
            Err(PreferencesError::BeepVolumeOutOfRange(101))
        );
    }

    #[rstest]
    #[case(WeightUnit::Kg, 100.0, 100.0)]
    #[case(WeightUnit::Lb, 100.0, 220.5)]
    #[case(WeightUnit::Lb, 20.0, 44.1)]
    fn test_weight_unit_from_kg(#[case] unit: WeightUnit, #[case] kg: f32, #[case] expected: f32) {
        assert_eq!(unit.from_kg(Weight::new(kg).unwrap()), expected);
    }

    #[rstest]
    #[case(WeightUnit::Kg, 60.0, 60.0)]
    #[case(WeightUnit::Lb, 225.0, 102.1)]
    #[case(WeightUnit::Lb, 45.0, 20.4)]
    fn test_weight_unit_to_kg(#[case] unit: WeightUnit, #[case] value: f32, #[case] expected: f32) {
        assert_eq!(unit.to_kg(value), Weight::new(expected).unwrap());
    }

    #[rstest]
    #[case("dark", Theme::Dark)]
    #[case("light", Theme::Light)]
    #[case("system", Theme::System)]
    fn test_theme_from_str(#[case] value: &str, #[case] expected: Theme) {
        assert_eq!(value.parse::<Theme>().unwrap(), expected);
    }
}
