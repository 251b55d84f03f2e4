//! Body weight tracking and calorie targets for meal plans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Accepted body weight range in kilograms.
pub const WEIGHT_RANGE_KG: std::ops::RangeInclusive<f64> = 20.0..=300.0;

/// Accepted height range in centimetres.
pub const HEIGHT_RANGE_CM: std::ops::RangeInclusive<f64> = 100.0..=250.0;

/// Accepted age range in years.
pub const AGE_RANGE: std::ops::RangeInclusive<u32> = 1..=120;

/// Check that `kg` is a plausible body weight.
///
/// # Errors
///
/// Returns [`CoreError::InvalidMeasurement`] for non-finite values or values
/// outside [`WEIGHT_RANGE_KG`].
pub fn validate_weight(kg: f64) -> Result<f64, CoreError> {
    if kg.is_finite() && WEIGHT_RANGE_KG.contains(&kg) {
        Ok(kg)
    } else {
        Err(CoreError::InvalidMeasurement(format!(
            "weight must be between {} and {} kg",
            WEIGHT_RANGE_KG.start(),
            WEIGHT_RANGE_KG.end()
        )))
    }
}

/// One recorded weigh-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    /// Weight in kilograms.
    pub weight: f64,
    /// When it was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Weigh-ins over a window, newest first, with a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightHistory {
    /// Entries, newest first.
    pub entries: Vec<WeightEntry>,
    /// Most recent weight in the window.
    pub current_weight: Option<f64>,
    /// Oldest weight in the window.
    pub start_weight: Option<f64>,
    /// `current - start`, rounded to one decimal.
    pub change: Option<f64>,
}

impl WeightHistory {
    /// Summarise `entries`, which must be ordered newest first.
    #[must_use]
    pub fn from_entries(entries: Vec<WeightEntry>) -> Self {
        let current_weight = entries.first().map(|e| e.weight);
        let start_weight = entries.last().map(|e| e.weight);
        let change = current_weight
            .zip(start_weight)
            .map(|(current, start)| ((current - start) * 10.0).round() / 10.0);
        Self {
            entries,
            current_weight,
            start_weight,
            change,
        }
    }
}

/// Biological sex, as used by the BMR formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    /// Male.
    Male,
    /// Female.
    Female,
}

/// Inputs for a personal meal plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanInputs {
    /// Age in years.
    pub age: u32,
    /// Sex.
    pub sex: Sex,
    /// Weight in kilograms.
    pub weight: f64,
    /// Height in centimetres.
    pub height: f64,
    /// Activity level, e.g. `sedentary` or `moderate`.
    pub activity: String,
    /// Goal, e.g. `lose`, `maintain` or `gain`.
    pub goal: String,
    /// Food preferences.
    #[serde(default)]
    pub preferences: String,
    /// Allergies and other restrictions.
    #[serde(default)]
    pub restrictions: String,
}

impl PlanInputs {
    /// Check the body measurements.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidMeasurement`] when age, weight or height is
    /// out of range.
    pub fn validated(self) -> Result<Self, CoreError> {
        if !AGE_RANGE.contains(&self.age) {
            return Err(CoreError::InvalidMeasurement(format!(
                "age must be between {} and {}",
                AGE_RANGE.start(),
                AGE_RANGE.end()
            )));
        }
        validate_weight(self.weight)?;
        if !(self.height.is_finite() && HEIGHT_RANGE_CM.contains(&self.height)) {
            return Err(CoreError::InvalidMeasurement(format!(
                "height must be between {} and {} cm",
                HEIGHT_RANGE_CM.start(),
                HEIGHT_RANGE_CM.end()
            )));
        }
        Ok(self)
    }

    /// Basal metabolic rate in kcal/day (Mifflin-St Jeor).
    #[must_use]
    pub fn bmr(&self) -> f64 {
        let base = 10.0 * self.weight + 6.25 * self.height - 5.0 * f64::from(self.age);
        match self.sex {
            Sex::Male => base + 5.0,
            Sex::Female => base - 161.0,
        }
    }

    /// Recommended daily calories: BMR scaled by activity and goal.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn daily_calories(&self) -> i64 {
        let kcal = self.bmr() * activity_multiplier(&self.activity) * goal_adjustment(&self.goal);
        // Inputs are range-checked, so the product is a few thousand at most.
        kcal.round() as i64
    }
}

/// Multiplier for an activity level. Unknown levels count as moderate.
#[must_use]
pub fn activity_multiplier(activity: &str) -> f64 {
    match activity.trim().to_ascii_lowercase().as_str() {
        "sedentary" => 1.2,
        "light" => 1.375,
        "active" => 1.725,
        "extreme" => 1.9,
        _ => 1.55,
    }
}

/// Calorie adjustment for a goal. Unknown goals count as maintenance.
#[must_use]
pub fn goal_adjustment(goal: &str) -> f64 {
    match goal.trim().to_ascii_lowercase().as_str() {
        "lose" => 0.85,
        "gain" => 1.15,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn inputs(sex: Sex, activity: &str, goal: &str) -> PlanInputs {
        PlanInputs {
            age: 30,
            sex,
            weight: 80.0,
            height: 180.0,
            activity: activity.into(),
            goal: goal.into(),
            preferences: String::new(),
            restrictions: String::new(),
        }
    }

    fn entry(weight: f64, day: u32) -> WeightEntry {
        WeightEntry {
            weight,
            recorded_at: Utc.with_ymd_and_hms(2024, 3, day, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn bmr_follows_mifflin_st_jeor() {
        // 800 + 1125 - 150 = 1775 before the sex offset.
        assert!((inputs(Sex::Male, "", "").bmr() - 1780.0).abs() < f64::EPSILON);
        assert!((inputs(Sex::Female, "", "").bmr() - 1614.0).abs() < f64::EPSILON);
    }

    #[test]
    fn daily_calories_apply_activity_and_goal() {
        assert_eq!(inputs(Sex::Male, "sedentary", "maintain").daily_calories(), 2136);
        assert_eq!(inputs(Sex::Male, "moderate", "maintain").daily_calories(), 2759);
        assert_eq!(inputs(Sex::Male, "sedentary", "lose").daily_calories(), 1816);
        assert_eq!(inputs(Sex::Female, "extreme", "gain").daily_calories(), 3527);
    }

    #[test]
    fn unknown_levels_fall_back() {
        assert!((activity_multiplier("couch marathon") - 1.55).abs() < f64::EPSILON);
        assert!((goal_adjustment("???") - 1.0).abs() < f64::EPSILON);
        assert!((activity_multiplier(" Active ") - 1.725).abs() < f64::EPSILON);
    }

    #[test]
    fn measurements_are_range_checked() {
        let ok = inputs(Sex::Male, "light", "lose");
        assert!(ok.clone().validated().is_ok());

        let mut young = ok.clone();
        young.age = 0;
        assert!(young.validated().is_err());

        let mut heavy = ok.clone();
        heavy.weight = 301.0;
        assert!(heavy.validated().is_err());

        let mut short = ok;
        short.height = f64::NAN;
        assert!(short.validated().is_err());
    }

    #[test]
    fn weight_bounds() {
        assert_eq!(validate_weight(20.0), Ok(20.0));
        assert_eq!(validate_weight(300.0), Ok(300.0));
        assert!(validate_weight(19.9).is_err());
        assert!(validate_weight(f64::INFINITY).is_err());
    }

    #[test]
    fn history_summary_uses_newest_and_oldest() {
        let history = WeightHistory::from_entries(vec![
            entry(78.46, 10),
            entry(79.0, 5),
            entry(80.0, 1),
        ]);
        assert_eq!(history.current_weight, Some(78.46));
        assert_eq!(history.start_weight, Some(80.0));
        assert_eq!(history.change, Some(-1.5));
    }

    #[test]
    fn empty_history_has_no_summary() {
        let history = WeightHistory::from_entries(Vec::new());
        assert!(history.entries.is_empty());
        assert_eq!(history.current_weight, None);
        assert_eq!(history.change, None);
    }
}
