use std::{
    collections::{BTreeMap, HashSet},
    ops::{Add, AddAssign, Mul},
    slice::Iter,
};

use async_trait::async_trait;
use derive_more::Deref;

use crate::{CreateError, DeleteError, Name, ReadError, UpdateError, UserID, id::uuid_id};

#[async_trait]
pub trait ExerciseService: Send + Sync + 'static {
    async fn get_exercises(
        &self,
        user_id: UserID,
        filter: &ExerciseFilter,
    ) -> Result<Vec<Exercise>, ReadError>;
    async fn get_exercise(&self, user_id: UserID, id: ExerciseID) -> Result<Exercise, ReadError>;
    async fn create_exercise(
        &self,
        user_id: UserID,
        exercise: NewExercise,
    ) -> Result<Exercise, CreateError>;
    async fn replace_exercise(
        &self,
        user_id: UserID,
        exercise: Exercise,
    ) -> Result<Exercise, UpdateError>;
    async fn delete_exercise(
        &self,
        user_id: UserID,
        id: ExerciseID,
    ) -> Result<ExerciseID, DeleteError>;
}

#[async_trait]
pub trait ExerciseRepository: Send + Sync + 'static {
    /// Returns the built-in catalog and the exercises created by the user.
    async fn read_exercises(&self, user_id: UserID) -> Result<Vec<Exercise>, ReadError>;
    async fn read_exercise(&self, user_id: UserID, id: ExerciseID)
    -> Result<Exercise, ReadError>;
    async fn create_exercise(
        &self,
        user_id: UserID,
        exercise: NewExercise,
    ) -> Result<Exercise, CreateError>;
    async fn replace_exercise(
        &self,
        user_id: UserID,
        exercise: Exercise,
    ) -> Result<Exercise, UpdateError>;
    async fn delete_exercise(
        &self,
        user_id: UserID,
        id: ExerciseID,
    ) -> Result<ExerciseID, DeleteError>;
    /// Inserts catalog exercises that are not present yet and returns their number.
    async fn seed_catalog(&self, exercises: Vec<NewExercise>) -> Result<usize, CreateError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exercise {
    pub id: ExerciseID,
    pub owner: Option<UserID>,
    pub name: Name,
    pub description: String,
    pub muscles: Vec<ExerciseMuscle>,
    pub force: Option<Force>,
    pub mechanic: Option<Mechanic>,
    pub equipment: Vec<Equipment>,
    pub category: Category,
}

impl Exercise {
    #[must_use]
    pub fn muscle_stimulus(&self) -> BTreeMap<MuscleID, Stimulus> {
        self.muscles
            .iter()
            .map(|m| (m.muscle_id, m.stimulus))
            .collect()
    }

    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.owner.is_some()
    }
}

/// An exercise that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExercise {
    pub name: Name,
    pub description: String,
    pub muscles: Vec<ExerciseMuscle>,
    pub force: Option<Force>,
    pub mechanic: Option<Mechanic>,
    pub equipment: Vec<Equipment>,
    pub category: Category,
}

impl NewExercise {
    pub fn validate(&self) -> Result<(), ExerciseError> {
        validate_muscles(&self.muscles)?;
        if self.description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(ExerciseError::DescriptionTooLong);
        }
        Ok(())
    }

    #[must_use]
    pub fn into_exercise(self, id: ExerciseID, owner: Option<UserID>) -> Exercise {
        Exercise {
            id,
            owner,
            name: self.name,
            description: self.description,
            muscles: self.muscles,
            force: self.force,
            mechanic: self.mechanic,
            equipment: self.equipment,
            category: self.category,
        }
    }
}

impl From<Exercise> for NewExercise {
    fn from(value: Exercise) -> Self {
        Self {
            name: value.name,
            description: value.description,
            muscles: value.muscles,
            force: value.force,
            mechanic: value.mechanic,
            equipment: value.equipment,
            category: value.category,
        }
    }
}

pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

pub fn validate_muscles(muscles: &[ExerciseMuscle]) -> Result<(), ExerciseError> {
    let mut seen = HashSet::new();
    for m in muscles {
        if m.muscle_id == MuscleID::None {
            return Err(ExerciseError::InvalidMuscle);
        }
        if !seen.insert(m.muscle_id) {
            return Err(ExerciseError::DuplicateMuscle(m.muscle_id.name()));
        }
    }
    Ok(())
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ExerciseError {
    #[error("Muscle {0} must be listed only once")]
    DuplicateMuscle(&'static str),
    #[error("Invalid muscle")]
    InvalidMuscle,
    #[error("Description must be 2000 characters or fewer")]
    DescriptionTooLong,
}

uuid_id!(ExerciseID);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseMuscle {
    pub muscle_id: MuscleID,
    pub stimulus: Stimulus,
}

#[derive(Deref, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stimulus(u32);

impl Stimulus {
    pub const PRIMARY: Stimulus = Stimulus(100);
    pub const SECONDARY: Stimulus = Stimulus(50);
    pub const NONE: Stimulus = Stimulus(0);

    pub fn new(value: u32) -> Result<Self, StimulusError> {
        if value > 100 {
            return Err(StimulusError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    /// The stimulus expressed as a fraction of a primary set.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sets(self) -> f32 {
        self.0 as f32 / 100.0
    }
}

impl Add for Stimulus {
    type Output = Stimulus;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Stimulus {
    fn add_assign(&mut self, rhs: Self) {
        *self = Self(self.0 + rhs.0);
    }
}

impl Mul<u32> for Stimulus {
    type Output = Stimulus;

    fn mul(self, rhs: u32) -> Self::Output {
        Self(self.0 * rhs)
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum StimulusError {
    #[error("Stimulus must be 100 or less ({0} > 100)")]
    OutOfRange(u32),
}

/// An enumerable exercise property with a display name and a stable identifier.
pub trait Property: Clone + Copy + Sized + PartialEq + 'static {
    fn iter() -> Iter<'static, Self>;
    fn name(self) -> &'static str;
    fn slug(self) -> &'static str;

    fn from_slug(slug: &str) -> Option<Self> {
        Self::iter().copied().find(|p| p.slug() == slug)
    }
}

macro_rules! property {
    ($type: ident { $($variant: ident => ($name: literal, $slug: literal)),+ $(,)? }) => {
        impl Property for $type {
            fn iter() -> Iter<'static, $type> {
                static VALUES: &[$type] = &[$($type::$variant),+];
                VALUES.iter()
            }

            fn name(self) -> &'static str {
                match self {
                    $($type::$variant => $name),+
                }
            }

            fn slug(self) -> &'static str {
                match self {
                    $($type::$variant => $slug),+
                }
            }
        }
    };
}

#[derive(Clone, Copy, Default, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MuscleID {
    #[default]
    None = 0,
    // Neck
    Neck = 1,
    // Chest
    Pecs = 11,
    // Back
    Traps = 21,
    Lats = 22,
    // Shoulders
    FrontDelts = 31,
    SideDelts = 32,
    RearDelts = 33,
    // Upper arms
    Biceps = 41,
    Triceps = 42,
    // Forearms
    Forearms = 51,
    // Waist
    Abs = 61,
    ErectorSpinae = 62,
    // Hips
    Glutes = 71,
    Abductors = 72,
    // Thighs
    Quads = 81,
    Hamstrings = 82,
    Adductors = 83,
    // Calves
    Calves = 91,
}

property!(MuscleID {
    Neck => ("Neck", "neck"),
    Pecs => ("Pecs", "pecs"),
    Traps => ("Traps", "traps"),
    Lats => ("Lats", "lats"),
    FrontDelts => ("Front Delts", "front_delts"),
    SideDelts => ("Side Delts", "side_delts"),
    RearDelts => ("Rear Delts", "rear_delts"),
    Biceps => ("Biceps", "biceps"),
    Triceps => ("Triceps", "triceps"),
    Forearms => ("Forearms", "forearms"),
    Abs => ("Abs", "abs"),
    ErectorSpinae => ("Erector Spinae", "erector_spinae"),
    Glutes => ("Glutes", "glutes"),
    Abductors => ("Abductors", "abductors"),
    Quads => ("Quads", "quads"),
    Hamstrings => ("Hamstrings", "hamstrings"),
    Adductors => ("Adductors", "adductors"),
    Calves => ("Calves", "calves"),
    None => ("No Muscle", "none"),
});

impl MuscleID {
    /// All trainable muscles, without [`MuscleID::None`].
    pub fn muscles() -> impl Iterator<Item = MuscleID> {
        Self::iter().copied().filter(|m| *m != MuscleID::None)
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        #[allow(clippy::match_same_arms)]
        match self {
            MuscleID::None => "",
            MuscleID::Neck => "",
            MuscleID::Pecs => "Chest",
            MuscleID::Traps => "Upper back",
            MuscleID::Lats => "Sides of back",
            MuscleID::FrontDelts => "Anterior shoulders",
            MuscleID::SideDelts => "Mid shoulders",
            MuscleID::RearDelts => "Posterior shoulders",
            MuscleID::Biceps => "Front of upper arms",
            MuscleID::Triceps => "Back of upper arms",
            MuscleID::Forearms => "",
            MuscleID::Abs => "Belly",
            MuscleID::ErectorSpinae => "Lower back and spine",
            MuscleID::Glutes => "Buttocks",
            MuscleID::Abductors => "Outside of hips",
            MuscleID::Quads => "Front of thighs",
            MuscleID::Hamstrings => "Back of thighs",
            MuscleID::Adductors => "Inner thighs",
            MuscleID::Calves => "Back of lower legs",
        }
    }
}

impl TryFrom<u8> for MuscleID {
    type Error = MuscleIDError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MuscleID::muscles()
            .find(|m| *m as u8 == value)
            .ok_or(MuscleIDError::Invalid)
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MuscleIDError {
    #[error("Invalid muscle ID")]
    Invalid,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Force {
    Push,
    Pull,
    Static,
}

property!(Force {
    Push => ("Push", "push"),
    Pull => ("Pull", "pull"),
    Static => ("Static", "static"),
});

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Mechanic {
    Compound,
    Isolation,
}

property!(Mechanic {
    Compound => ("Compound", "compound"),
    Isolation => ("Isolation", "isolation"),
});

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Equipment {
    Barbell,
    Bench,
    Box,
    Cable,
    Dumbbell,
    Kettlebell,
    Machine,
    ParallelBars,
    PullUpBar,
    ResistanceBand,
    TrapBar,
}

property!(Equipment {
    Barbell => ("Barbell", "barbell"),
    Bench => ("Bench", "bench"),
    Box => ("Box", "box"),
    Cable => ("Cable", "cable"),
    Dumbbell => ("Dumbbell", "dumbbell"),
    Kettlebell => ("Kettlebell", "kettlebell"),
    Machine => ("Machine", "machine"),
    ParallelBars => ("Parallel Bars", "parallel_bars"),
    PullUpBar => ("Pull Up Bar", "pull_up_bar"),
    ResistanceBand => ("Resistance Band", "resistance_band"),
    TrapBar => ("Trap Bar", "trap_bar"),
});

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Category {
    #[default]
    Strength,
    Plyometrics,
    Cardio,
    Mobility,
}

property!(Category {
    Strength => ("Strength", "strength"),
    Plyometrics => ("Plyometrics", "plyometrics"),
    Cardio => ("Cardio", "cardio"),
    Mobility => ("Mobility", "mobility"),
});

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExerciseFilter {
    pub name: String,
    pub muscles: HashSet<MuscleID>,
    pub force: HashSet<Force>,
    pub mechanic: HashSet<Mechanic>,
    /// `None` in this set selects exercises without equipment.
    pub equipment: HashSet<Option<Equipment>>,
    pub category: HashSet<Category>,
    pub custom_only: bool,
}

impl ExerciseFilter {
    #[must_use]
    pub fn matches(&self, e: &Exercise) -> bool {
        e.name
            .as_ref()
            .to_lowercase()
            .contains(self.name.to_lowercase().trim())
            && (self.muscles.is_empty()
                || self.muscles.iter().all(|m| {
                    if *m == MuscleID::None {
                        e.muscles.is_empty()
                    } else {
                        e.muscles.iter().any(|em| em.muscle_id == *m)
                    }
                }))
            && (self.force.is_empty() || e.force.is_some_and(|f| self.force.contains(&f)))
            && (self.mechanic.is_empty() || e.mechanic.is_some_and(|m| self.mechanic.contains(&m)))
            && (self.equipment.is_empty()
                || self.equipment.iter().any(|equipment| match equipment {
                    None => e.equipment.is_empty(),
                    Some(equipment) => e.equipment.contains(equipment),
                }))
            && (self.category.is_empty() || self.category.contains(&e.category))
            && (!self.custom_only || e.is_custom())
    }
}
