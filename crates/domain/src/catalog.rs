use crate::{
    Category, Equipment, ExerciseMuscle, Force, Mechanic, MuscleID, Name, NewExercise, Stimulus,
};

use Equipment as E;
use MuscleID as M;

/// A built-in exercise available to every user.
pub struct CatalogExercise {
    pub name: &'static str,
    pub primary: &'static [MuscleID],
    pub secondary: &'static [MuscleID],
    pub force: Force,
    pub mechanic: Mechanic,
    pub equipment: &'static [Equipment],
    pub category: Category,
}

impl CatalogExercise {
    #[must_use]
    pub fn to_new_exercise(&self) -> Option<NewExercise> {
        Some(NewExercise {
            name: Name::new(self.name).ok()?,
            description: String::new(),
            muscles: self
                .primary
                .iter()
                .map(|m| ExerciseMuscle {
                    muscle_id: *m,
                    stimulus: Stimulus::PRIMARY,
                })
                .chain(self.secondary.iter().map(|m| ExerciseMuscle {
                    muscle_id: *m,
                    stimulus: Stimulus::SECONDARY,
                }))
                .collect(),
            force: Some(self.force),
            mechanic: Some(self.mechanic),
            equipment: self.equipment.to_vec(),
            category: self.category,
        })
    }
}

const fn exercise(
    name: &'static str,
    primary: &'static [MuscleID],
    secondary: &'static [MuscleID],
    force: Force,
    mechanic: Mechanic,
    equipment: &'static [Equipment],
) -> CatalogExercise {
    CatalogExercise {
        name,
        primary,
        secondary,
        force,
        mechanic,
        equipment,
        category: Category::Strength,
    }
}

use Force::{Pull, Push, Static};
use Mechanic::{Compound, Isolation};

pub static EXERCISES: &[CatalogExercise] = &[
    exercise(
        "Barbell Bench Press",
        &[M::Pecs],
        &[M::FrontDelts, M::Triceps],
        Push,
        Compound,
        &[E::Barbell, E::Bench],
    ),
    exercise(
        "Incline Dumbbell Press",
        &[M::Pecs, M::FrontDelts],
        &[M::Triceps],
        Push,
        Compound,
        &[E::Dumbbell, E::Bench],
    ),
    exercise(
        "Push Up",
        &[M::Pecs],
        &[M::FrontDelts, M::Triceps, M::Abs],
        Push,
        Compound,
        &[],
    ),
    exercise(
        "Dip",
        &[M::Pecs, M::Triceps],
        &[M::FrontDelts],
        Push,
        Compound,
        &[E::ParallelBars],
    ),
    exercise(
        "Cable Fly",
        &[M::Pecs],
        &[M::FrontDelts],
        Push,
        Isolation,
        &[E::Cable],
    ),
    exercise(
        "Overhead Press",
        &[M::FrontDelts],
        &[M::SideDelts, M::Triceps],
        Push,
        Compound,
        &[E::Barbell],
    ),
    exercise(
        "Dumbbell Lateral Raise",
        &[M::SideDelts],
        &[],
        Push,
        Isolation,
        &[E::Dumbbell],
    ),
    exercise(
        "Face Pull",
        &[M::RearDelts],
        &[M::Traps],
        Pull,
        Isolation,
        &[E::Cable],
    ),
    exercise(
        "Pull Up",
        &[M::Lats],
        &[M::Biceps, M::RearDelts],
        Pull,
        Compound,
        &[E::PullUpBar],
    ),
    exercise(
        "Chin Up",
        &[M::Lats, M::Biceps],
        &[M::RearDelts],
        Pull,
        Compound,
        &[E::PullUpBar],
    ),
    exercise(
        "Lat Pulldown",
        &[M::Lats],
        &[M::Biceps],
        Pull,
        Compound,
        &[E::Cable],
    ),
    exercise(
        "Barbell Row",
        &[M::Lats, M::Traps],
        &[M::RearDelts, M::Biceps, M::ErectorSpinae],
        Pull,
        Compound,
        &[E::Barbell],
    ),
    exercise(
        "Seated Cable Row",
        &[M::Lats, M::Traps],
        &[M::RearDelts, M::Biceps],
        Pull,
        Compound,
        &[E::Cable],
    ),
    exercise(
        "Barbell Shrug",
        &[M::Traps],
        &[M::Forearms],
        Pull,
        Isolation,
        &[E::Barbell],
    ),
    exercise(
        "Barbell Curl",
        &[M::Biceps],
        &[M::Forearms],
        Pull,
        Isolation,
        &[E::Barbell],
    ),
    exercise(
        "Hammer Curl",
        &[M::Biceps, M::Forearms],
        &[],
        Pull,
        Isolation,
        &[E::Dumbbell],
    ),
    exercise(
        "Triceps Pushdown",
        &[M::Triceps],
        &[],
        Push,
        Isolation,
        &[E::Cable],
    ),
    exercise(
        "Skull Crusher",
        &[M::Triceps],
        &[],
        Push,
        Isolation,
        &[E::Barbell, E::Bench],
    ),
    exercise(
        "Back Squat",
        &[M::Quads, M::Glutes],
        &[M::Adductors, M::ErectorSpinae],
        Push,
        Compound,
        &[E::Barbell],
    ),
    exercise(
        "Front Squat",
        &[M::Quads],
        &[M::Glutes, M::Abs],
        Push,
        Compound,
        &[E::Barbell],
    ),
    exercise(
        "Goblet Squat",
        &[M::Quads, M::Glutes],
        &[M::Adductors],
        Push,
        Compound,
        &[E::Kettlebell],
    ),
    exercise(
        "Bulgarian Split Squat",
        &[M::Quads, M::Glutes],
        &[M::Adductors],
        Push,
        Compound,
        &[E::Dumbbell, E::Bench],
    ),
    exercise(
        "Leg Press",
        &[M::Quads],
        &[M::Glutes],
        Push,
        Compound,
        &[E::Machine],
    ),
    exercise(
        "Leg Extension",
        &[M::Quads],
        &[],
        Push,
        Isolation,
        &[E::Machine],
    ),
    exercise(
        "Deadlift",
        &[M::Glutes, M::Hamstrings, M::ErectorSpinae],
        &[M::Quads, M::Traps, M::Forearms],
        Pull,
        Compound,
        &[E::Barbell],
    ),
    exercise(
        "Trap Bar Deadlift",
        &[M::Glutes, M::Quads],
        &[M::Hamstrings, M::Traps, M::ErectorSpinae],
        Pull,
        Compound,
        &[E::TrapBar],
    ),
    exercise(
        "Romanian Deadlift",
        &[M::Hamstrings, M::Glutes],
        &[M::ErectorSpinae],
        Pull,
        Compound,
        &[E::Barbell],
    ),
    exercise(
        "Hip Thrust",
        &[M::Glutes],
        &[M::Hamstrings],
        Push,
        Isolation,
        &[E::Barbell, E::Bench],
    ),
    exercise(
        "Lying Leg Curl",
        &[M::Hamstrings],
        &[M::Calves],
        Pull,
        Isolation,
        &[E::Machine],
    ),
    exercise(
        "Standing Calf Raise",
        &[M::Calves],
        &[],
        Push,
        Isolation,
        &[E::Machine],
    ),
    exercise(
        "Hanging Leg Raise",
        &[M::Abs],
        &[M::Forearms],
        Pull,
        Isolation,
        &[E::PullUpBar],
    ),
    exercise("Plank", &[M::Abs], &[M::ErectorSpinae], Static, Isolation, &[]),
    exercise(
        "Back Extension",
        &[M::ErectorSpinae],
        &[M::Glutes, M::Hamstrings],
        Pull,
        Isolation,
        &[],
    ),
    exercise(
        "Kettlebell Swing",
        &[M::Glutes, M::Hamstrings],
        &[M::ErectorSpinae, M::Forearms],
        Pull,
        Compound,
        &[E::Kettlebell],
    ),
    exercise(
        "Neck Curl",
        &[M::Neck],
        &[],
        Pull,
        Isolation,
        &[],
    ),
    CatalogExercise {
        name: "Box Jump",
        primary: &[M::Quads, M::Glutes],
        secondary: &[M::Calves],
        force: Push,
        mechanic: Compound,
        equipment: &[E::Box],
        category: Category::Plyometrics,
    },
    CatalogExercise {
        name: "Band Pull Apart",
        primary: &[M::RearDelts],
        secondary: &[M::Traps],
        force: Pull,
        mechanic: Isolation,
        equipment: &[E::ResistanceBand],
        category: Category::Mobility,
    },
];

/// The catalog as exercises ready to be stored.
#[must_use]
pub fn exercises() -> Vec<NewExercise> {
    EXERCISES
        .iter()
        .filter_map(CatalogExercise::to_new_exercise)
        .collect()
}
