//! Relationship kinds and their human-readable labels.
//!
//! A [`Relationship`] always describes what person B is to person A. Labels
//! follow B's recorded sex; unknown sex yields the neutral form.

use serde::{Deserialize, Serialize};

use kinship_core::{ParentType, Sex};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SiblingKind {
    Full,
    Half,
}

/// How A's sibling-defining parent set compares with B's.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParentOverlap {
    Equal,
    /// A's parents are a strict subset of B's.
    Subset,
    /// A's parents are a strict superset of B's.
    Superset,
    /// Each side has a parent the other lacks.
    Partial,
}

impl ParentOverlap {
    pub fn mirror(self) -> Self {
        match self {
            ParentOverlap::Subset => ParentOverlap::Superset,
            ParentOverlap::Superset => ParentOverlap::Subset,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Relationship {
    #[serde(rename = "self")]
    SelfPerson,
    Parent { edge_type: ParentType },
    Child { edge_type: ParentType },
    Spouse,
    Sibling { sibling: SiblingKind, overlap: ParentOverlap },
    Grandparent,
    Grandchild,
    AuntUncle,
    NieceNephew,
    FirstCousin,
    StepParent,
    StepChild,
    StepSibling,
    ParentInLaw,
    ChildInLaw,
    SiblingInLaw,
    /// B is A's ancestor `generations` levels up (3 = great-grandparent).
    Ancestor { generations: u32 },
    Descendant { generations: u32 },
    Cousin { degree: u32, removed: u32 },
    /// B descends `down` levels from an ancestor `up` levels above A, where
    /// one side is a single level (great-aunts, grand-nieces).
    Collateral { up: u32, down: u32 },
    /// Connected through a mixed path of `steps` edges.
    Related { steps: u32 },
}

impl Relationship {
    /// What A is to B.
    pub fn mirror(self) -> Self {
        use Relationship::*;
        match self {
            SelfPerson => SelfPerson,
            Parent { edge_type } => Child { edge_type },
            Child { edge_type } => Parent { edge_type },
            Spouse => Spouse,
            Sibling { sibling, overlap } => Sibling {
                sibling,
                overlap: overlap.mirror(),
            },
            Grandparent => Grandchild,
            Grandchild => Grandparent,
            AuntUncle => NieceNephew,
            NieceNephew => AuntUncle,
            FirstCousin => FirstCousin,
            StepParent => StepChild,
            StepChild => StepParent,
            StepSibling => StepSibling,
            ParentInLaw => ChildInLaw,
            ChildInLaw => ParentInLaw,
            SiblingInLaw => SiblingInLaw,
            Ancestor { generations } => Descendant { generations },
            Descendant { generations } => Ancestor { generations },
            Cousin { degree, removed } => Cousin { degree, removed },
            Collateral { up, down } => Collateral { up: down, down: up },
            Related { steps } => Related { steps },
        }
    }

    /// Blood relationship through a common ancestor `up` generations above A
    /// and `down` generations above B.
    pub fn from_generations(up: u32, down: u32) -> Self {
        use Relationship::*;
        match (up, down) {
            (0, 0) => SelfPerson,
            (0, 1) => Child {
                edge_type: ParentType::Biological,
            },
            (1, 0) => Parent {
                edge_type: ParentType::Biological,
            },
            (0, 2) => Grandchild,
            (2, 0) => Grandparent,
            (0, g) => Descendant { generations: g },
            (g, 0) => Ancestor { generations: g },
            (2, 1) => AuntUncle,
            (1, 2) => NieceNephew,
            (2, 2) => FirstCousin,
            (1, _) | (_, 1) => Collateral { up, down },
            (a, b) => Cousin {
                degree: a.min(b) - 1,
                removed: a.abs_diff(b),
            },
        }
    }
}

/// Display text and translation key for `relationship`, given B's sex.
pub fn describe(relationship: Relationship, sex: Sex) -> (String, String) {
    use Relationship::*;
    let gendered = |male: &str, female: &str, neutral: &str| -> String {
        match sex {
            Sex::Male => male.to_string(),
            Sex::Female => female.to_string(),
            Sex::Unknown => neutral.to_string(),
        }
    };
    let key_for = |male: &str, female: &str, neutral: &str| -> String {
        let base = match sex {
            Sex::Male => male,
            Sex::Female => female,
            Sex::Unknown => neutral,
        };
        format!("kinship.{base}")
    };

    match relationship {
        SelfPerson => ("Self".to_string(), "kinship.self".to_string()),
        Parent { edge_type } => parent_label(edge_type, sex),
        Child { edge_type } => child_label(edge_type, sex),
        Spouse => (
            gendered("Husband", "Wife", "Spouse"),
            key_for("husband", "wife", "spouse"),
        ),
        Sibling {
            sibling: SiblingKind::Full,
            ..
        } => (
            gendered("Brother", "Sister", "Sibling"),
            key_for("brother", "sister", "sibling"),
        ),
        Sibling {
            sibling: SiblingKind::Half,
            ..
        } => (
            gendered("Half-brother", "Half-sister", "Half-sibling"),
            key_for("half_brother", "half_sister", "half_sibling"),
        ),
        Grandparent => (
            gendered("Grandfather", "Grandmother", "Grandparent"),
            key_for("grandfather", "grandmother", "grandparent"),
        ),
        Grandchild => (
            gendered("Grandson", "Granddaughter", "Grandchild"),
            key_for("grandson", "granddaughter", "grandchild"),
        ),
        AuntUncle => (
            gendered("Uncle", "Aunt", "Aunt/Uncle"),
            key_for("uncle", "aunt", "aunt_uncle"),
        ),
        NieceNephew => (
            gendered("Nephew", "Niece", "Niece/Nephew"),
            key_for("nephew", "niece", "niece_nephew"),
        ),
        FirstCousin => ("Cousin".to_string(), "kinship.cousin".to_string()),
        StepParent => parent_label(ParentType::Step, sex),
        StepChild => child_label(ParentType::Step, sex),
        StepSibling => (
            gendered("Stepbrother", "Stepsister", "Step-sibling"),
            key_for("stepbrother", "stepsister", "step_sibling"),
        ),
        ParentInLaw => (
            gendered("Father-in-law", "Mother-in-law", "Parent-in-law"),
            key_for("father_in_law", "mother_in_law", "parent_in_law"),
        ),
        ChildInLaw => (
            gendered("Son-in-law", "Daughter-in-law", "Child-in-law"),
            key_for("son_in_law", "daughter_in_law", "child_in_law"),
        ),
        SiblingInLaw => (
            gendered("Brother-in-law", "Sister-in-law", "Sibling-in-law"),
            key_for("brother_in_law", "sister_in_law", "sibling_in_law"),
        ),
        Ancestor { generations } => {
            let base = gendered("grandfather", "grandmother", "grandparent");
            (
                capitalize(&format!("{}{base}", greats(generations.saturating_sub(2)))),
                key_for("ancestor_male", "ancestor_female", "ancestor"),
            )
        }
        Descendant { generations } => {
            let base = gendered("grandson", "granddaughter", "grandchild");
            (
                capitalize(&format!("{}{base}", greats(generations.saturating_sub(2)))),
                key_for("descendant_male", "descendant_female", "descendant"),
            )
        }
        Collateral { up, down } if down == 1 => {
            let base = gendered("uncle", "aunt", "aunt/uncle");
            (
                capitalize(&format!("{}{base}", greats(up.saturating_sub(2)))),
                key_for("great_uncle", "great_aunt", "great_aunt_uncle"),
            )
        }
        Collateral { down, .. } => {
            let base = gendered("nephew", "niece", "niece/nephew");
            (
                capitalize(&format!("{}grand-{base}", greats(down.saturating_sub(3)))),
                key_for("grand_nephew", "grand_niece", "grand_niece_nephew"),
            )
        }
        Cousin { degree, removed } => {
            let mut text = format!("{} cousin", ordinal(degree));
            if removed > 0 {
                text.push(' ');
                text.push_str(&times_removed(removed));
            }
            (capitalize(&text), "kinship.cousin_removed".to_string())
        }
        Related { steps } => (
            format!("Relative ({steps} steps)"),
            "kinship.related".to_string(),
        ),
    }
}

fn parent_label(edge_type: ParentType, sex: Sex) -> (String, String) {
    let (male, female, neutral, key) = match edge_type {
        ParentType::Biological => ("Father", "Mother", "Parent", ["father", "mother", "parent"]),
        ParentType::Adoptive => (
            "Adoptive Father",
            "Adoptive Mother",
            "Adoptive Parent",
            ["adoptive_father", "adoptive_mother", "adoptive_parent"],
        ),
        ParentType::Step => (
            "Stepfather",
            "Stepmother",
            "Step-parent",
            ["stepfather", "stepmother", "step_parent"],
        ),
        ParentType::Foster => (
            "Foster Father",
            "Foster Mother",
            "Foster Parent",
            ["foster_father", "foster_mother", "foster_parent"],
        ),
        ParentType::Guardian => ("Guardian", "Guardian", "Guardian", ["guardian"; 3]),
    };
    pick(sex, male, female, neutral, key)
}

fn child_label(edge_type: ParentType, sex: Sex) -> (String, String) {
    let (male, female, neutral, key) = match edge_type {
        ParentType::Biological => ("Son", "Daughter", "Child", ["son", "daughter", "child"]),
        ParentType::Adoptive => (
            "Adopted Son",
            "Adopted Daughter",
            "Adopted Child",
            ["adopted_son", "adopted_daughter", "adopted_child"],
        ),
        ParentType::Step => (
            "Stepson",
            "Stepdaughter",
            "Stepchild",
            ["stepson", "stepdaughter", "stepchild"],
        ),
        ParentType::Foster => (
            "Foster Son",
            "Foster Daughter",
            "Foster Child",
            ["foster_son", "foster_daughter", "foster_child"],
        ),
        ParentType::Guardian => ("Ward", "Ward", "Ward", ["ward"; 3]),
    };
    pick(sex, male, female, neutral, key)
}

fn pick(sex: Sex, male: &str, female: &str, neutral: &str, key: [&str; 3]) -> (String, String) {
    let (text, k) = match sex {
        Sex::Male => (male, key[0]),
        Sex::Female => (female, key[1]),
        Sex::Unknown => (neutral, key[2]),
    };
    (text.to_string(), format!("kinship.{k}"))
}

fn greats(n: u32) -> String {
    "great-".repeat(n as usize)
}

fn ordinal(n: u32) -> String {
    match n {
        1 => "first".to_string(),
        2 => "second".to_string(),
        3 => "third".to_string(),
        4 => "fourth".to_string(),
        5 => "fifth".to_string(),
        n => format!("{n}th"),
    }
}

fn times_removed(n: u32) -> String {
    match n {
        1 => "once removed".to_string(),
        2 => "twice removed".to_string(),
        3 => "thrice removed".to_string(),
        n => format!("{n} times removed"),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
