use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Narrative-outline schema governing which plot fields are active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum StructureType {
    ThreeAct,
    FourAct,
    HeroJourney,
    BeatSheet,
    MysterySuspense,
}

impl StructureType {
    pub const ALL: [StructureType; 5] = [
        StructureType::ThreeAct,
        StructureType::FourAct,
        StructureType::HeroJourney,
        StructureType::BeatSheet,
        StructureType::MysterySuspense,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StructureType::ThreeAct => "three-act",
            StructureType::FourAct => "four-act",
            StructureType::HeroJourney => "hero-journey",
            StructureType::BeatSheet => "beat-sheet",
            StructureType::MysterySuspense => "mystery-suspense",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StructureType::ThreeAct => "Three-act structure",
            StructureType::FourAct => "Four-act structure (introduction, development, twist, conclusion)",
            StructureType::HeroJourney => "Hero's journey",
            StructureType::BeatSheet => "Beat sheet",
            StructureType::MysterySuspense => "Mystery / suspense",
        }
    }

    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            StructureType::ThreeAct => &["setup", "confrontation", "resolution"],
            StructureType::FourAct => &["introduction", "development", "twist", "conclusion"],
            StructureType::HeroJourney => &[
                "ordinary_world",
                "call_to_adventure",
                "trials",
                "ordeal",
                "return_home",
            ],
            StructureType::BeatSheet => &[
                "opening_image",
                "catalyst",
                "midpoint",
                "all_is_lost",
                "finale",
            ],
            StructureType::MysterySuspense => &[
                "crime",
                "investigation",
                "red_herrings",
                "revelation",
                "aftermath",
            ],
        }
    }
}

impl Default for StructureType {
    fn default() -> Self {
        StructureType::ThreeAct
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeActFields {
    #[serde(default)]
    pub setup: String,
    #[serde(default)]
    pub confrontation: String,
    #[serde(default)]
    pub resolution: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FourActFields {
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub development: String,
    #[serde(default)]
    pub twist: String,
    #[serde(default)]
    pub conclusion: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroJourneyFields {
    #[serde(default)]
    pub ordinary_world: String,
    #[serde(default)]
    pub call_to_adventure: String,
    #[serde(default)]
    pub trials: String,
    #[serde(default)]
    pub ordeal: String,
    #[serde(default)]
    pub return_home: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatSheetFields {
    #[serde(default)]
    pub opening_image: String,
    #[serde(default)]
    pub catalyst: String,
    #[serde(default)]
    pub midpoint: String,
    #[serde(default)]
    pub all_is_lost: String,
    #[serde(default)]
    pub finale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MysteryFields {
    #[serde(default)]
    pub crime: String,
    #[serde(default)]
    pub investigation: String,
    #[serde(default)]
    pub red_herrings: String,
    #[serde(default)]
    pub revelation: String,
    #[serde(default)]
    pub aftermath: String,
}

/// Free-text fields of exactly one structure type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "structure", rename_all = "kebab-case")]
pub enum StructureFields {
    ThreeAct(ThreeActFields),
    FourAct(FourActFields),
    HeroJourney(HeroJourneyFields),
    BeatSheet(BeatSheetFields),
    MysterySuspense(MysteryFields),
}

impl StructureFields {
    pub fn empty(structure: StructureType) -> Self {
        match structure {
            StructureType::ThreeAct => StructureFields::ThreeAct(ThreeActFields::default()),
            StructureType::FourAct => StructureFields::FourAct(FourActFields::default()),
            StructureType::HeroJourney => {
                StructureFields::HeroJourney(HeroJourneyFields::default())
            }
            StructureType::BeatSheet => StructureFields::BeatSheet(BeatSheetFields::default()),
            StructureType::MysterySuspense => {
                StructureFields::MysterySuspense(MysteryFields::default())
            }
        }
    }

    pub fn structure_type(&self) -> StructureType {
        match self {
            StructureFields::ThreeAct(_) => StructureType::ThreeAct,
            StructureFields::FourAct(_) => StructureType::FourAct,
            StructureFields::HeroJourney(_) => StructureType::HeroJourney,
            StructureFields::BeatSheet(_) => StructureType::BeatSheet,
            StructureFields::MysterySuspense(_) => StructureType::MysterySuspense,
        }
    }

    /// Field name/value pairs in declaration order.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        match self {
            StructureFields::ThreeAct(f) => vec![
                ("setup", f.setup.as_str()),
                ("confrontation", f.confrontation.as_str()),
                ("resolution", f.resolution.as_str()),
            ],
            StructureFields::FourAct(f) => vec![
                ("introduction", f.introduction.as_str()),
                ("development", f.development.as_str()),
                ("twist", f.twist.as_str()),
                ("conclusion", f.conclusion.as_str()),
            ],
            StructureFields::HeroJourney(f) => vec![
                ("ordinary_world", f.ordinary_world.as_str()),
                ("call_to_adventure", f.call_to_adventure.as_str()),
                ("trials", f.trials.as_str()),
                ("ordeal", f.ordeal.as_str()),
                ("return_home", f.return_home.as_str()),
            ],
            StructureFields::BeatSheet(f) => vec![
                ("opening_image", f.opening_image.as_str()),
                ("catalyst", f.catalyst.as_str()),
                ("midpoint", f.midpoint.as_str()),
                ("all_is_lost", f.all_is_lost.as_str()),
                ("finale", f.finale.as_str()),
            ],
            StructureFields::MysterySuspense(f) => vec![
                ("crime", f.crime.as_str()),
                ("investigation", f.investigation.as_str()),
                ("red_herrings", f.red_herrings.as_str()),
                ("revelation", f.revelation.as_str()),
                ("aftermath", f.aftermath.as_str()),
            ],
        }
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut String> {
        let slot = match self {
            StructureFields::ThreeAct(f) => match name {
                "setup" => &mut f.setup,
                "confrontation" => &mut f.confrontation,
                "resolution" => &mut f.resolution,
                _ => return None,
            },
            StructureFields::FourAct(f) => match name {
                "introduction" => &mut f.introduction,
                "development" => &mut f.development,
                "twist" => &mut f.twist,
                "conclusion" => &mut f.conclusion,
                _ => return None,
            },
            StructureFields::HeroJourney(f) => match name {
                "ordinary_world" => &mut f.ordinary_world,
                "call_to_adventure" => &mut f.call_to_adventure,
                "trials" => &mut f.trials,
                "ordeal" => &mut f.ordeal,
                "return_home" => &mut f.return_home,
                _ => return None,
            },
            StructureFields::BeatSheet(f) => match name {
                "opening_image" => &mut f.opening_image,
                "catalyst" => &mut f.catalyst,
                "midpoint" => &mut f.midpoint,
                "all_is_lost" => &mut f.all_is_lost,
                "finale" => &mut f.finale,
                _ => return None,
            },
            StructureFields::MysterySuspense(f) => match name {
                "crime" => &mut f.crime,
                "investigation" => &mut f.investigation,
                "red_herrings" => &mut f.red_herrings,
                "revelation" => &mut f.revelation,
                "aftermath" => &mut f.aftermath,
                _ => return None,
            },
        };
        Some(slot)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries()
            .into_iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// Sets a field by name. Returns false for names this structure does not own.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.slot_mut(name) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.entries().iter().all(|(_, value)| value.trim().is_empty())
    }
}

/// Plot field values for every structure the author has touched, keyed by structure type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlotFormState(BTreeMap<StructureType, StructureFields>);

impl PlotFormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields for `structure`, blank when never edited.
    pub fn fields(&self, structure: StructureType) -> StructureFields {
        self.0
            .get(&structure)
            .cloned()
            .unwrap_or_else(|| StructureFields::empty(structure))
    }

    pub fn set_field(
        &mut self,
        structure: StructureType,
        name: &str,
        value: impl Into<String>,
    ) -> bool {
        self.0
            .entry(structure)
            .or_insert_with(|| StructureFields::empty(structure))
            .set(name, value)
    }

    pub fn insert(&mut self, fields: StructureFields) {
        self.0.insert(fields.structure_type(), fields);
    }
}

/// Plot outline attached to a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plot {
    #[serde(default)]
    pub structure_type: StructureType,
    #[serde(default)]
    pub form: PlotFormState,
}

impl Plot {
    /// Fields of the selected structure only; other structures never reach prompts.
    pub fn active_fields(&self) -> StructureFields {
        self.form.fields(self.structure_type)
    }

    pub fn describe(&self) -> String {
        let mut out = format!("Structure: {}\n", self.structure_type.label());
        for (name, value) in self.active_fields().entries() {
            if value.trim().is_empty() {
                continue;
            }
            out.push_str(&format!("- {}: {}\n", name.replace('_', " "), value.trim()));
        }
        out
    }
}
