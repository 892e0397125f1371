use serde::{Deserialize, Serialize};

/// Birth data stored for one session. Fields may be missing on rows that
/// were written by hand or by older handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub birthdate: Option<String>,
    pub birthtime: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Birthdate,
    Birthtime,
    City,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Birthdate, Field::Birthtime, Field::City];

    /// How the field is asked for in a reply.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            Self::Birthdate => "дату рождения (ДД.ММ.ГГГГ)",
            Self::Birthtime => "время рождения (ЧЧ:ММ)",
            Self::City => "город рождения",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileState {
    None,
    Partial,
    Complete,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl Profile {
    pub fn get(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Birthdate => &self.birthdate,
            Field::Birthtime => &self.birthtime,
            Field::City => &self.city,
        };
        if present(value) {
            value.as_deref()
        } else {
            None
        }
    }

    pub fn is_complete(&self) -> bool {
        Field::ALL.iter().all(|f| self.get(*f).is_some())
    }

    /// Overlay `patch` on top of `self`. Present patch fields win.
    pub fn merge(&self, patch: &Profile) -> Profile {
        let pick = |new: &Option<String>, old: &Option<String>| {
            if present(new) {
                new.clone()
            } else {
                old.clone()
            }
        };
        Profile {
            birthdate: pick(&patch.birthdate, &self.birthdate),
            birthtime: pick(&patch.birthtime, &self.birthtime),
            city: pick(&patch.city, &self.city),
        }
    }

    /// One-line summary used in prompts and confirmations.
    pub fn describe(&self) -> String {
        Field::ALL
            .iter()
            .filter_map(|f| self.get(*f))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn classify(profile: Option<&Profile>) -> ProfileState {
    match profile {
        None => ProfileState::None,
        Some(p) if p.is_complete() => ProfileState::Complete,
        Some(_) => ProfileState::Partial,
    }
}

/// Fields still needed, in the order they are asked for.
pub fn missing_fields(profile: Option<&Profile>) -> Vec<Field> {
    match profile {
        None => Field::ALL.to_vec(),
        Some(p) => Field::ALL
            .iter()
            .copied()
            .filter(|f| p.get(*f).is_none())
            .collect(),
    }
}
