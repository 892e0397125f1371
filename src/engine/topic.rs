use serde::{Deserialize, Serialize};

/// Life area a prediction is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Family,
    Health,
    Finances,
    Career,
    PersonalGrowth,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::Family,
        Topic::Health,
        Topic::Finances,
        Topic::Career,
        Topic::PersonalGrowth,
    ];

    pub fn number(&self) -> u8 {
        match self {
            Self::Family => 1,
            Self::Health => 2,
            Self::Finances => 3,
            Self::Career => 4,
            Self::PersonalGrowth => 5,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.number() == n)
    }

    /// Stable identifier used in storage.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::Health => "health",
            Self::Finances => "finances",
            Self::Career => "career",
            Self::PersonalGrowth => "personal_growth",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.key() == key)
    }

    /// Name handed to the language model.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::Family => "Family & Relationships",
            Self::Health => "Health",
            Self::Finances => "Finances",
            Self::Career => "Career",
            Self::PersonalGrowth => "Personal growth",
        }
    }

    /// Label shown in the topic menu.
    pub fn menu_label(&self) -> &'static str {
        match self {
            Self::Family => "Семья и отношения",
            Self::Health => "Здоровье",
            Self::Finances => "Финансы",
            Self::Career => "Карьера",
            Self::PersonalGrowth => "Личностный рост",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Family => &["семья", "отношения", "любовь", "family", "relationships"],
            Self::Health => &["здоровье", "health"],
            Self::Finances => &["финансы", "деньги", "finances", "money"],
            Self::Career => &["карьера", "работа", "career", "work"],
            Self::PersonalGrowth => &["развитие", "рост", "саморазвитие", "growth"],
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        Self::ALL.iter().copied().find(|t| {
            t.canonical_name().to_lowercase() == needle
                || t.menu_label().to_lowercase() == needle
                || t.aliases().contains(&needle.as_str())
        })
    }
}

/// Map a menu reply onto a topic.
///
/// A single digit `1`–`5` picks by number. A whole-message topic name in
/// Russian or English ("карьера", "Career") is accepted as well.
pub fn select_topic(input: &str) -> Option<Topic> {
    let trimmed = input.trim();
    if trimmed.len() == 1 {
        if let Some(n) = trimmed.chars().next().and_then(|c| c.to_digit(10)) {
            return Topic::from_number(n as u8);
        }
    }
    Topic::from_str_loose(trimmed)
}

/// Numbered menu, one topic per line.
pub fn menu() -> String {
    Topic::ALL
        .iter()
        .map(|t| format!("{}. {}", t.number(), t.menu_label()))
        .collect::<Vec<_>>()
        .join("\n")
}
