//! Birth data extraction from free-form Russian text.
//!
//! A message only yields a result when it carries a `DD.MM.YYYY` date. Time and
//! place are optional and fall back to [`ExtractorDefaults`].

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use super::profile::Profile;

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2})\.(\d{2})\.(\d{4})").expect("date regex"));

static CLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2}):(\d{2})").expect("clock regex"));

static HOUR_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*час(?:ов|а)?\b").expect("hour word regex")
});

static BARE_HOUR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\b").expect("bare hour regex"));

static PLACE_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:место|город)\s*:\s*([^\d\n,;]+)").expect("place marker regex")
});

const EVENING_WORDS: &[&str] = &["дня", "вечера", "вечером", "вечер", "pm"];
const NIGHT_WORDS: &[&str] = &["ночи", "ночью"];
const MORNING_WORDS: &[&str] = &["утра", "утром", "am"];

/// Words that never name a place, even when they end the message.
const CITY_STOP_WORDS: &[&str] = &[
    "около", "примерно", "в", "во", "час", "часа", "часов", "место", "город",
];

/// Calendar date as written by the user. Not validated against the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BirthDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl BirthDate {
    pub fn to_naive(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day))
    }
}

impl fmt::Display for BirthDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Local wall-clock time, 24-hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BirthTime {
    pub hour: u8,
    pub minute: u8,
}

impl BirthTime {
    pub const NOON: BirthTime = BirthTime { hour: 12, minute: 0 };
}

impl fmt::Display for BirthTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Oddities found while extracting. They are reported, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionNote {
    /// e.g. `31.02.1990`
    ImpossibleCalendarDate,
    FutureDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub birthdate: BirthDate,
    pub birthtime: BirthTime,
    pub city: String,
    pub notes: Vec<ExtractionNote>,
}

impl ExtractionResult {
    pub fn into_profile(self) -> Profile {
        Profile {
            birthdate: Some(self.birthdate.to_string()),
            birthtime: Some(self.birthtime.to_string()),
            city: Some(self.city),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorDefaults {
    pub time: BirthTime,
    pub city: String,
}

impl Default for ExtractorDefaults {
    fn default() -> Self {
        Self {
            time: BirthTime::NOON,
            city: "Москва".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extractor {
    defaults: ExtractorDefaults,
}

/// Whether `text` carries a `DD.MM.YYYY` date anywhere.
pub fn contains_date(text: &str) -> bool {
    DATE_RE.is_match(text)
}

impl Extractor {
    pub fn new(defaults: ExtractorDefaults) -> Self {
        Self { defaults }
    }

    /// Parse date, time and place out of `text`.
    ///
    /// Returns `None` only when there is no date. Once a date is found the
    /// result is always complete, with defaults standing in for time and city.
    pub fn extract(&self, text: &str, today: NaiveDate) -> Option<ExtractionResult> {
        let caps = DATE_RE.captures(text)?;
        let birthdate = BirthDate {
            year: caps[3].parse().ok()?,
            month: caps[2].parse().ok()?,
            day: caps[1].parse().ok()?,
        };

        let mut notes = Vec::new();
        match birthdate.to_naive() {
            None => notes.push(ExtractionNote::ImpossibleCalendarDate),
            Some(date) if date > today => notes.push(ExtractionNote::FutureDate),
            Some(_) => {}
        }

        Some(ExtractionResult {
            birthdate,
            birthtime: self.extract_time(text).unwrap_or(self.defaults.time),
            city: self
                .extract_city(text)
                .unwrap_or_else(|| self.defaults.city.clone()),
            notes,
        })
    }

    /// Birth time mentioned in `text`, ignoring any date in it.
    ///
    /// Tried in order: `HH:MM`, `H часов`, a bare `H`. Day-period words
    /// ("вечера", "утра", ...) shift the hour into 24-hour form.
    pub fn extract_time(&self, text: &str) -> Option<BirthTime> {
        let rest = strip_dates(text);

        let (hour, minute) = if let Some(caps) = CLOCK_RE.captures(&rest) {
            (caps[1].parse::<u32>().ok()?, caps[2].parse::<u32>().ok()?)
        } else if let Some(caps) = HOUR_WORD_RE.captures(&rest) {
            (caps[1].parse::<u32>().ok()?, 0)
        } else if let Some(caps) = BARE_HOUR_RE.captures(&rest) {
            (caps[1].parse::<u32>().ok()?, 0)
        } else {
            return None;
        };

        let words = lowercase_words(&rest);
        let hour = correct_for_day_period(hour, &words).min(23);

        Some(BirthTime {
            hour: hour as u8,
            minute: minute.min(59) as u8,
        })
    }

    /// Place of birth mentioned in `text`.
    ///
    /// An explicit `город:` / `место:` marker wins. Otherwise the last word
    /// that is neither a number nor a stop-word is taken, so "Нижний Новгород"
    /// comes back as "Новгород".
    pub fn extract_city(&self, text: &str) -> Option<String> {
        if let Some(city) = self.extract_marked_city(text) {
            return Some(city);
        }

        strip_dates(text)
            .split_whitespace()
            .rev()
            .map(trim_token)
            .find(|token| {
                !token.is_empty()
                    && !token.chars().any(|c| c.is_ascii_digit())
                    && !is_stop_word(token)
            })
            .map(str::to_string)
    }

    /// Place given after an explicit `город:` / `место:` marker, without
    /// trailing stop-words ("город: Москва в 14:30" is "Москва").
    pub fn extract_marked_city(&self, text: &str) -> Option<String> {
        let caps = PLACE_MARKER_RE.captures(text)?;
        let mut words: Vec<&str> = caps[1]
            .split_whitespace()
            .map(trim_token)
            .filter(|w| !w.is_empty())
            .collect();
        while words.last().is_some_and(|w| is_stop_word(w)) {
            words.pop();
        }
        (!words.is_empty()).then(|| words.join(" "))
    }
}

fn strip_dates(text: &str) -> String {
    DATE_RE.replace_all(text, " ").into_owned()
}

fn lowercase_words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn correct_for_day_period(hour: u32, words: &HashSet<String>) -> u32 {
    let has = |list: &[&str]| list.iter().any(|w| words.contains(*w));

    if has(EVENING_WORDS) && hour < 12 {
        hour + 12
    } else if has(NIGHT_WORDS) && (6..12).contains(&hour) {
        // "2 ночи" is already 02:00, "11 ночи" is 23:00
        hour + 12
    } else if (has(MORNING_WORDS) || has(NIGHT_WORDS)) && hour == 12 {
        // "12 утра" and "12 ночи" are both midnight
        0
    } else {
        hour
    }
}

fn is_stop_word(token: &str) -> bool {
    let lower = token.to_lowercase();
    CITY_STOP_WORDS.contains(&lower.as_str())
        || EVENING_WORDS.contains(&lower.as_str())
        || NIGHT_WORDS.contains(&lower.as_str())
        || MORNING_WORDS.contains(&lower.as_str())
}

fn trim_token(token: &str) -> &str {
    token
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
        .trim_matches('-')
}
