use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::profile::Profile;
use crate::engine::topic::Topic;

const PERSONA: &str = "\
Ты — София, эксперт по астрологии с 8-летним опытом.
Стиль общения: профессиональный, но дружелюбный.
Запрещено: упоминать, что ты ИИ или используешь базу данных.
Отвечай кратко, но полно, не углубляясь в теории. Используй конкретные примеры и рекомендации, основанные на астрологии.";

static AI_MENTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)как (искусственный интеллект|ИИ|бот)").expect("ai mention regex")
});

static SOURCE_MENTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)согласно моим (данным|материалам)").expect("source mention regex")
});

static EXTRA_SPACES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("spaces regex"));

/// Birth data known about the user, from the profile or from the request.
#[derive(Debug, Clone, Default)]
pub struct BirthContext<'a> {
    pub profile: Option<&'a Profile>,
    /// Free-form birthdate passed by the web widget.
    pub birthdate_hint: Option<&'a str>,
}

/// Build the system prompt: persona first, then whatever is known about the user.
pub fn build_system_prompt(birth: &BirthContext<'_>) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(PERSONA);

    let described = birth
        .profile
        .map(Profile::describe)
        .filter(|d| !d.is_empty());

    if let Some(described) = described {
        prompt.push_str("\n\n## О пользователе\n");
        prompt.push_str(&format!(
            "Данные рождения пользователя (дата, время, город): {}. \
             Учитывай его астрологические особенности при ответах.",
            described
        ));
    } else if let Some(hint) = birth.birthdate_hint.map(str::trim).filter(|h| !h.is_empty()) {
        prompt.push_str(&format!(
            "\n\nВнимание! Пользователь родился {}. Исходя из этих данных, \
             учитываем его астрологические особенности при ответах.",
            hint
        ));
    }

    prompt
}

/// The user turn that asks for a forecast on one topic.
pub fn topic_request(topic: Topic, profile: &Profile) -> String {
    format!(
        "Астропрогноз по теме \"{}\" для {}",
        topic.canonical_name(),
        profile.describe()
    )
}

/// Strip phrases that break the persona.
pub fn sanitize_reply(reply: &str) -> String {
    let cleaned = AI_MENTION_RE.replace_all(reply, "");
    let cleaned = SOURCE_MENTION_RE.replace_all(&cleaned, "в практике");
    EXTRA_SPACES_RE.replace_all(&cleaned, " ").trim().to_string()
}
