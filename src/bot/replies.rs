//! Texts the bot sends on its own, without asking the model.
//!
//! Some of them carry the markers `Phase::infer_from_bot_message` looks for.

use crate::engine::profile::{Field, Profile};
use crate::engine::topic;

pub const ONBOARDING: &str = "Здравствуйте! Я София, астролог.\n\
Укажите дату (ДД.ММ.ГГГГ), точное время (ЧЧ:ММ) и город рождения, например:\n\
18.12.1990 14:30 Москва";

pub const SAVE_FAILED: &str = "Не удалось сохранить данные. Попробуйте отправить их ещё раз.";

pub const UNAVAILABLE: &str = "София временно недоступна. Попробуйте задать вопрос позже 🌸";

pub const PROCESSING_FAILED: &str = "⚠️ Ошибка обработки запроса";

pub fn topic_menu() -> String {
    format!("Выберите тему:\n{}", topic::menu())
}

pub fn profile_saved(profile: &Profile) -> String {
    format!(
        "Данные сохранены! {}. Выберите тему (1-5):\n{}",
        profile.describe(),
        topic::menu()
    )
}

pub fn ask_missing(fields: &[Field]) -> String {
    let wanted = fields
        .iter()
        .map(Field::prompt_label)
        .collect::<Vec<_>>()
        .join(", ");
    let example = if fields.contains(&Field::Birthdate) {
        "18.12.1990 14:30 Москва"
    } else if fields.contains(&Field::Birthtime) && fields.contains(&Field::City) {
        "14:30, город: Москва"
    } else if fields.contains(&Field::City) {
        "город: Москва"
    } else {
        "14:30"
    };
    format!("Не хватает данных: укажите {wanted}. Например: {example}")
}
