//! Keyword-driven menu handling: welcome menu, line brochures, soft line hints and the
//! short clarifying questions for requests that are known to be ambiguous.
//!
//! Every rule here matches on whole normalized messages. A line name inside a longer sentence
//! ("equipo de filtracion para piscina") never selects a brochure; it only feeds
//! [`infer_line_hint`].

use once_cell::sync::Lazy;
use regex::Regex;

use aquabot_core::domain::line::LineKey;
use aquabot_core::playbook::{brochure, POST_BROCHURE_CTA, WEEKEND_NOTE, WELCOME_MESSAGE};
use aquabot_core::text::normalize;

const GREETINGS: &[&str] = &[
    "hola",
    "buenas",
    "buen dia",
    "buenos dias",
    "buenas tardes",
    "buenas noches",
    "saludos",
    "que tal",
    "hey",
    "hi",
    "hello",
];

const MENU_WORDS: &[&str] = &["menu", "inicio", "empezar", "start"];

const EXACT_LINE_WORDS: &[(&str, LineKey)] = &[
    ("agua potable", LineKey::AguaPotable),
    ("agua potable e industrial", LineKey::AguaPotable),
    ("potable", LineKey::AguaPotable),
    ("industrial", LineKey::AguaPotable),
    ("agua residual", LineKey::AguaResidual),
    ("residual", LineKey::AguaResidual),
    ("aguas residuales", LineKey::AguaResidual),
    ("bombeo", LineKey::Bombeo),
    ("analisis", LineKey::Analisis),
    ("medicion", LineKey::Analisis),
    ("control", LineKey::Analisis),
    ("piscinas", LineKey::Piscinas),
    ("piscina", LineKey::Piscinas),
];

static MENU_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:opcion|op)\s*)?([1-5])$").expect("menu number pattern is valid")
});

static MENU_NUMBER_WITH_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([1-5])\s+(?:agua potable|agua residual|bombeo|analisis|piscinas?)$")
        .expect("menu number with line pattern is valid")
});

/// A fixed reply chosen by the menu rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybookMatch {
    pub reply: String,
    /// Line the caller picked, when the reply is a brochure.
    pub line: Option<LineKey>,
}

impl PlaybookMatch {
    fn welcome() -> Self {
        Self { reply: WELCOME_MESSAGE.to_string(), line: None }
    }

    fn brochure(line: LineKey, is_weekend: bool) -> Self {
        let mut reply = format!("{}{}", brochure(line), POST_BROCHURE_CTA);
        if is_weekend {
            reply.push_str(WEEKEND_NOTE);
        }
        Self { reply, line: Some(line) }
    }
}

pub fn is_greeting(normalized: &str) -> bool {
    GREETINGS.contains(&normalized)
}

/// Menu routing for one message. `None` means the message is not a menu interaction.
pub fn route_playbook(text: &str, is_weekend: bool) -> Option<PlaybookMatch> {
    let normalized = normalize(text);
    if normalized.is_empty() || is_greeting(&normalized) || MENU_WORDS.contains(&normalized.as_str())
    {
        return Some(PlaybookMatch::welcome());
    }

    let line = menu_choice(&normalized).or_else(|| exact_line_word(&normalized))?;
    Some(PlaybookMatch::brochure(line, is_weekend))
}

fn menu_choice(normalized: &str) -> Option<LineKey> {
    let captures =
        MENU_NUMBER.captures(normalized).or_else(|| MENU_NUMBER_WITH_LINE.captures(normalized))?;
    let number = captures.get(1)?.as_str().parse::<u8>().ok()?;
    LineKey::from_menu_number(number)
}

fn exact_line_word(normalized: &str) -> Option<LineKey> {
    EXACT_LINE_WORDS.iter().find(|(word, _)| *word == normalized).map(|(_, line)| *line)
}

/// Soft line guess from keywords anywhere in the message. Never produces a reply.
pub fn infer_line_hint(text: &str) -> Option<LineKey> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }

    if normalized.contains("piscin") {
        Some(LineKey::Piscinas)
    } else if normalized.contains("bomba") || normalized.contains("bombeo") {
        Some(LineKey::Bombeo)
    } else if normalized.contains("residual") {
        Some(LineKey::AguaResidual)
    } else if normalized.contains("potable") || normalized.contains("industrial") {
        Some(LineKey::AguaPotable)
    } else if ["analisis", "medicion", "laboratorio"].iter().any(|word| normalized.contains(word))
    {
        Some(LineKey::Analisis)
    } else {
        None
    }
}

/// Short disambiguating question for fragments that are too generic to search.
pub fn clarify_question(text: &str, line_hint: Option<LineKey>) -> Option<&'static str> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }

    if line_hint.is_none() && (normalized.contains("bomba") || normalized.contains("bombeo")) {
        return Some(
            "Para ayudarte con la bomba, ¿es para piscina, agua potable o residual? \
             Si tienes caudal/altura o HP, indícalo.",
        );
    }

    if line_hint.is_none()
        && (normalized.contains("filtro") || normalized.contains("filtracion"))
        && !["arena", "cartucho", "carb", "piscin"].iter().any(|word| normalized.contains(word))
    {
        return Some("¿Buscas filtro de arena o cartucho? ¿Para piscina o agua potable?");
    }

    if normalized.contains("dosificacion") || normalized.contains("dosificador") {
        return Some("¿Qué químico deseas dosificar y a qué caudal?");
    }

    if normalized.contains("accesor") || normalized.contains("repuesto") {
        if normalized.contains("piscin") {
            return Some(
                "Para piscina, que tipo de accesorio buscas \
                 (iluminacion, limpieza, seguridad o repuestos)?",
            );
        }
        return Some("Que tipo de accesorio buscas?");
    }

    None
}
