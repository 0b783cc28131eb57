//! Canned answers for the common informational questions: catalog link, hours, location and
//! shipping, payment methods.

use aquabot_core::domain::line::LineKey;
use aquabot_core::playbook::{
    is_placeholder, FAQ_LOCATION_SHIPPING, FAQ_OPENING_HOURS, FAQ_PAYMENTS, HUMAN_HOURS,
};
use aquabot_core::profile::catalog_url_for;
use aquabot_core::text::normalize;

const LINK_WORDS: &[&str] =
    &["link", "enlace", "pagina", "web", "sitio", "tienda", "catalogo", "portafolio"];
const HOURS_WORDS: &[&str] = &["horario", "hora", "horas", "atencion", "atienden", "abren", "cierran"];
const LOCATION_WORDS: &[&str] = &["ubicacion", "direccion", "donde", "ubicados", "envios", "envio"];
const PAYMENT_WORDS: &[&str] = &["pago", "pagos", "tarjeta", "credito", "debito", "addi"];

const DEFAULT_HOURS: &str = "Nuestro horario es de lunes a viernes en horario laboral.";
const DEFAULT_LOCATION: &str = "Estamos en Bogota y hacemos envios a nivel nacional.";
const DEFAULT_PAYMENTS: &str =
    "Aceptamos tarjeta y Addi. Si necesitas una opcion especifica, dime cual.";

fn has_any(normalized: &str, words: &[&str]) -> bool {
    words.iter().any(|word| normalized.contains(word))
}

/// Authored template, or `fallback` while the template is still a placeholder.
fn authored_or(template: &'static str, fallback: &'static str) -> &'static str {
    if is_placeholder(template) || template.trim().is_empty() {
        fallback
    } else {
        template
    }
}

/// Line named by the stored hint, else by the message itself.
fn catalog_line(line_hint: Option<LineKey>, normalized: &str) -> Option<LineKey> {
    line_hint.or_else(|| LineKey::ALL.into_iter().find(|line| normalized.contains(line.as_str())))
}

pub fn route_info_request(text: &str, line_hint: Option<LineKey>) -> Option<String> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }

    if has_any(&normalized, LINK_WORDS) {
        let url = catalog_url_for(catalog_line(line_hint, &normalized));
        return Some(format!("Aquí tienes el enlace del catálogo: {url}"));
    }

    if has_any(&normalized, HOURS_WORDS) {
        let hours = authored_or(FAQ_OPENING_HOURS, authored_or(HUMAN_HOURS, DEFAULT_HOURS));
        return Some(hours.to_string());
    }

    if has_any(&normalized, LOCATION_WORDS) {
        return Some(authored_or(FAQ_LOCATION_SHIPPING, DEFAULT_LOCATION).to_string());
    }

    if has_any(&normalized, PAYMENT_WORDS) {
        return Some(authored_or(FAQ_PAYMENTS, DEFAULT_PAYMENTS).to_string());
    }

    None
}
