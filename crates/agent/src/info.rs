//! Replies for the informational intents reported by the intent classifier.

use aquabot_core::domain::assist::InfoIntent;
use aquabot_core::domain::line::LineKey;
use aquabot_core::profile::{
    catalog_url_for, line_offers, lines_list, COMPANY_NAME, SERVICES, WEBSITE_URL,
};

fn bullet_list(items: &[&str]) -> String {
    items.iter().map(|item| format!("- {item}")).collect::<Vec<_>>().join("\n")
}

/// `None` for intents that are not answered from the company profile.
pub fn build_info_response(
    intent: InfoIntent,
    text: &str,
    line_hint: Option<LineKey>,
) -> Option<String> {
    let line = line_hint.or_else(|| LineKey::detect(text));

    match intent {
        InfoIntent::CompanyInfo => Some(format!(
            "Con gusto. Somos {COMPANY_NAME}. Brindamos soluciones en agua potable, residual, \
             bombeo, analisis y piscinas.\n\nLineas:\n{}\n\nServicios:\n{}\n\nCatalogo: \
             {WEBSITE_URL}\nDime que necesitas y te ayudo.",
            lines_list(),
            bullet_list(SERVICES),
        )),
        InfoIntent::Services => Some(format!(
            "Servicios que ofrecemos:\n{}\n\nQuieres asesorarte en alguna linea en particular?\n\
             Lineas:\n{}",
            bullet_list(SERVICES),
            lines_list(),
        )),
        InfoIntent::LineInfo => Some(match line {
            None => format!("Trabajamos en estas lineas:\n{}\n\nCual te interesa?", lines_list()),
            Some(line) => format!(
                "Con gusto. Linea: {}\nOfrecemos:\n{}\n\nCatalogo: {}\nDime que producto \
                 necesitas o envia el SKU.",
                line.label(),
                bullet_list(line_offers(line)),
                catalog_url_for(Some(line)),
            ),
        }),
        InfoIntent::Catalog => {
            Some(format!("Aqui tienes el enlace del catalogo: {}", catalog_url_for(line)))
        }
        InfoIntent::Faq | InfoIntent::ProductSearch | InfoIntent::Other => None,
    }
}
