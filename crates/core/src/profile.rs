//! Static facts about the company used by informational replies.

use crate::domain::line::LineKey;

pub const COMPANY_NAME: &str = "Aqua Integral SAS";
pub const WEBSITE_URL: &str = "https://aquaintegral.co/";
pub const GENERAL_CATALOG_URL: &str = "https://aquaintegral.co/tienda/";

pub const SERVICES: &[&str] =
    &["Asesoria tecnica", "Suministro de equipos", "Instalacion (segun producto)"];

pub fn line_offers(line: LineKey) -> &'static [&'static str] {
    match line {
        LineKey::AguaPotable => &[
            "Filtracion y microfiltracion",
            "Osmosis inversa",
            "UV y ozono",
            "Dosificacion",
            "Plantas de tratamiento",
        ],
        LineKey::AguaResidual => &[
            "Equipos para tratamiento",
            "Plantas de tratamiento",
            "Quimicos para procesos",
            "Equipos de aireacion",
        ],
        LineKey::Bombeo => &[
            "Bombas centrifugas y multietapas",
            "Bombas sumergibles",
            "Bombas perifericas",
            "Presurizacion",
            "Accesorios de instalacion",
        ],
        LineKey::Analisis => {
            &["Equipos de medicion", "Fotometros y comparadores", "Reactivos y laboratorio"]
        }
        LineKey::Piscinas => {
            &["Filtros y bombas", "Calefaccion", "Desinfeccion", "Quimicos y accesorios"]
        }
    }
}

pub fn catalog_url(line: LineKey) -> &'static str {
    match line {
        LineKey::AguaPotable => "https://aquaintegral.co/categoria-producto/agua-potable/",
        LineKey::AguaResidual => {
            "https://aquaintegral.co/categoria-producto/tratamiento-de-agua-residual/"
        }
        LineKey::Bombeo => "https://aquaintegral.co/categoria-producto/bombeo/",
        LineKey::Analisis => "https://aquaintegral.co/categoria-producto/analisis-de-agua/",
        LineKey::Piscinas => "https://aquaintegral.co/categoria-producto/piscinas/",
    }
}

pub fn catalog_url_for(line: Option<LineKey>) -> &'static str {
    line.map(catalog_url).unwrap_or(GENERAL_CATALOG_URL)
}

/// Numbered list of the business lines, one per row.
pub fn lines_list() -> String {
    LineKey::ALL
        .iter()
        .map(|line| format!("{}) {}", line.menu_number(), line.label()))
        .collect::<Vec<_>>()
        .join("\n")
}
