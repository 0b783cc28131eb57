//! Fixed reply texts. These are authored copy and are never rewritten at runtime.

use crate::domain::line::LineKey;

/// Marker left in templates whose copy has not been provided yet.
pub const PLACEHOLDER_MARKER: &str = "MISSING_TEMPLATE";

pub const FAQ_LOCATION_SHIPPING: &str = "Estamos en Bogotá y hacemos envíos a nivel nacional.";
pub const FAQ_OPENING_HOURS: &str = "MISSING_TEMPLATE_FAQ_HORARIO_ATENCION";
pub const FAQ_PAYMENTS: &str = "MISSING_TEMPLATE_FAQ_PAGOS_TARJETA_ADDI";

pub const HUMAN_HOURS: &str = "De 8am a 1 pm y 2pm a 5pm de lunes a viernes";

pub const WELCOME_MESSAGE: &str = "¡Bienvenido a Aqua Integral SAS! 💧
Para brindarte la mejor atención, ¿en qué línea de negocio estás interesado?

Estamos listos para ayudarte. Al continuar con esta conversación aceptas nuestro Tratamiento de Datos Personales, puedes consultarlo en aquaintegral.co

1.- Agua Potable e Industrial 💧
2.- Agua Residual ♻️
3.- Bombeo ⚙️
4.- Análisis de agua / Medición y Control 🧪
5.- Piscinas 🏊‍♂️";

pub const POST_BROCHURE_CTA: &str =
    "\n\nDime qué producto necesitas (o envíame el SKU) y te muestro opciones con precio y stock.";

pub const WEEKEND_NOTE: &str =
    "\n\nHoy es fin de semana: un asesor humano te atiende en nuestro horario (De 8am a 1 pm y 2pm a 5pm de lunes a viernes). Mientras tanto, yo te ayudo con el catálogo.";

const BROCHURE_AGUA_POTABLE: &str = concat!(
    "¡Hola! 👋 ¡Nos da gusto tu interés en conocer sobre nuestra línea de Agua Potable! 💧\n\n",
    "Para esta línea ofrecemos soluciones desde la filtración básica y microfiltración para mejorar el sabor y apariencia del agua, hasta sistemas de purificación avanzada (como Ultrafiltración, Ósmosis Inversa, UV y Ozono). A su vez, contamos con equipos para dosificación de químicos y módulos de sedimentación. Además, nuestro portafolio Incluye el servicio de instalación para que tu equipo o sistema quede funcionando a la perfección.\n\n",
    "Puedes ver todos estos equipos dirigiéndote directamente al siguiente enlace de nuestra página web: https://aquaintegral.co/categoria-producto/agua-potable/ \n\n",
    "Si buscas conocer más información sobre un producto específico, no dudes es escribirnos nuevamente ¡Quedamos atentos para ayudarte! 😊",
);

const BROCHURE_AGUA_RESIDUAL: &str = concat!(
    "¡Hola! 👋 ¡Nos da gusto tu interés en conocer sobre nuestra línea de Agua Residual ♻️ \n\n",
    "Para esta línea ofrecemos soluciones desde equipos de aireación (como Blower y difusores), bombas para manejo de lodos, producto químico para tratamiento biológico y Torres de aireación que aseguran la calidad final del agua. Además, nuestro portafolio Incluye el servicio de instalación para que tu equipo o sistema quede funcionando a la perfección.\n\n",
    "Te invitamos a ver todas estas soluciones especializadas en nuestra web: https://aquaintegral.co/categoria-producto/tratamiento-de-agua-residual/ \n\n",
    "Si buscas conocer más información sobre un producto específico, no dudes es escribirnos nuevamente ¡Quedamos atentos para ayudarte! 😊",
);

const BROCHURE_BOMBEO: &str = concat!(
    "¡Hola! 👋 ¡Nos da mucho gusto tu interés en la línea de Bombeo! ⚙️\n\n",
    "Nuestro enfoque es garantizar que el agua llegue con la presión y el caudal exactos donde lo necesitas. Manejamos un portafolio completo que incluye: Bombas Centrífugas, Multietapas, Sumergibles y sistemas de presurización. Además, nuestro portafolio Incluye el servicio de instalación para que tu equipo o sistema quede funcionando a la perfección.\n\n",
    "Puedes encontrar la solución de bombeo perfecta para tu proyecto aquí:\n\n",
    "https://aquaintegral.co/categoria-producto/bombeo/ \n\n",
    "Si buscas conocer más información sobre un producto específico, no dudes es escribirnos nuevamente ¡Quedamos atentos para ayudarte! 😊",
);

const BROCHURE_ANALISIS: &str = concat!(
    "¡Hola! 👋 Nos encanta tu interés en la línea de Análisis de Agua / Medición y Control. 🧪\n\n",
    "Nuestro trabajo aquí es darte la precisión que necesitas para garantizar la calidad del agua. Ofrecemos equipos especializados como fotómetros, turbidímetros y kits de medición visuales para que puedas evaluar parámetros cruciales en agua potable y piscinas como pH, cloro, y equipos especializados para medición de parámetros en agua residual como DBO/DQO.\n\n",
    "Puedes ver todos nuestros equipos y reactivos de laboratorio directamente en este enlace: https://aquaintegral.co/categoria-producto/analisis-de-agua/ \n\n",
    "Si buscas conocer más información sobre un producto específico, no dudes es escribirnos nuevamente ¡Quedamos atentos para ayudarte! 😊",
);

const BROCHURE_PISCINAS: &str = concat!(
    "¡Hola! 👋 ¡Nos da gusto tu interés en la línea de Piscinas! 🏊\n\n",
    "Nuestro trabajo en esta línea, se centra en el confort, seguridad y cristalinidad de tu agua. Ofrecemos soluciones completas: filtración, bombeo, climatización, desinfección (salinos/UV) y todos los químicos que necesita para mantener la calidad del agua en su piscina. Además, nuestro portafolio Incluye el servicio de instalación para que tu equipo o sistema quede funcionando a la perfección.\n\n",
    "Puedes ver todo el portafolio de piscinas aquí: https://aquaintegral.co/categoria-producto/piscinas/\n\n",
    "Si buscas conocer más información sobre un producto específico, no dudes es escribirnos nuevamente ¡Quedamos atentos para ayudarte! 😊",
);

pub fn brochure(line: LineKey) -> &'static str {
    match line {
        LineKey::AguaPotable => BROCHURE_AGUA_POTABLE,
        LineKey::AguaResidual => BROCHURE_AGUA_RESIDUAL,
        LineKey::Bombeo => BROCHURE_BOMBEO,
        LineKey::Analisis => BROCHURE_ANALISIS,
        LineKey::Piscinas => BROCHURE_PISCINAS,
    }
}

pub fn is_placeholder(text: &str) -> bool {
    text.contains(PLACEHOLDER_MARKER)
}

#[cfg(test)]
mod tests {
    use super::{brochure, is_placeholder, FAQ_LOCATION_SHIPPING, FAQ_OPENING_HOURS};
    use crate::domain::line::LineKey;
    use crate::profile::catalog_url;

    #[test]
    fn every_brochure_links_its_catalog() {
        for line in LineKey::ALL {
            assert!(brochure(line).contains(catalog_url(line)), "{line} brochure link");
        }
    }

    #[test]
    fn unauthored_templates_are_detected() {
        assert!(is_placeholder(FAQ_OPENING_HOURS));
        assert!(!is_placeholder(FAQ_LOCATION_SHIPPING));
    }
}
