use crate::domain::line::LineKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConsultQuestion {
    pub key: &'static str,
    pub question: &'static str,
}

const fn q(key: &'static str, question: &'static str) -> ConsultQuestion {
    ConsultQuestion { key, question }
}

const GENERAL: &[ConsultQuestion] =
    &[q("need", "Para ayudarte mejor, ¿qué producto necesitas y para qué uso?")];

const BOMBEO: &[ConsultQuestion] = &[
    q("application", "¿La bomba es para piscina, pozo, agua potable o residual?"),
    q("flow_rate", "¿Qué caudal necesitas (m3/h o L/min)?"),
    q("head", "¿Qué altura o presión necesitas (mca)?"),
    q("power_voltage", "¿Qué voltaje y fase tienes disponible (110/220V, mono/trifásica)?"),
];

const PISCINAS: &[ConsultQuestion] = &[
    q("product_type", "¿Buscas bomba, filtro, calentador, accesorio o químico para piscina?"),
    q("pool_volume", "¿Cuál es el volumen de la piscina (m3) o sus medidas?"),
    q("use_type", "¿Es piscina residencial o comercial?"),
];

const AGUA_POTABLE: &[ConsultQuestion] = &[
    q("use_type", "¿Es para hogar o industria?"),
    q("source", "¿El agua viene de acueducto o pozo?"),
    q("problem", "¿Qué problema quieres resolver (olor, sabor, turbidez, dureza)?"),
];

const AGUA_RESIDUAL: &[ConsultQuestion] = &[
    q("process", "¿Qué tipo de tratamiento necesitas (biológico o físico-químico)?"),
    q("flow_rate", "¿Qué caudal tratas (m3/h)?"),
    q("contaminants", "¿Cuáles son los contaminantes principales?"),
];

const ANALISIS: &[ConsultQuestion] = &[
    q("parameter", "¿Qué parámetro necesitas medir (pH, cloro, turbidez, DBO/DQO)?"),
    q("use_type", "¿Es para laboratorio, piscina o planta?"),
    q("range", "¿Tienes un rango de medición requerido?"),
];

/// Questions the consultant may pick from for the caller's current line.
pub fn questions_for(line: Option<LineKey>) -> &'static [ConsultQuestion] {
    match line {
        None => GENERAL,
        Some(LineKey::Bombeo) => BOMBEO,
        Some(LineKey::Piscinas) => PISCINAS,
        Some(LineKey::AguaPotable) => AGUA_POTABLE,
        Some(LineKey::AguaResidual) => AGUA_RESIDUAL,
        Some(LineKey::Analisis) => ANALISIS,
    }
}

/// Questions not yet asked in this conversation, in bank order.
pub fn remaining_questions(line: Option<LineKey>, asked: &[String]) -> Vec<ConsultQuestion> {
    questions_for(line)
        .iter()
        .filter(|question| !asked.iter().any(|key| key == question.key))
        .copied()
        .collect()
}
