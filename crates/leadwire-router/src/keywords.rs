// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword-pattern intent classification.
//!
//! Used whenever the language service is unavailable or its answer fails
//! validation. Zero cost, no network. Patterns are matched against the
//! lower-cased, accent-folded message as whole words or whole phrases, in a
//! fixed precedence; the first category that matches wins.

use leadwire_core::types::{Intent, IntentResult, Level};

/// Words a pure greeting is made of. A message is a greeting only when every
/// word is one of these, so "hola, quiero 2 cajas" is not a greeting.
const GREETING_WORDS: &[&str] = &[
    "hola", "holis", "buenas", "buen", "buena", "buenos", "dia", "dias", "tarde", "tardes",
    "noche", "noches", "que", "tal", "como", "estas", "estan", "hey", "saludos",
];

const PRICE: &[&str] = &[
    "precio", "cuanto", "cuesta", "cuestan", "vale", "valen", "costo", "sale", "salen",
    "tienes", "tenes", "tienen", "a cuanto",
];

const STOCK: &[&str] = &[
    "stock", "disponible", "disponibles", "disponibilidad", "queda", "quedan", "hay",
    "les queda", "te queda",
];

const ORDER: &[&str] = &[
    "quiero", "quisiera", "necesito", "pedido", "pedir", "encargar", "encargo", "comprar",
    "mandame", "enviame", "traeme", "llevo", "me llevo", "anotame", "me das",
];

const GENERAL: &[&str] = &[
    "consulta", "pregunta", "informacion", "info", "horario", "horarios", "direccion",
    "donde", "ubicacion", "envio", "envios", "pago", "pagos", "transferencia", "tarjeta",
    "factura",
];

const PRICE_LIST: &[&str] = &["lista", "listado", "catalogo", "precios", "pdf"];

const COMPLAINT: &[&str] = &[
    "reclamo", "queja", "problema", "roto", "rota", "rotos", "vencido", "vencida", "malo",
    "mala", "devolucion", "devolver", "no llego", "nunca llego", "todavia no", "estafa",
];

const FAREWELL: &[&str] = &[
    "chau", "chao", "adios", "gracias", "hasta luego", "hasta manana", "nos vemos",
];

const CONFIRMATION: &[&str] = &[
    "si", "dale", "ok", "okey", "perfecto", "listo", "confirmo", "confirmado", "genial",
    "de acuerdo", "correcto", "exacto",
];

/// Spelled-out quantities that make an order complete.
const NUMBER_WORDS: &[&str] = &[
    "un", "una", "uno", "dos", "tres", "cuatro", "cinco", "seis", "siete", "ocho", "nueve",
    "diez", "docena", "media", "medio", "par",
];

/// Lower-cased, accent-folded text with words separated by single spaces and
/// padded on both sides, so phrases match with `contains(" a b ")`.
struct Normalized {
    padded: String,
}

impl Normalized {
    fn new(text: &str) -> Self {
        let mut padded = String::with_capacity(text.len() + 2);
        padded.push(' ');
        let mut last_space = true;
        for c in text.chars().flat_map(char::to_lowercase) {
            let c = fold_accent(c);
            if c.is_alphanumeric() {
                padded.push(c);
                last_space = false;
            } else if !last_space {
                padded.push(' ');
                last_space = true;
            }
        }
        if !last_space {
            padded.push(' ');
        }
        Self { padded }
    }

    fn words(&self) -> impl Iterator<Item = &str> {
        self.padded.split_whitespace()
    }

    fn is_empty(&self) -> bool {
        self.padded.trim().is_empty()
    }

    fn has(&self, pattern: &str) -> bool {
        let needle = format!(" {pattern} ");
        self.padded.contains(&needle)
    }

    fn any(&self, patterns: &[&str]) -> bool {
        patterns.iter().any(|p| self.has(p))
    }

    fn has_quantity(&self) -> bool {
        self.words()
            .any(|w| w.chars().any(|c| c.is_ascii_digit()) || NUMBER_WORDS.contains(&w))
    }
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' => 'a',
        'é' | 'è' | 'ë' => 'e',
        'í' | 'ì' | 'ï' => 'i',
        'ó' | 'ò' | 'ö' => 'o',
        'ú' | 'ù' | 'ü' => 'u',
        other => other,
    }
}

/// Classify `text` by keyword patterns alone.
///
/// Produces only labels from the fixed taxonomy. Order intents without any
/// quantity come back as [`Intent::IncompleteOrder`].
pub fn classify_keywords(text: &str) -> IntentResult {
    let norm = Normalized::new(text);
    if norm.is_empty() {
        return result(Intent::Other, 0.3);
    }

    let intent = if norm.words().all(|w| GREETING_WORDS.contains(&w)) {
        Intent::Greeting
    } else if norm.any(PRICE) {
        Intent::PriceInquiry
    } else if norm.any(STOCK) {
        Intent::StockInquiry
    } else if norm.any(ORDER) {
        if norm.has_quantity() {
            Intent::Order
        } else {
            Intent::IncompleteOrder
        }
    } else if norm.any(GENERAL) {
        Intent::GeneralInquiry
    } else if norm.any(PRICE_LIST) {
        Intent::PriceListRequest
    } else if norm.any(COMPLAINT) {
        Intent::Complaint
    } else if norm.any(FAREWELL) {
        Intent::Farewell
    } else if norm.any(CONFIRMATION) {
        Intent::Confirmation
    } else {
        Intent::Other
    };

    let confidence = if intent == Intent::Other { 0.3 } else { 0.6 };
    result(intent, confidence)
}

/// Default priority and follow-up flag for an intent.
pub fn defaults_for(intent: Intent) -> (Level, bool) {
    match intent {
        Intent::Order | Intent::Complaint => (Level::High, true),
        Intent::IncompleteOrder
        | Intent::PriceInquiry
        | Intent::StockInquiry
        | Intent::PriceListRequest => (Level::Medium, true),
        Intent::AfterHours => (Level::Medium, true),
        Intent::GeneralInquiry => (Level::Low, true),
        Intent::Greeting | Intent::Confirmation | Intent::Farewell | Intent::Other => {
            (Level::Low, false)
        }
    }
}

fn result(intent: Intent, confidence: f32) -> IntentResult {
    let (priority, follow_up_required) = defaults_for(intent);
    IntentResult {
        intent,
        confidence,
        mentioned_entities: Vec::new(),
        priority,
        follow_up_required,
    }
}
