//! Keyword extraction from free-text questions.
//!
//! Lowercase, split on anything that is not alphanumeric, then drop stop
//! words and tokens of two characters or fewer. Order of first appearance
//! is kept and duplicates are removed. The pipeline's substring fallback
//! uses the configured language; stores score with every list at once
//! since they never see the language.

const SPANISH: &[&str] = &[
    "que", "los", "las", "del", "por", "para", "con", "una", "uno", "unos", "unas", "como",
    "pero", "sus", "este", "esta", "estos", "estas", "ese", "esa", "eso", "esos", "esas", "hay",
    "han", "has", "fue", "ser", "son", "era", "mas", "más", "muy", "sin", "sobre", "entre",
    "cual", "cuál", "cuales", "cuáles", "donde", "dónde", "cuando", "cuándo", "quien", "quién",
    "qué", "cómo", "tiene", "tienes", "tengo", "puedes", "puede", "hace", "hizo", "también",
    "desde", "hasta", "mis", "tus", "nos", "les", "todo", "todos", "algo", "alguna", "alguno",
    "dime", "sabes", "quiero", "saber", "cuéntame", "cuentame",
];

const ENGLISH: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "your", "all", "any", "can", "had", "her",
    "was", "one", "our", "out", "has", "have", "his", "how", "its", "who", "what", "when",
    "where", "which", "why", "with", "this", "that", "these", "those", "from", "they", "them",
    "there", "their", "about", "into", "does", "did", "been", "will", "would", "could",
    "should", "some", "tell", "know", "more", "than", "then", "also",
];

/// Stop-word list for a language code; unknown codes fall back to English.
pub fn stop_words(language: &str) -> &'static [&'static str] {
    match language.to_ascii_lowercase().as_str() {
        "es" | "spa" | "spanish" | "español" => SPANISH,
        _ => ENGLISH,
    }
}

/// Extract fallback keywords from a free-text query.
pub fn extract(query: &str, language: &str) -> Vec<String> {
    let stop = stop_words(language);
    significant(query, |token| stop.contains(&token))
}

/// Keywords with every known stop-word list removed.
pub fn extract_any(query: &str) -> Vec<String> {
    significant(query, |token| SPANISH.contains(&token) || ENGLISH.contains(&token))
}

fn significant(query: &str, is_stop: impl Fn(&str) -> bool) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();

    for token in query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
    {
        if is_stop(token) || keywords.iter().any(|k| k == token) {
            continue;
        }
        keywords.push(token.to_string());
    }

    keywords
}
