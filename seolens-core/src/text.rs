//! Text utilities shared by keyword extraction and scoring

use std::collections::HashSet;
use std::sync::LazyLock;

/// English and Spanish stopwords plus common web boilerplate
const STOPWORDS: &[&str] = &[
    // English
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves", "also", "may", "might", "must", "shall", "us",
    // Spanish
    "de", "la", "que", "el", "en", "y", "los", "del", "se", "las", "por", "un", "para", "con",
    "una", "su", "al", "lo", "como", "más", "mas", "pero", "sus", "le", "ya", "o", "este", "sí",
    "porque", "esta", "entre", "cuando", "muy", "sin", "sobre", "también", "me", "hasta", "hay",
    "donde", "quien", "desde", "todo", "nos", "durante", "todos", "uno", "les", "ni", "contra",
    "otros", "ese", "eso", "ante", "ellos", "e", "esto", "mí", "antes", "algunos", "qué", "unos",
    "yo", "otro", "otras", "otra", "él", "tanto", "esa", "estos", "mucho", "quienes", "nada",
    "muchos", "cual", "poco", "ella", "estar", "estas", "algunas", "algo", "nosotros", "mi",
    "mis", "tú", "te", "ti", "tu", "tus", "ellas", "es", "son", "fue", "ser", "ha", "han",
    "era", "está", "están", "cada", "puede", "pueden", "hace", "tiene", "tienen",
    // Web boilerplate
    "click", "aquí", "leer", "read", "menu", "inicio", "home", "cookies", "cookie", "http",
    "https", "www", "com",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

/// Check whether a lowercase token is a stopword
pub fn is_stopword(token: &str) -> bool {
    STOPWORD_SET.contains(token)
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize text before keyword extraction
///
/// Drops control characters and collapses whitespace; case and punctuation
/// are kept since sentence boundaries and capitalization carry signal.
pub fn normalize_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    normalize_whitespace(&cleaned)
}

/// Case-normalized form of a keyword term
pub fn normalize_term(term: &str) -> String {
    normalize_whitespace(&term.to_lowercase())
}

/// Split text into lowercase word tokens longer than one character
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

/// Split text into sentences on terminal punctuation and line breaks
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?', ';', '\n', '¡', '¿'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Count occurrences of a token sequence in a token stream
pub fn count_sequence(tokens: &[String], needle: &[String]) -> usize {
    if needle.is_empty() || needle.len() > tokens.len() {
        return 0;
    }
    tokens
        .windows(needle.len())
        .filter(|window| window == &needle)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_short_tokens() {
        let tokens = tokenize("A laptop, y la Guía-2024!");
        assert_eq!(tokens, vec!["laptop", "la", "guía", "2024"]);
    }

    #[test]
    fn test_normalize_whitespace() {
        let input = "  hello   world  \n\t  test  ";
        assert_eq!(normalize_whitespace(input), "hello world test");
    }

    #[test]
    fn test_normalize_term() {
        assert_eq!(normalize_term("  Best   Laptop "), "best laptop");
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("First one. Second one!\nThird?");
        assert_eq!(sentences, vec!["First one", "Second one", "Third"]);
    }

    #[test]
    fn test_count_sequence() {
        let tokens = tokenize("gaming laptop and another gaming laptop deal");
        let needle = tokenize("gaming laptop");
        assert_eq!(count_sequence(&tokens, &needle), 2);
        assert_eq!(count_sequence(&tokens, &[]), 0);
    }

    #[test]
    fn test_stopwords() {
        assert!(is_stopword("the"));
        assert!(is_stopword("para"));
        assert!(!is_stopword("laptop"));
    }
}
