//! Search command implementation.

use vapor_core::{KvIterator, KvReader, Store};

/// Prints the key of every stored document whose text contains `query`,
/// ignoring case.
pub fn run(
    store: &Store,
    query: &str,
    provider: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let prefix = provider.map(|p| format!("{p}/")).unwrap_or_default();
    let reader = store.reader()?;
    let mut iter = reader.prefix_iterator(prefix.as_bytes());

    let mut hits = 0usize;
    while let Some((key, value)) = iter.current() {
        if matches(value, query) {
            println!("{}", String::from_utf8_lossy(key));
            hits += 1;
        }
        iter.next();
    }

    println!("{hits} matches");
    Ok(())
}

/// Case-insensitive substring match over a stored document.
pub fn matches(document: &[u8], query: &str) -> bool {
    String::from_utf8_lossy(document)
        .to_lowercase()
        .contains(&query.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_ignores_case() {
        assert!(matches(br#"{"title":"Hello World"}"#, "hello"));
        assert!(matches(b"abc", ""));
        assert!(!matches(b"abc", "abd"));
    }
}
