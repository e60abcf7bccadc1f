use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());
static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s'-]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Splits raw text into cleaned sentences.
///
/// - A run of `.`, `!` or `?` counts as one boundary
/// - Characters other than word characters, apostrophes, hyphens and
///   whitespace are removed
/// - Whitespace is collapsed to single spaces and trimmed
/// - Empty fragments are dropped
///
/// The output never contains terminal punctuation, so feeding a returned
/// sentence back in yields the same sentence.
pub fn preprocess_text(text: &str) -> Vec<String> {
	SENTENCE_BOUNDARY
		.split(text)
		.map(|fragment| {
			let cleaned = DISALLOWED.replace_all(fragment, "");
			WHITESPACE.replace_all(cleaned.trim(), " ").into_owned()
		})
		.filter(|sentence| !sentence.is_empty())
		.collect()
}

/// Whitespace tokenizer used for both training and context keys.
pub fn tokenize(sentence: &str) -> Vec<&str> {
	sentence.split_whitespace().collect()
}

/// Returns true if `word` ends with terminal punctuation.
pub(crate) fn is_terminal(word: &str) -> bool {
	word.ends_with(['.', '!', '?'])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_on_punctuation_runs() {
		let sentences = preprocess_text("Hello there!!! How are you?? Fine... thanks.");
		assert_eq!(sentences, vec!["Hello there", "How are you", "Fine", "thanks"]);
	}

	#[test]
	fn strips_symbols_and_collapses_whitespace() {
		let sentences = preprocess_text("  it's   a  well-known  #fact @here, (really)  ");
		assert_eq!(sentences, vec!["it's a well-known fact here really"]);
	}

	#[test]
	fn text_without_terminal_is_one_sentence() {
		assert_eq!(preprocess_text("no punctuation here"), vec!["no punctuation here"]);
	}

	#[test]
	fn empty_and_blank_inputs() {
		assert!(preprocess_text("").is_empty());
		assert!(preprocess_text("   \n\t ").is_empty());
		assert!(preprocess_text("?!... ...").is_empty());
	}

	#[test]
	fn idempotent_on_own_output() {
		let first = preprocess_text("The cat sat!! On the mat... Did it?");
		let again: Vec<String> = first.iter().flat_map(|s| preprocess_text(s)).collect();
		assert_eq!(first, again);
	}

	#[test]
	fn keeps_case() {
		assert_eq!(preprocess_text("The Cat."), vec!["The Cat"]);
	}

	#[test]
	fn terminal_words() {
		assert!(is_terminal("end."));
		assert!(is_terminal("what?"));
		assert!(!is_terminal("word"));
	}
}
