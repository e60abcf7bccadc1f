use std::collections::HashMap;

use rand::Rng;

/// Observed next words for one context key.
///
/// Conceptually this is the duplicate list of the persisted format
/// (`["sat", "ran", "sat"]`), stored as distinct words in first-seen order
/// with their occurrence counts (`sat => 2, ran => 1`).
///
/// ## Invariants
/// - Words are unique
/// - Each count is strictly positive
/// - `index[word]` is the position of `word` in `entries`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transitions {
	entries: Vec<(String, usize)>,
	index: HashMap<String, usize>,
}

impl Transitions {
	/// Creates an empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Rebuilds the table from a duplicate list.
	pub fn from_words<I, S>(words: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut transitions = Self::new();
		for word in words {
			transitions.add(word.as_ref(), 1);
		}
		transitions
	}

	/// Records `count` more occurrences of `word`.
	pub fn add(&mut self, word: &str, count: usize) {
		if count == 0 {
			return;
		}
		match self.index.get(word) {
			Some(&position) => self.entries[position].1 += count,
			None => {
				self.index.insert(word.to_owned(), self.entries.len());
				self.entries.push((word.to_owned(), count));
			}
		}
	}

	/// Number of occurrences of `word` (0 if never seen).
	pub fn count(&self, word: &str) -> usize {
		self.index.get(word).map_or(0, |&position| self.entries[position].1)
	}

	/// Total number of recorded transitions.
	pub fn total(&self) -> usize {
		self.entries.iter().map(|(_, c)| c).sum()
	}

	/// Number of distinct candidate words.
	pub fn distinct(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if no transition was ever recorded.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Iterates `(word, count)` in first-seen order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
		self.entries.iter().map(|(w, c)| (w.as_str(), *c))
	}

	/// Expands back into the duplicate list used by the persisted format.
	pub fn to_words(&self) -> Vec<String> {
		self.entries
			.iter()
			.flat_map(|(w, c)| std::iter::repeat_n(w.clone(), *c))
			.collect()
	}

	/// Sums the counts of `other` into this table.
	pub fn merge(&mut self, other: &Self) {
		for (word, count) in other.iter() {
			self.add(word, count);
		}
	}

	/// Picks one candidate with probability proportional to `weight(word, count)`.
	///
	/// Builds a cumulative-weight array and performs a single draw.
	/// Returns `None` if there are no candidates or all weights are zero.
	pub fn sample<R, F>(&self, rng: &mut R, weight: F) -> Option<&str>
	where
		R: Rng + ?Sized,
		F: Fn(&str, usize) -> usize,
	{
		match self.entries.as_slice() {
			[] => return None,
			[(word, _)] => return Some(word.as_str()),
			_ => {}
		}

		let mut cumulative = Vec::with_capacity(self.entries.len());
		let mut total = 0usize;
		for (word, count) in &self.entries {
			total += weight(word, *count);
			cumulative.push(total);
		}
		if total == 0 {
			return None;
		}

		let r = rng.random_range(0..total);
		let index = cumulative.partition_point(|&c| c <= r);
		self.entries.get(index).map(|(w, _)| w.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	#[test]
	fn counts_duplicates_in_first_seen_order() {
		let t = Transitions::from_words(["sat", "ran", "sat"]);
		assert_eq!(t.count("sat"), 2);
		assert_eq!(t.count("ran"), 1);
		assert_eq!(t.count("flew"), 0);
		assert_eq!(t.total(), 3);
		assert_eq!(t.distinct(), 2);
		assert_eq!(t.to_words(), vec!["sat", "sat", "ran"]);
	}

	#[test]
	fn single_candidate_is_returned_directly() {
		let t = Transitions::from_words(["only", "only"]);
		let mut rng = StdRng::seed_from_u64(7);
		for _ in 0..10 {
			assert_eq!(t.sample(&mut rng, |_, c| c), Some("only"));
		}
	}

	#[test]
	fn empty_table_samples_nothing() {
		let mut rng = StdRng::seed_from_u64(7);
		assert_eq!(Transitions::new().sample(&mut rng, |_, c| c), None);
	}

	#[test]
	fn zero_weight_candidates_are_never_picked() {
		let t = Transitions::from_words(["a", "b"]);
		let mut rng = StdRng::seed_from_u64(1);
		for _ in 0..50 {
			assert_eq!(t.sample(&mut rng, |w, c| if w == "a" { 0 } else { c }), Some("b"));
		}
	}

	#[test]
	fn sampling_follows_weights() {
		let t = Transitions::from_words(["a", "a", "a", "b"]);
		let mut rng = StdRng::seed_from_u64(42);
		let draws = 4000;
		let hits = (0..draws)
			.filter(|_| t.sample(&mut rng, |_, c| c) == Some("a"))
			.count();
		let ratio = hits as f64 / draws as f64;
		assert!((0.70..0.80).contains(&ratio), "ratio was {ratio}");
	}

	#[test]
	fn many_distinct_words_keep_order_and_counts() {
		let words: Vec<String> = (0..20_000).map(|i| format!("w{i}")).collect();
		let mut t = Transitions::from_words(&words);
		t.merge(&Transitions::from_words(&words));
		assert_eq!(t.distinct(), 20_000);
		assert_eq!(t.total(), 40_000);
		assert_eq!(t.count("w19999"), 2);
		assert_eq!(t.iter().next(), Some(("w0", 2)));
		assert_eq!(t.iter().last(), Some(("w19999", 2)));
	}

	#[test]
	fn merge_sums_counts() {
		let mut a = Transitions::from_words(["x", "y"]);
		let b = Transitions::from_words(["y", "z"]);
		a.merge(&b);
		assert_eq!(a.count("x"), 1);
		assert_eq!(a.count("y"), 2);
		assert_eq!(a.count("z"), 1);
	}
}
