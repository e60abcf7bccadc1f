use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use log::debug;
use rand::Rng;
use rand::seq::IteratorRandom;

use super::preprocess::{is_terminal, preprocess_text, tokenize};
use super::transitions::Transitions;
use crate::config::EndHeuristic;
use crate::error::{ChainError, Result};
use crate::io::read_file;

/// Builds the composite `contextWeights` key for a `(context, next word)` pair.
///
/// Preprocessing strips `|` from words, so the pair is recoverable.
pub(crate) fn weight_key(key: &str, word: &str) -> String {
	format!("{key}|{word}")
}

/// Word-level Markov chain of a fixed order.
///
/// The model learns which word follows each run of `order - 1` words
/// (the context key) and generates text by walking those transitions.
///
/// # Responsibilities
/// - Learn transitions, sentence boundaries and word frequencies from raw text
/// - Generate text with weighted sampling and a soft length target
/// - Merge with another model of the same order (parallel training)
///
/// # Invariants
/// - `order >= 2` and never changes
/// - Every key in `chain` is exactly `order - 1` space-joined words
/// - `chain[k].count(w) == context_weights["k|w"]` for every trained pair
/// - Nothing is ever removed by training
#[derive(Clone, Debug, PartialEq)]
pub struct ChainModel {
	pub(crate) order: usize,
	pub(crate) chain: HashMap<String, Transitions>,
	pub(crate) sentence_starters: HashSet<String>,
	pub(crate) sentence_enders: HashSet<String>,
	pub(crate) word_frequency: HashMap<String, usize>,
	pub(crate) context_weights: HashMap<String, usize>,
	ending: EndHeuristic,
}

/// Aggregate counts for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainStats {
	/// Number of distinct context keys.
	pub chain_size: usize,
	/// Number of distinct words seen.
	pub vocabulary_size: usize,
	/// Size of the sentence starter set.
	pub starters: usize,
	/// Size of the sentence ender set.
	pub enders: usize,
	/// Words trained on, counting repeats.
	pub total_words: usize,
	/// Transitions recorded, counting repeats.
	pub total_transitions: usize,
}

impl fmt::Display for ChainStats {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} contexts, {} unique words ({} total), {} transitions, {} starters, {} enders",
			self.chain_size,
			self.vocabulary_size,
			self.total_words,
			self.total_transitions,
			self.starters,
			self.enders
		)
	}
}

impl ChainModel {
	/// Creates an empty model of order `order` with the default end heuristic.
	///
	/// # Errors
	/// Returns `InvalidOrder` if `order < 2`.
	pub fn new(order: usize) -> Result<Self> {
		Self::with_heuristic(order, EndHeuristic::default())
	}

	/// Creates an empty model with a custom end heuristic.
	///
	/// # Parameters
	/// - `order`: context length plus one, at least 2
	/// - `ending`: tuning of [`should_end_sentence`](Self::should_end_sentence)
	///
	/// # Errors
	/// Returns `InvalidOrder` if `order < 2`.
	pub fn with_heuristic(order: usize, ending: EndHeuristic) -> Result<Self> {
		if order < 2 {
			return Err(ChainError::InvalidOrder(order));
		}
		Ok(Self {
			order,
			chain: HashMap::new(),
			sentence_starters: HashSet::new(),
			sentence_enders: HashSet::new(),
			word_frequency: HashMap::new(),
			context_weights: HashMap::new(),
			ending,
		})
	}

	/// Empty model sharing this model's order and heuristic.
	fn empty_like(&self) -> Self {
		Self {
			order: self.order,
			chain: HashMap::new(),
			sentence_starters: HashSet::new(),
			sentence_enders: HashSet::new(),
			word_frequency: HashMap::new(),
			context_weights: HashMap::new(),
			ending: self.ending.clone(),
		}
	}

	/// Number of words in a context key plus one.
	pub fn order(&self) -> usize {
		self.order
	}

	/// End heuristic used by generation. Not persisted.
	pub fn ending(&self) -> &EndHeuristic {
		&self.ending
	}

	/// Splits raw text into cleaned sentences. See [`preprocess_text`].
	pub fn preprocess_text(text: &str) -> Vec<String> {
		preprocess_text(text)
	}

	/// Learns from raw text (typically one chat message).
	///
	/// Sentences with fewer than `order` words are skipped. Never fails:
	/// empty input is a no-op and text without terminal punctuation is
	/// treated as one sentence.
	pub fn train(&mut self, text: &str) {
		for sentence in preprocess_text(text) {
			let words = tokenize(&sentence);
			if words.len() < self.order {
				debug!("skipping short sentence ({} words, order {})", words.len(), self.order);
				continue;
			}
			self.train_words(&words);
		}
	}

	fn train_words(&mut self, words: &[&str]) {
		let [first, .., last] = words else {
			return;
		};
		self.sentence_starters.insert((*first).to_owned());
		self.sentence_enders.insert((*last).to_owned());

		for word in words {
			*self.word_frequency.entry((*word).to_owned()).or_insert(0) += 1;
		}

		// Slide a window of `order` words: the first `order - 1` form the key
		for window in words.windows(self.order) {
			let (context, next) = window.split_at(self.order - 1);
			let key = context.join(" ");
			let next = next[0];
			*self.context_weights.entry(weight_key(&key, next)).or_insert(0) += 1;
			self.chain.entry(key).or_default().add(next, 1);
		}
	}

	/// Trains on many messages at once, using all CPU cores.
	///
	/// Lines are split into `cpus * 8` chunks, each chunk is learned by a
	/// partial model on its own thread, and the partial models are merged
	/// into `self`. The result is the same as calling `train` on every line.
	pub fn train_lines(&mut self, lines: &[String]) {
		if lines.is_empty() {
			return;
		}
		let chunks = num_cpus::get() * 8;
		let chunk_size = lines.len().div_ceil(chunks).max(1);

		let (tx, rx) = mpsc::channel();
		for chunk in lines.chunks(chunk_size) {
			let tx = tx.clone();
			let chunk: Vec<String> = chunk.to_vec();
			let mut partial_model = self.empty_like();

			thread::spawn(move || {
				for line in &chunk {
					partial_model.train(line);
				}
				// The receiver outlives every sender
				let _ = tx.send(partial_model);
			});
		}
		drop(tx);

		for partial_model in rx.iter() {
			self.absorb(&partial_model);
		}
		debug!("trained on {} lines", lines.len());
	}

	/// Reads a text file and trains on each of its lines in parallel.
	pub fn train_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
		let lines = read_file(path)?;
		self.train_lines(&lines);
		Ok(())
	}

	/// Merges another model of the same order into this one.
	///
	/// Transition counts, context weights and word frequencies are summed;
	/// starter and ender sets are united.
	///
	/// # Errors
	/// Returns `OrderMismatch` if the orders differ.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.order != other.order {
			return Err(ChainError::OrderMismatch { expected: self.order, got: other.order });
		}
		self.absorb(other);
		Ok(())
	}

	fn absorb(&mut self, other: &Self) {
		for (key, transitions) in &other.chain {
			self.chain.entry(key.clone()).or_default().merge(transitions);
		}
		for (key, weight) in &other.context_weights {
			*self.context_weights.entry(key.clone()).or_insert(0) += weight;
		}
		for (word, count) in &other.word_frequency {
			*self.word_frequency.entry(word.clone()).or_insert(0) += count;
		}
		self.sentence_starters.extend(other.sentence_starters.iter().cloned());
		self.sentence_enders.extend(other.sentence_enders.iter().cloned());
	}

	/// Picks the next word among `candidates` observed after `key`.
	///
	/// A single distinct candidate is returned directly. Otherwise each
	/// candidate is weighted by its occurrence count, or by its context
	/// weight when that is larger (both agree on a consistently trained model).
	pub fn select_next_word(&self, candidates: &Transitions, key: &str) -> Option<String> {
		self.select_next_word_with_rng(&mut rand::rng(), candidates, key)
	}

	/// Same as [`select_next_word`](Self::select_next_word), drawing from `rng`.
	///
	/// # Returns
	/// `None` only when `candidates` is empty.
	pub fn select_next_word_with_rng<R: Rng + ?Sized>(
		&self,
		rng: &mut R,
		candidates: &Transitions,
		key: &str,
	) -> Option<String> {
		candidates
			.sample(rng, |word, count| count.max(self.context_weight(key, word)))
			.map(str::to_owned)
	}

	/// Decides whether generation should stop after the word that produced `key`.
	///
	/// Combines a baseline jitter, the progress towards `target_length`, and
	/// whether the last word of `key` is a known sentence ender. Always true
	/// once `current_length` reaches [`EndHeuristic::hard_limit`].
	pub fn should_end_sentence(&self, key: &str, current_length: usize, target_length: usize) -> bool {
		self.should_end_sentence_with_rng(&mut rand::rng(), key, current_length, target_length)
	}

	/// Same as [`should_end_sentence`](Self::should_end_sentence), drawing from `rng`.
	///
	/// # Parameters
	/// - `key`: current context key, its last word is checked against the enders
	/// - `current_length`: words emitted so far
	/// - `target_length`: soft target the stop probability ramps towards
	pub fn should_end_sentence_with_rng<R: Rng + ?Sized>(
		&self,
		rng: &mut R,
		key: &str,
		current_length: usize,
		target_length: usize,
	) -> bool {
		if current_length >= self.ending.hard_limit(target_length) {
			return true;
		}
		let is_ender = key
			.rsplit(' ')
			.next()
			.is_some_and(|word| self.sentence_enders.contains(word));
		let p = self.ending.stop_probability(is_ender, current_length, target_length);
		rng.random::<f64>() < p
	}

	/// Generates text from the chain.
	///
	/// - `start_key`: used if it is an existing context key, otherwise a key
	///   starting with a sentence starter is picked at random (any key if none)
	/// - `target_length`: soft word count target (treated as at least 1)
	/// - `coherent`: capitalize the first letter and end with one terminal mark
	///
	/// Returns an empty string for an untrained model. Output varies between
	/// calls unless the chain has a single path.
	pub fn generate(&self, start_key: Option<&str>, target_length: usize, coherent: bool) -> String {
		self.generate_with_rng(&mut rand::rng(), start_key, target_length, coherent)
	}

	/// Same as [`generate`](Self::generate), drawing every random choice from `rng`.
	///
	/// A seeded `rng` makes the output reproducible for a given model.
	pub fn generate_with_rng<R: Rng + ?Sized>(
		&self,
		rng: &mut R,
		start_key: Option<&str>,
		target_length: usize,
		coherent: bool,
	) -> String {
		if self.chain.is_empty() {
			return String::new();
		}
		let target_length = target_length.max(1);
		let Some(mut key) = self.pick_start_key(rng, start_key) else {
			return String::new();
		};

		let mut words: Vec<String> = tokenize(&key).into_iter().map(str::to_owned).collect();
		loop {
			let Some(candidates) = self.chain.get(&key).filter(|t| !t.is_empty()) else {
				debug!("dead end after {} words", words.len());
				break;
			};
			let Some(next) = self.select_next_word_with_rng(rng, candidates, &key) else {
				break;
			};
			words.push(next);
			key = words[words.len().saturating_sub(self.order - 1)..].join(" ");

			if self.should_end_sentence_with_rng(rng, &key, words.len(), target_length) {
				break;
			}
		}

		if coherent {
			finish_sentence(&words)
		} else {
			words.join(" ")
		}
	}

	fn pick_start_key<R: Rng + ?Sized>(&self, rng: &mut R, start_key: Option<&str>) -> Option<String> {
		if let Some(key) = start_key {
			if self.chain.contains_key(key) {
				return Some(key.to_owned());
			}
			debug!("unknown start key {key:?}, picking a random one");
		}

		let from_starters = self
			.chain
			.keys()
			.filter(|key| {
				key.split(' ')
					.next()
					.is_some_and(|first| self.sentence_starters.contains(first))
			})
			.choose(rng);
		from_starters.or_else(|| self.chain.keys().choose(rng)).cloned()
	}

	/// True until at least one context has been learned or loaded.
	pub fn is_empty(&self) -> bool {
		self.chain.is_empty()
	}

	/// Whether `key` is a known context. Keys are `order - 1` words joined by a space.
	pub fn contains_key(&self, key: &str) -> bool {
		self.chain.contains_key(key)
	}

	/// Candidate next words for a context key.
	pub fn candidates(&self, key: &str) -> Option<&Transitions> {
		self.chain.get(key)
	}

	/// Every context key, in no particular order.
	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.chain.keys().map(String::as_str)
	}

	/// Words seen at the start of a sentence.
	pub fn sentence_starters(&self) -> &HashSet<String> {
		&self.sentence_starters
	}

	/// Words seen at the end of a sentence.
	pub fn sentence_enders(&self) -> &HashSet<String> {
		&self.sentence_enders
	}

	/// Number of times `word` was trained on (0 if never).
	pub fn word_frequency(&self, word: &str) -> usize {
		self.word_frequency.get(word).copied().unwrap_or(0)
	}

	/// Number of times `word` was observed after `key` (0 if never).
	pub fn context_weight(&self, key: &str, word: &str) -> usize {
		self.context_weights.get(&weight_key(key, word)).copied().unwrap_or(0)
	}

	/// Current table sizes. Cost is linear in the number of contexts.
	pub fn stats(&self) -> ChainStats {
		ChainStats {
			chain_size: self.chain.len(),
			vocabulary_size: self.word_frequency.len(),
			starters: self.sentence_starters.len(),
			enders: self.sentence_enders.len(),
			total_words: self.word_frequency.values().sum(),
			total_transitions: self.chain.values().map(Transitions::total).sum(),
		}
	}
}

/// Capitalizes the first letter and ensures exactly one terminal mark.
fn finish_sentence(words: &[String]) -> String {
	let joined = words.join(" ");
	let mut chars = joined.chars();
	let mut text: String = match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => return joined,
	};

	if is_terminal(&text) {
		let body_len = text.trim_end_matches(['.', '!', '?']).len();
		let mark = text[body_len..].chars().next().unwrap_or('.');
		text.truncate(body_len);
		text.push(mark);
	} else {
		text.push('.');
	}
	text
}
