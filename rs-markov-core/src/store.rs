use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};
use crate::io::{has_extension, write_atomic};
use crate::model::chain_model::ChainModel;
use crate::model::transitions::Transitions;

/// Version tag written by `save`.
pub const FORMAT_VERSION: &str = "2.0";

/// Version assumed for payloads that carry no tag.
const LEGACY_VERSION: &str = "1.0";

fn legacy_version() -> String {
	LEGACY_VERSION.to_owned()
}

/// On-disk encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreFormat {
	/// Pretty-printed JSON, backward compatible with older payloads.
	Json,
	/// Compact `postcard` snapshot. Not self-describing: only files written
	/// by the same version can be read back.
	Binary,
}

/// Persisted shape of a model.
///
/// Only `chain` is required; every other field defaults when absent so
/// payloads written by older versions still load.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PersistedModel {
	#[serde(default)]
	order: Option<usize>,
	#[serde(default)]
	chain: Option<BTreeMap<String, Vec<String>>>,
	#[serde(default)]
	sentence_starters: Vec<String>,
	#[serde(default)]
	sentence_enders: Vec<String>,
	#[serde(default)]
	word_frequency: BTreeMap<String, usize>,
	#[serde(default)]
	context_weights: BTreeMap<String, usize>,
	#[serde(default)]
	last_saved: Option<DateTime<Utc>>,
	#[serde(default = "legacy_version")]
	version: String,
}

/// Summary of a persisted model, read without building a `ChainModel`.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreStats {
	/// Number of context keys
	pub chain_size: usize,
	/// Number of sentence starters
	pub starters: usize,
	/// Number of sentence enders
	pub enders: usize,
	/// Number of entries in the word frequency table
	pub unique_words: usize,
	/// `None` for payloads written before timestamps were recorded
	pub last_saved: Option<DateTime<Utc>>,
	/// `"1.0"` when the payload carries no version tag
	pub version: String,
}

fn sorted<'a, I: IntoIterator<Item = &'a String>>(words: I) -> Vec<String> {
	let mut words: Vec<String> = words.into_iter().cloned().collect();
	words.sort();
	words
}

impl PersistedModel {
	/// Snapshot of every table, taken in one synchronous step.
	fn snapshot(model: &ChainModel) -> Self {
		Self {
			order: Some(model.order),
			chain: Some(
				model
					.chain
					.iter()
					.map(|(key, transitions)| (key.clone(), transitions.to_words()))
					.collect(),
			),
			sentence_starters: sorted(&model.sentence_starters),
			sentence_enders: sorted(&model.sentence_enders),
			word_frequency: model.word_frequency.iter().map(|(k, v)| (k.clone(), *v)).collect(),
			context_weights: model.context_weights.iter().map(|(k, v)| (k.clone(), *v)).collect(),
			last_saved: Some(Utc::now()),
			version: FORMAT_VERSION.to_owned(),
		}
	}

	/// Builds a model from the payload.
	///
	/// # Parameters
	/// - `template`: supplies the end heuristic (not persisted), and the
	///   order when the payload has neither an `order` nor any key
	///
	/// # Behavior
	/// - A missing `order` is inferred from the key length (`words + 1`)
	/// - Every key must then hold exactly `order - 1` words
	///
	/// # Errors
	/// `MissingChain`, `InvalidOrder` or `MalformedKey`.
	fn into_model(self, template: &ChainModel) -> Result<ChainModel> {
		let chain = self.chain.ok_or(ChainError::MissingChain)?;
		let key_words = |key: &str| key.split_whitespace().count();
		let order = match (self.order, chain.keys().next()) {
			(Some(order), _) => order,
			(None, Some(key)) => key_words(key.as_str()) + 1,
			(None, None) => template.order,
		};
		let mut model = ChainModel::with_heuristic(order, template.ending().clone())?;

		if let Some(key) = chain.keys().find(|key| key_words(key.as_str()) != order - 1) {
			return Err(ChainError::MalformedKey { key: key.clone(), expected: order - 1 });
		}

		model.chain = chain
			.into_iter()
			.map(|(key, words)| (key, Transitions::from_words(words)))
			.collect();
		model.sentence_starters = self.sentence_starters.into_iter().collect();
		model.sentence_enders = self.sentence_enders.into_iter().collect();
		model.word_frequency = self.word_frequency.into_iter().collect();
		model.context_weights = self.context_weights.into_iter().collect();
		Ok(model)
	}

	fn stats(&self) -> Result<StoreStats> {
		let chain = self.chain.as_ref().ok_or(ChainError::MissingChain)?;
		Ok(StoreStats {
			chain_size: chain.len(),
			starters: self.sentence_starters.len(),
			enders: self.sentence_enders.len(),
			unique_words: self.word_frequency.len(),
			last_saved: self.last_saved,
			version: self.version.clone(),
		})
	}
}

/// Saves and loads a `ChainModel` at a fixed path.
///
/// # Format
/// - `.bin` files use the compact binary snapshot
/// - anything else is JSON
///
/// # Failure handling
/// `save`, `load` and `get_stats` never return errors: failures are logged
/// and reported as `false` / `None`. The `try_*` variants expose the error.
/// A failed load leaves the target model untouched.
#[derive(Clone, Debug)]
pub struct ModelStore {
	path: PathBuf,
	format: StoreFormat,
}

impl ModelStore {
	/// Creates a store, choosing the format from the file extension.
	pub fn new<P: Into<PathBuf>>(path: P) -> Self {
		let path = path.into();
		let format = if has_extension(&path, "bin") { StoreFormat::Binary } else { StoreFormat::Json };
		Self { path, format }
	}

	/// Creates a store with an explicit format, whatever the extension.
	///
	/// # Parameters
	/// - `path`: file to read and write
	/// - `format`: encoding used for both directions
	pub fn with_format<P: Into<PathBuf>>(path: P, format: StoreFormat) -> Self {
		Self { path: path.into(), format }
	}

	/// File this store reads and writes.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Encoding used by this store.
	pub fn format(&self) -> StoreFormat {
		self.format
	}

	/// Writes the model, creating parent directories as needed.
	///
	/// Returns `false` (after logging) on any failure.
	pub fn save(&self, model: &ChainModel) -> bool {
		match self.try_save(model) {
			Ok(()) => {
				info!("[Store] saved {} contexts to {}", model.chain.len(), self.path.display());
				true
			}
			Err(e) => {
				error!("[Store] failed to save {}: {}", self.path.display(), e);
				false
			}
		}
	}

	/// Writes the model and reports the failure instead of logging it.
	///
	/// Every table is snapshotted before anything touches the disk. The bytes
	/// go to a temporary file in the target directory which then replaces the
	/// target, so readers never see a half-written file.
	///
	/// # Errors
	/// `Json` / `Binary` on encoding failure, `Io` or `Persist` on write failure.
	pub fn try_save(&self, model: &ChainModel) -> Result<()> {
		let payload = PersistedModel::snapshot(model);
		let bytes = match self.format {
			StoreFormat::Json => serde_json::to_vec_pretty(&payload)?,
			StoreFormat::Binary => postcard::to_stdvec(&payload)?,
		};
		write_atomic(&self.path, &bytes)
	}

	/// Replaces `model` with the persisted one.
	///
	/// Returns `false` (after logging) if the file is missing, unparsable or
	/// has no `chain`; `model` is then left unmodified.
	pub fn load(&self, model: &mut ChainModel) -> bool {
		match self.try_load(model) {
			Ok(loaded) => {
				info!("[Store] loaded {} contexts from {}", loaded.chain.len(), self.path.display());
				*model = loaded;
				true
			}
			Err(e) => {
				error!("[Store] failed to load {}: {}", self.path.display(), e);
				false
			}
		}
	}

	/// Reads the persisted model without touching `template`.
	///
	/// # Parameters
	/// - `template`: supplies the end heuristic, and the order of an empty
	///   payload that has no `order` field
	///
	/// # Returns
	/// The loaded model, ready to replace `template`.
	///
	/// # Errors
	/// `Io`, `Json` or `Binary` if the file cannot be read or decoded;
	/// `MissingChain`, `InvalidOrder` or `MalformedKey` if its content is unusable.
	pub fn try_load(&self, template: &ChainModel) -> Result<ChainModel> {
		let payload = self.read_payload()?;
		if payload.version != FORMAT_VERSION {
			warn!("[Store] {} has version {}, missing tables default to empty", self.path.display(), payload.version);
		}
		payload.into_model(template)
	}

	/// Summary counts of the persisted file, or `None` if it cannot be read.
	///
	/// Only decodes the payload: no model is built, so keys are not checked
	/// against the order.
	pub fn get_stats(&self) -> Option<StoreStats> {
		match self.read_payload().and_then(|payload| payload.stats()) {
			Ok(stats) => Some(stats),
			Err(e) => {
				error!("[Store] failed to read stats from {}: {}", self.path.display(), e);
				None
			}
		}
	}

	fn read_payload(&self) -> Result<PersistedModel> {
		let bytes = fs::read(&self.path)?;
		let payload: PersistedModel = match self.format {
			StoreFormat::Json => serde_json::from_slice(&bytes)?,
			StoreFormat::Binary => postcard::from_bytes(&bytes)?,
		};
		Ok(payload)
	}
}
