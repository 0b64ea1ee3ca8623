use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::catalog::descriptor::IndexDescriptor;
use crate::document::{Document, Value};
use crate::error::Result;
use crate::key_encoder::{encode_value, OrderedKey, RecordId, TypeBits};
use crate::sdi::{BulkBuilder, DupPolicy, SortedDataInterface, ValidationReport};

use super::{AccessMethod, AccessMethodStats, InsertResult};

const STOPWORDS: &[&str] = &["a", "an", "the", "and", "or", "of", "to", "in", "is", "it"];

lazy_static! {
    static ref WORD: Regex = Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}]+)?").unwrap();
}

fn tokenize(text: &str) -> BTreeSet<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Text access method: every indexed text field is tokenized into a
/// set of lowercased words (stopwords dropped), one key per distinct
/// word per document. No language-specific
/// stemming — out of scope without a real text-analysis crate.
pub struct TextAccessMethod {
    descriptor: IndexDescriptor,
    sdi: Arc<dyn SortedDataInterface>,
    // True once some document has tokenized into more than one key —
    // a single-token field indexes no differently than a scalar field.
    multikey: AtomicBool,
}

impl TextAccessMethod {
    pub fn new(descriptor: IndexDescriptor, sdi: Arc<dyn SortedDataInterface>) -> TextAccessMethod {
        TextAccessMethod { descriptor, sdi, multikey: AtomicBool::new(false) }
    }

    fn tokens(&self, document: &Document) -> BTreeSet<String> {
        let mut tokens = BTreeSet::new();
        for field in &self.descriptor.key_pattern.0 {
            for (value, _) in document.resolve_path(&field.path) {
                if let Value::Str(s) = value {
                    tokens.extend(tokenize(&s));
                }
            }
        }
        tokens
    }

    fn encode_token(&self, token: &str, record_id: RecordId) -> OrderedKey {
        let mut user_key = Vec::new();
        let mut bits = TypeBits::new();
        encode_value(&Value::Str(token.to_string()), false, &mut user_key, &mut bits);
        OrderedKey::new(user_key, bits, record_id)
    }
}

impl AccessMethod for TextAccessMethod {
    fn insert(&self, document: &Document, record_id: RecordId) -> Result<InsertResult> {
        let tokens = self.tokens(document);
        for token in &tokens {
            self.sdi.insert(&self.encode_token(token, record_id.clone()), DupPolicy::Allow)?;
        }
        if tokens.len() > 1 {
            self.multikey.store(true, Ordering::Relaxed);
        }
        Ok(InsertResult { keys_inserted: tokens.len() as u64, multikey_paths: Default::default() })
    }

    fn remove(&self, document: &Document, record_id: RecordId) -> Result<()> {
        for token in self.tokens(document) {
            self.sdi.unindex(&self.encode_token(&token, record_id.clone()))?;
        }
        Ok(())
    }

    fn initiate_bulk(&self) -> Box<dyn BulkBuilder> {
        self.sdi.make_bulk_builder()
    }

    fn validate(&self) -> Result<ValidationReport> {
        self.sdi.validate()
    }

    fn compact(&self) -> Result<()> {
        self.sdi.compact()
    }

    fn initialize_as_empty(&self) -> Result<()> {
        self.sdi.init_as_empty()
    }

    fn ident(&self) -> &str {
        &self.descriptor.name
    }

    fn stats(&self) -> AccessMethodStats {
        AccessMethodStats {
            num_keys: self.sdi.num_entries(),
            is_multikey: self.multikey.load(Ordering::Relaxed),
            space_used_bytes: self.sdi.space_used_bytes(),
        }
    }
}
