//! Tiny i18n translation map.
//!
//! A [`Translator`] holds `line → text` entries per idiom, loaded in
//! contexts so the same bundle is not merged twice. Texts may carry
//! positional placeholders (`{0}`, `{1}`, …) filled at translation time.

use std::collections::{HashMap, HashSet};

/// A translation bundle: idiom → (line key → text).
pub type LanguageBundle = HashMap<String, HashMap<String, String>>;

#[derive(Debug, Default)]
pub struct Translator {
    entries: HashMap<String, String>,
    loaded_contexts: HashSet<String>,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the `idiom` section of a bundle under the given context.
    /// Loading the same (context, idiom) pair again is a no-op, so callers
    /// can register bundles unconditionally at startup.
    pub fn load(&mut self, bundle: &LanguageBundle, context: &str, idiom: &str) {
        let context_idiom = format!("{context}_{idiom}");
        if !self.loaded_contexts.insert(context_idiom) {
            return;
        }

        if let Some(lines) = bundle.get(idiom) {
            for (line, text) in lines {
                self.entries.insert(format!("{line}_{idiom}"), text.clone());
            }
        }
    }

    /// Translate `line` into `idiom`, replacing `{0}`, `{1}`, … with the
    /// given values (first occurrence each). Returns an empty string when
    /// the line is unknown; replacements are not applied in that case.
    pub fn translate(&self, line: &str, idiom: &str, replacements: &[&str]) -> String {
        let Some(text) = self.entries.get(&format!("{line}_{idiom}")) else {
            return String::new();
        };

        let mut value = text.clone();
        for (index, replacement) in replacements.iter().enumerate() {
            value = value.replacen(&format!("{{{index}}}"), replacement, 1);
        }
        value
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
