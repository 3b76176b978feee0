use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// One reference passage with its precomputed embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// The static reference corpus. Passages are addressed by their position
/// in the file, assigned at load time.
#[derive(Debug, Default)]
pub struct Corpus {
    entries: Vec<CorpusEntry>,
}

impl Corpus {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read corpus file {}", path.display()))?;
        let entries: Vec<CorpusEntry> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse corpus file {}", path.display()))?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<f32>>) {
        let mut passages = Vec::with_capacity(self.entries.len());
        let mut vectors = Vec::with_capacity(self.entries.len());
        for entry in self.entries {
            passages.push(entry.text);
            vectors.push(entry.embedding);
        }
        (passages, vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_entries_from_json() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"[{{"text": "We encrypt data at rest.", "embedding": [0.1, 0.2]}},
                {{"text": "Support is 24/7.", "embedding": [0.3, 0.4]}}]"#
        )
        .expect("write corpus");

        let corpus = Corpus::load(file.path()).expect("load");
        assert_eq!(corpus.len(), 2);

        let (passages, vectors) = corpus.into_parts();
        assert_eq!(passages[0], "We encrypt data at rest.");
        assert_eq!(vectors[1], vec![0.3, 0.4]);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Corpus::load(Path::new("/nonexistent/corpus.json")).is_err());
    }
}
