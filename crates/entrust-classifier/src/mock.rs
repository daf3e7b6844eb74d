//! Keyword-table classifier for tests and offline use.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use entrust_core::error::ClassifierError;
use entrust_core::traits::{CaseClassifier, Classification, ClassificationRequest};

/// Confidence reported for a keyword hit.
const MATCH_CONFIDENCE: f64 = 0.9;

/// Shorthand and keywords commonly seen in general surgery case logs.
const DEFAULT_KEYWORDS: &[(&str, &str)] = &[
    ("ventral hernia", "EPA-1"),
    ("incisional hernia", "EPA-1"),
    ("umbilical hernia", "EPA-1"),
    ("acute abdomen", "EPA-2"),
    ("perforat", "EPA-2"),
    ("hemorrhoid", "EPA-3"),
    ("fistula", "EPA-3"),
    ("appy", "EPA-4"),
    ("append", "EPA-4"),
    ("breast", "EPA-5"),
    ("mastectomy", "EPA-5"),
    ("colectomy", "EPA-6"),
    ("colon", "EPA-6"),
    ("consult", "EPA-7"),
    ("sepsis", "EPA-8"),
    ("icu", "EPA-8"),
    ("egd", "EPA-9"),
    ("peg", "EPA-9"),
    ("colonoscopy", "EPA-9"),
    ("chole", "EPA-10"),
    ("gallbladder", "EPA-10"),
    ("inguinal", "EPA-11"),
    ("lipoma", "EPA-12"),
    ("melanoma", "EPA-12"),
    ("pancreatitis", "EPA-13"),
    ("dialysis", "EPA-14"),
    ("av fistula", "EPA-14"),
    ("sbo", "EPA-15"),
    ("bowel obstruction", "EPA-15"),
    ("abscess", "EPA-16"),
    ("nsti", "EPA-16"),
    ("thyroid", "EPA-17"),
    ("parathyroid", "EPA-17"),
    ("trauma", "EPA-18"),
];

/// A classifier that maps keywords in the case text to EPA codes.
///
/// The longest matching keyword wins, so "av fistula" beats "fistula".
pub struct MockClassifier {
    /// Lowercase keyword → EPA code.
    keywords: BTreeMap<String, String>,
    call_count: AtomicU32,
    last_request: Mutex<Option<ClassificationRequest>>,
}

impl MockClassifier {
    pub fn new(keywords: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// The built-in general surgery keyword table.
    pub fn surgical() -> Self {
        Self::new(
            DEFAULT_KEYWORDS
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string())),
        )
    }

    /// The built-in table plus `extra` entries, which win on conflict.
    pub fn with_extra(extra: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut mock = Self::surgical();
        for (keyword, code) in extra {
            mock.keywords.insert(keyword.to_lowercase(), code);
        }
        mock
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<ClassificationRequest> {
        self.last_request
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl CaseClassifier for MockClassifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<Classification, ClassifierError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        let text = request.case_text.to_lowercase();
        let hit = self
            .keywords
            .iter()
            .filter(|(keyword, _)| text.contains(keyword.as_str()))
            .max_by_key(|(keyword, _)| keyword.len());

        let Some((keyword, code)) = hit else {
            return Err(ClassifierError::NoMatch(format!(
                "no keyword matches '{}'",
                request.case_text.trim()
            )));
        };
        let epa = request
            .candidates
            .iter()
            .find(|epa| epa.code.eq_ignore_ascii_case(code))
            .ok_or_else(|| ClassifierError::NoMatch(format!("unknown EPA code '{code}'")))?;

        Ok(Classification {
            epa_id: epa.id,
            confidence: MATCH_CONFIDENCE,
            suggested_comment: Some(format!("AI-mapped case: {}", request.case_text.trim())),
            reasoning: Some(format!("matched keyword '{keyword}'")),
        })
    }
}
