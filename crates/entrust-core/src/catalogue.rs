//! EPA catalogue: the built-in surgical set and TOML loading.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Epa;

/// Namespace for deriving stable EPA ids from their codes.
const EPA_NAMESPACE: Uuid = Uuid::from_u128(0x6d1f_3c2a_8b4e_4f0a_9c51_2e7d_a0b3_c4e5);

const SURGICAL_EPAS: [(&str, &str, &str); 18] = [
    (
        "EPA-1",
        "Evaluate and manage a patient with abdominal wall hernia",
        "Assessment and surgical management of various abdominal wall hernias",
    ),
    (
        "EPA-2",
        "Evaluate and manage a patient with the acute abdomen",
        "Diagnosis and management of patients presenting with acute abdominal pain",
    ),
    (
        "EPA-3",
        "Evaluate and manage a patient with benign anorectal disease",
        "Assessment and treatment of common anorectal conditions",
    ),
    (
        "EPA-4",
        "Evaluate a patient with right lower quadrant pain and manage appendicitis",
        "Diagnosis and surgical management of appendicitis and related conditions",
    ),
    (
        "EPA-5",
        "Evaluate and manage a patient with benign or malignant breast disease",
        "Comprehensive assessment and management of breast pathology",
    ),
    (
        "EPA-6",
        "Evaluate and manage a patient with benign or malignant colon disease",
        "Assessment and surgical management of colorectal conditions",
    ),
    (
        "EPA-7",
        "Provide surgical consultation to other health care providers",
        "Effective communication and consultation with healthcare team members",
    ),
    (
        "EPA-8",
        "Perioperative care of the critically ill surgery patient",
        "Management of critically ill surgical patients, including sepsis and hemorrhage",
    ),
    (
        "EPA-9",
        "Flexible GI endoscopy",
        "Performance and interpretation of flexible endoscopic procedures",
    ),
    (
        "EPA-10",
        "Evaluate and manage a patient with gallbladder disease",
        "Assessment and surgical management of gallbladder and biliary conditions",
    ),
    (
        "EPA-11",
        "Evaluate and manage a patient with an inguinal hernia",
        "Diagnosis and surgical repair of inguinal hernias",
    ),
    (
        "EPA-12",
        "Evaluate and manage a patient with cutaneous and subcutaneous neoplasms",
        "Assessment and surgical management of skin and soft tissue tumors",
    ),
    (
        "EPA-13",
        "Evaluate and manage a patient with severe acute or necrotizing pancreatitis",
        "Management of complex pancreatic inflammatory conditions",
    ),
    (
        "EPA-14",
        "Evaluate and manage a patient needing renal replacement therapy",
        "Assessment and management of patients requiring dialysis access",
    ),
    (
        "EPA-15",
        "Evaluate and manage a patient with small bowel obstruction",
        "Diagnosis and management of intestinal obstruction",
    ),
    (
        "EPA-16",
        "Evaluate and manage a patient with soft tissue infection",
        "Diagnosis and management of soft tissue infections, including NSTI",
    ),
    (
        "EPA-17",
        "Evaluate and manage a patient with thyroid and parathyroid disease",
        "Assessment and surgical management of thyroid and parathyroid conditions",
    ),
    (
        "EPA-18",
        "Evaluation and initial management of a patient presenting with trauma",
        "Initial assessment and resuscitation after blunt or penetrating trauma",
    ),
];

/// Stable id for an EPA code, identical across processes.
pub fn epa_id_for_code(code: &str) -> Uuid {
    Uuid::new_v5(&EPA_NAMESPACE, code.as_bytes())
}

/// The set of EPAs residents are evaluated against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalogue {
    pub name: String,
    pub epas: Vec<Epa>,
}

impl Catalogue {
    /// The 18 American Board of Surgery general surgery EPAs.
    pub fn surgical() -> Self {
        let epas = SURGICAL_EPAS
            .iter()
            .map(|(code, title, description)| Epa {
                id: epa_id_for_code(code),
                code: (*code).to_string(),
                title: (*title).to_string(),
                description: Some((*description).to_string()),
            })
            .collect();
        Self {
            name: "ABS General Surgery".to_string(),
            epas,
        }
    }

    pub fn len(&self) -> usize {
        self.epas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epas.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Epa> {
        self.epas.iter().find(|e| e.id == id)
    }

    pub fn by_code(&self, code: &str) -> Option<&Epa> {
        self.epas
            .iter()
            .find(|e| e.code.eq_ignore_ascii_case(code.trim()))
    }
}

/// Intermediate TOML structure for catalogue files.
#[derive(Debug, Deserialize)]
struct TomlCatalogue {
    #[serde(default = "default_catalogue_name")]
    name: String,
    #[serde(default)]
    epas: Vec<TomlEpa>,
}

#[derive(Debug, Deserialize)]
struct TomlEpa {
    code: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    /// Explicit id; derived from the code when omitted.
    #[serde(default)]
    id: Option<Uuid>,
}

fn default_catalogue_name() -> String {
    "custom".to_string()
}

/// Load a catalogue from a TOML file.
pub fn load_catalogue(path: &Path) -> Result<Catalogue> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalogue: {}", path.display()))?;
    parse_catalogue_str(&content, path)
}

/// Parse a TOML string into a `Catalogue`.
pub fn parse_catalogue_str(content: &str, source_path: &Path) -> Result<Catalogue> {
    let parsed: TomlCatalogue = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let epas = parsed
        .epas
        .into_iter()
        .map(|e| Epa {
            id: e.id.unwrap_or_else(|| epa_id_for_code(&e.code)),
            code: e.code,
            title: e.title,
            description: e.description,
        })
        .collect();

    Ok(Catalogue {
        name: parsed.name,
        epas,
    })
}

/// A warning from catalogue validation.
#[derive(Debug, Clone)]
pub struct CatalogueWarning {
    pub code: Option<String>,
    pub message: String,
}

/// Validate a catalogue for common issues.
pub fn validate_catalogue(catalogue: &Catalogue) -> Vec<CatalogueWarning> {
    let mut warnings = Vec::new();

    if catalogue.is_empty() {
        warnings.push(CatalogueWarning {
            code: None,
            message: "catalogue contains no EPAs".into(),
        });
    }

    let mut seen_codes = HashSet::new();
    let mut seen_ids = HashSet::new();
    for epa in &catalogue.epas {
        if !seen_codes.insert(epa.code.to_lowercase()) {
            warnings.push(CatalogueWarning {
                code: Some(epa.code.clone()),
                message: format!("duplicate EPA code: {}", epa.code),
            });
        }
        if !seen_ids.insert(epa.id) {
            warnings.push(CatalogueWarning {
                code: Some(epa.code.clone()),
                message: format!("duplicate EPA id: {}", epa.id),
            });
        }
        if epa.title.trim().is_empty() {
            warnings.push(CatalogueWarning {
                code: Some(epa.code.clone()),
                message: "title is empty".into(),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn surgical_catalogue_has_eighteen_unique_epas() {
        let catalogue = Catalogue::surgical();
        assert_eq!(catalogue.len(), 18);
        assert!(validate_catalogue(&catalogue).is_empty());
        let epa4 = catalogue.by_code("epa-4").unwrap();
        assert_eq!(epa4.id, epa_id_for_code("EPA-4"));
        assert_eq!(catalogue.get(epa4.id).unwrap().code, "EPA-4");
    }

    #[test]
    fn ids_are_stable() {
        assert_eq!(epa_id_for_code("EPA-1"), epa_id_for_code("EPA-1"));
        assert_ne!(epa_id_for_code("EPA-1"), epa_id_for_code("EPA-2"));
    }

    #[test]
    fn parse_toml_catalogue() {
        let toml = r#"
name = "Mini"

[[epas]]
code = "EPA-1"
title = "Hernia"

[[epas]]
code = "EPA-2"
title = "Acute abdomen"
description = "Acute abdominal pain"
"#;
        let catalogue = parse_catalogue_str(toml, &PathBuf::from("mini.toml")).unwrap();
        assert_eq!(catalogue.name, "Mini");
        assert_eq!(catalogue.len(), 2);
        assert_eq!(catalogue.epas[0].id, epa_id_for_code("EPA-1"));
        assert!(catalogue.epas[1].description.is_some());
    }

    #[test]
    fn validate_duplicate_codes() {
        let toml = r#"
[[epas]]
code = "EPA-1"
title = "Hernia"

[[epas]]
code = "epa-1"
title = ""
"#;
        let catalogue = parse_catalogue_str(toml, &PathBuf::from("dupes.toml")).unwrap();
        let warnings = validate_catalogue(&catalogue);
        assert!(warnings.iter().any(|w| w.message.contains("duplicate EPA code")));
        assert!(warnings.iter().any(|w| w.message.contains("title is empty")));
    }

    #[test]
    fn parse_malformed_toml() {
        let result = parse_catalogue_str("[[epas]\ncode =", &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalogue.toml");
        std::fs::write(&path, "[[epas]]\ncode = \"EPA-9\"\ntitle = \"Endoscopy\"\n").unwrap();
        let catalogue = load_catalogue(&path).unwrap();
        assert_eq!(catalogue.by_code("EPA-9").unwrap().title, "Endoscopy");
    }
}
