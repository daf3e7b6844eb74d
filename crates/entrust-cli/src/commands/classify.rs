//! The `entrust classify-case` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use entrust_classifier::{create_classifier, load_config_from, MockClassifier};
use entrust_core::service::EvaluationService;
use entrust_core::store::InMemoryStore;
use entrust_core::traits::CaseClassifier;

pub async fn execute(text: String, offline: bool, config: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config.as_deref())?;
    let catalogue = config.load_catalogue()?;

    let classifier: Arc<dyn CaseClassifier> = if offline {
        Arc::new(MockClassifier::surgical())
    } else {
        let classifier_config = config.classifier.as_ref().context(
            "no classifier configured; set ENTRUST_OPENAI_KEY, add a [classifier] table, or pass --offline",
        )?;
        create_classifier(classifier_config)?
    };

    let service = EvaluationService::new(
        Arc::new(InMemoryStore::new()),
        catalogue,
        config.service_config(),
    )
    .with_classifier(classifier);

    let classification = service.classify_case(&text).await?;
    let epa = service
        .catalogue()
        .get(classification.epa_id)
        .context("classified EPA missing from catalogue")?;

    println!("{}: {}", epa.code, epa.title);
    println!("Confidence: {:.0}%", classification.confidence * 100.0);
    if let Some(reasoning) = &classification.reasoning {
        println!("Reasoning: {reasoning}");
    }
    if let Some(comment) = &classification.suggested_comment {
        println!("Suggested comment: {comment}");
    }

    Ok(())
}
