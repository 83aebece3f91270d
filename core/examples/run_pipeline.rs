//! Run a pipeline against the instance named by `FLOOM_URL`.
//!
//! ```text
//! FLOOM_URL=http://localhost:4050 FLOOM_API_KEY=... cargo run -p floom-core --example run_pipeline -- docs-pipeline "How do I reset the oil alert?"
//! ```
//!
//! Pass `--faq` to request a list of FAQ entries instead of plain text.

use floom_core::{FloomClient, PipelineInvocation, Record, RecordSchema, ShapeDescriptor};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct FaqEntry {
    question: String,
    answer: String,
}

impl Record for FaqEntry {
    fn schema() -> RecordSchema {
        RecordSchema::new("FaqEntry").string("question").string("answer")
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let as_faq = match args.iter().position(|arg| arg == "--faq") {
        Some(index) => {
            args.remove(index);
            true
        }
        None => false,
    };
    let pipeline_id = args.first().cloned().unwrap_or_else(|| "docs-pipeline".to_string());
    let prompt = args.get(1).cloned().unwrap_or_else(|| "How do I reset the oil alert in my dashboard?".to_string());

    let client = FloomClient::from_env()?;
    let invocation = PipelineInvocation::new(pipeline_id).prompt(prompt);

    if as_faq {
        let response = client.run_as::<FaqEntry>(&invocation.response_shape(ShapeDescriptor::list_of::<FaqEntry>()));
        if let Some(error) = &response.error {
            return Err(error.clone().into());
        }
        for value in &response.values {
            for entry in value.records() {
                println!("Q: {}\nA: {}\n", entry.question, entry.answer);
            }
        }
    } else {
        let response = client.run(&invocation);
        if let Some(error) = &response.error {
            return Err(error.clone().into());
        }
        for value in &response.values {
            match value.as_text() {
                Some(text) => println!("{text}"),
                None => println!("{:?}", value.value),
            }
        }
    }
    Ok(())
}
