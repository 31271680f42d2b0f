mod engine;

use std::sync::Arc;
use futures::stream::StreamExt;
use kiln::ServeConfig;
use kiln::generation::{GenerationInference, GenerationRequest, GenerationService};
use crate::engine::EchoEngine;

#[tokio::main]
async fn main() {
    kiln::logging::init_from_env();

    let mut config = match ServeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("bad configuration: {e}");
            std::process::exit(2);
        }
    };
    if config.model_id.is_none() {
        config.model_id = Some("echo".to_string());
    }

    let service = match GenerationInference::from_config(EchoEngine::new(), &config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            eprintln!("failed to start: {e}");
            std::process::exit(2);
        }
    };

    let prompts = [
        "the quick brown fox",
        "jumps over the lazy dog",
        "streams arrive one word at a time",
        "and never two at once",
    ];

    let handles = prompts.iter().enumerate().map(|(e, prompt)| {
        let service = service.clone();
        let prompt = prompt.to_string();

        tokio::spawn(async move {
            let frames = match service.infer_stream(GenerationRequest::new(prompt, 32)).await {
                Ok(frames) => frames,
                Err(err) => {
                    println!("Index {} rejected: {}", e, err);
                    return;
                }
            };
            let mut lines = frames.with_error_lines();
            while let Some(line) = lines.next().await {
                print!("[{}] {}", e, line);
            }
        })
    }).collect::<Vec<_>>();

    for handle in futures::future::join_all(handles).await {
        match handle {
            Ok(_) => {},
            Err(e) => println!("Err joining handle: {:?}", e),
        }
    }

    tracing::info!(inferences = service.gate().inference_count(), "done");
}
