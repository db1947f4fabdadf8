//! services/studio/src/bin/openapi.rs
//!
//! Writes the studio's OpenAPI document to disk, `openapi.json` unless a path
//! is given as the first argument. Needs no environment or backend.

use std::path::PathBuf;
use studio_lib::web::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));

    let document = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&path, document)?;
    println!("Studio API document written to {}", path.display());
    Ok(())
}
