use salescoach_api::router::ApiDoc;
use utoipa::OpenApi;

/// Writes the OpenAPI specification for the gateway to disk, so clients can
/// be generated without running the server. An output path may be given as
/// the first argument.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());
    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&path, spec_json)?;
    println!("Wrote OpenAPI spec to {}", path);
    Ok(())
}
