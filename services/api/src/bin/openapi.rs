//! services/api/src/bin/openapi.rs
//!
//! Prints the OpenAPI specification as JSON, for generating clients or
//! checking the spec into docs without running the server.

use api_lib::web::ApiDoc;
use utoipa::OpenApi;

fn main() {
    match ApiDoc::openapi().to_pretty_json() {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to render OpenAPI spec: {e}");
            std::process::exit(1);
        }
    }
}
