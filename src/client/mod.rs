use rocket::serde::json::Json;
use rocket::{get, routes, Build, Rocket, State};
use serde::{Deserialize, Serialize};

use crate::blocks::block_fetcher::RpcHeaderSource;
use crate::circuits::encoder::CIRCUIT_V1;
use crate::config::Config;
use crate::error::Error;
use crate::proofs::generators::{BatchJob, BatchRange};
use crate::registry::ChainId;

#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse {
    pub code: usize,
    pub input: Option<String>,
    pub error: Option<String>,
}

impl ApiResponse {
    fn failure(code: usize, error: String) -> Json<ApiResponse> {
        Json(ApiResponse {
            code,
            input: None,
            error: Some(error),
        })
    }
}

pub fn rocket(config: Config) -> Rocket<Build> {
    rocket::build()
        .manage(config)
        .mount("/light-client", routes![get_batch_input])
}

#[get("/batches/input?<chain>&<start>&<end>")]
pub async fn get_batch_input(
    config: &State<Config>,
    chain: &str,
    start: i64,
    end: i64,
) -> Json<ApiResponse> {
    log::info!("Building {chain} circuit input for range {start} to {end}");

    let chain = match chain.parse::<ChainId>() {
        Ok(c) => c,
        Err(e) => return ApiResponse::failure(400, e),
    };
    let range = match BatchRange::new(start, end) {
        Ok(r) => r,
        Err(e) => return ApiResponse::failure(400, e.to_string()),
    };
    let source = match RpcHeaderSource::from_config(config, chain) {
        Ok(s) => s,
        Err(e) => return ApiResponse::failure(500, e.to_string()),
    };

    match BatchJob::new(chain, range).encode(&source, &CIRCUIT_V1).await {
        Ok(input) => Json(ApiResponse {
            code: 200,
            input: Some(input.to_string()),
            error: None,
        }),
        Err(e) => {
            log::error!("Error: {:#?}", e);
            let code = match e.source {
                Error::MalformedHeader { .. } | Error::InvalidDifficultyEncoding { .. } => 422,
                _ => 500,
            };
            ApiResponse::failure(code, e.to_string())
        }
    }
}
