use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::query::{self, Collection, Populate, QueryParams};
use crate::state::AppState;

/// Collection and relations a list route reads, plus the shared state.
#[derive(Clone)]
pub struct AdvancedSource {
    pub state: AppState,
    pub collection: &'static Collection,
    pub populate: Vec<Populate>,
}

impl AdvancedSource {
    pub fn new(state: &AppState, collection: &'static Collection) -> Self {
        Self { state: state.clone(), collection, populate: vec![] }
    }

    pub fn populate(mut self, relation: Populate) -> Self {
        self.populate.push(relation);
        self
    }
}

/// Runs the query-string translator and hands the envelope to the next handler
/// as an `Extension<AdvancedResults>`.
pub async fn advanced_results(
    State(source): State<AdvancedSource>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let params = QueryParams::parse(request.uri().query().unwrap_or_default());
    let results = query::advanced_results(
        source.state.db.as_ref(),
        &params,
        source.collection,
        &source.populate,
        &source.state.config.query,
    )
    .await?;

    request.extensions_mut().insert(results);
    Ok(next.run(request).await)
}
