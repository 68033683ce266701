use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::forecast::ForecastEngine;
use crate::geometry;
use crate::snapshots;
use crate::store::WindowStore;
use crate::telemetry::TelemetrySource;

/// Everything a request handler needs, shared across the warp filters.
pub struct AppState {
    pub telemetry: TelemetrySource,
    pub store: WindowStore,
    pub engine: ForecastEngine,
}

impl AppState {
    pub fn from_config() -> Self {
        Self {
            telemetry: TelemetrySource::new(),
            store: WindowStore::from_config(),
            engine: ForecastEngine::from_config(),
        }
    }
}

pub async fn run(address: std::net::SocketAddr) {
    let state = Arc::new(AppState::from_config());
    log::info!("Serving on {}", address);

    let routes = routes(state)
        .with(warp::compression::gzip())
        .recover(rejection);

    warp::serve(routes).run(address).await
}

fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let health_route = warp::path!("health").map(|| StatusCode::OK);

    let balloons_route = warp::path!("api" / "balloons")
        .and(with_state(state.clone()))
        .and_then(balloons);

    let forecast_route = warp::path!("api" / "forecast")
        .and(warp::query::<ForecastQuery>())
        .and(with_state(state))
        .and_then(forecast);

    health_route.or(balloons_route).or(forecast_route)
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// The repaired 24-hour window as a grid of `[lat, lon, alt]` triples,
/// oldest hour first.
pub async fn balloons(state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let window = snapshots::load_window(&state.telemetry, &state.store)
        .await
        .map_err(|e| warp::reject::custom(Error(e)))?;

    Ok(warp::reply::json(&window))
}

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    lat: f64,
    lon: f64,
    #[serde(default)]
    alt: f64,
}

/// A 24-hour drift forecast from the query origin, interpolated and
/// smoothed for rendering.
pub async fn forecast(query: ForecastQuery, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    // The query string parses NaN and inf into f64; those are not origins.
    if !(query.lat.is_finite() && query.lon.is_finite() && query.alt.is_finite()) {
        return Err(warp::reject::custom(InvalidOrigin));
    }

    match state.engine.forecast(query.lat, query.lon, query.alt).await {
        Some(trajectory) => Ok(warp::reply::json(&geometry::shape(&trajectory))),
        None => Err(warp::reject::custom(ForecastUnavailable)),
    }
}

#[derive(Debug)]
struct Error(anyhow::Error);
impl warp::reject::Reject for Error {}

#[derive(Debug)]
struct ForecastUnavailable;
impl warp::reject::Reject for ForecastUnavailable {}

#[derive(Debug)]
struct InvalidOrigin;
impl warp::reject::Reject for InvalidOrigin {}

#[derive(Serialize)]
struct ErrorMessage {
    code: u16,
    message: String,
}

pub async fn rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found.")
    } else if err.find::<ForecastUnavailable>().is_some() {
        (StatusCode::NOT_FOUND, "No forecast available for this origin.")
    } else if err.find::<InvalidOrigin>().is_some() {
        (StatusCode::BAD_REQUEST, "Origin coordinates must be finite.")
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string.")
    } else if let Some(error) = err.find::<Error>() {
        log::error!("Error: {:#}", error.0);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    } else {
        log::error!("Error: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    };

    let json = warp::reply::json(&ErrorMessage {
        code: code.as_u16(),
        message: message.into(),
    });

    Ok(warp::reply::with_status(json, code))
}
