use axum::{
    handler::Handler,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers::{auth, bootcamps, courses, reviews, system, users};
use crate::middleware::{advanced_results, authorize, protect, AdvancedSource};
use crate::models::{user::Role, BOOTCAMPS, COURSES, REVIEWS, USERS};
use crate::state::AppState;

static PUBLISHERS: [Role; 2] = [Role::Publisher, Role::Admin];
static REVIEWERS: [Role; 2] = [Role::User, Role::Admin];
static ADMINS: [Role; 1] = [Role::Admin];

/// Full application router: `/`, `/health` and everything under `/api/v1`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .nest(
            "/api/v1",
            Router::new()
                .merge(bootcamp_routes(&state))
                .merge(course_routes(&state))
                .merge(review_routes(&state))
                .merge(auth_routes(&state))
                .merge(user_routes(&state)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors(&state.config.security)),
        )
        .with_state(state)
}

fn bootcamp_routes(state: &AppState) -> Router<AppState> {
    let signed_in = from_fn_with_state(state.clone(), protect);
    let publishers = from_fn_with_state(&PUBLISHERS[..], authorize);
    let listing = AdvancedSource::new(state, &BOOTCAMPS).populate(bootcamps::courses_relation());

    Router::new()
        .route(
            "/bootcamps",
            get(bootcamps::list.layer(from_fn_with_state(listing, advanced_results)))
                .post(bootcamps::create.layer(publishers.clone()).layer(signed_in.clone())),
        )
        .route("/bootcamps/radius/:lat/:lng/:distance", get(bootcamps::within_radius))
        .route(
            "/bootcamps/:id",
            get(bootcamps::get)
                .put(bootcamps::update.layer(publishers.clone()).layer(signed_in.clone()))
                .delete(bootcamps::delete.layer(publishers).layer(signed_in)),
        )
}

fn course_routes(state: &AppState) -> Router<AppState> {
    let signed_in = from_fn_with_state(state.clone(), protect);
    let publishers = from_fn_with_state(&PUBLISHERS[..], authorize);
    let listing = AdvancedSource::new(state, &COURSES).populate(courses::bootcamp_relation());

    Router::new()
        .route("/courses", get(courses::list.layer(from_fn_with_state(listing, advanced_results))))
        .route(
            "/courses/:id",
            get(courses::get)
                .put(courses::update.layer(publishers.clone()).layer(signed_in.clone()))
                .delete(courses::delete.layer(publishers.clone()).layer(signed_in.clone())),
        )
        .route(
            "/bootcamps/:id/courses",
            get(courses::list_for_bootcamp).post(courses::create.layer(publishers).layer(signed_in)),
        )
}

fn review_routes(state: &AppState) -> Router<AppState> {
    let signed_in = from_fn_with_state(state.clone(), protect);
    let reviewers = from_fn_with_state(&REVIEWERS[..], authorize);
    let listing = AdvancedSource::new(state, &REVIEWS).populate(courses::bootcamp_relation());

    Router::new()
        .route("/reviews", get(reviews::list.layer(from_fn_with_state(listing, advanced_results))))
        .route(
            "/reviews/:id",
            get(reviews::get)
                .put(reviews::update.layer(reviewers.clone()).layer(signed_in.clone()))
                .delete(reviews::delete.layer(reviewers.clone()).layer(signed_in.clone())),
        )
        .route(
            "/bootcamps/:id/reviews",
            get(reviews::list_for_bootcamp).post(reviews::create.layer(reviewers).layer(signed_in)),
        )
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    let signed_in = from_fn_with_state(state.clone(), protect);

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", get(auth::logout).post(auth::logout))
        .route("/auth/forgotpassword", post(auth::forgot_password))
        .route("/auth/resetpassword/:resettoken", put(auth::reset_password))
        .route("/auth/me", get(auth::me.layer(signed_in.clone())))
        .route("/auth/updatedetails", put(auth::update_details.layer(signed_in.clone())))
        .route("/auth/updatepassword", put(auth::update_password.layer(signed_in)))
}

/// Every user route is admin-only, so the guards wrap the whole router.
fn user_routes(state: &AppState) -> Router<AppState> {
    let listing = AdvancedSource::new(state, &USERS);

    Router::new()
        .route(
            "/users",
            get(users::list.layer(from_fn_with_state(listing, advanced_results))).post(users::create),
        )
        .route("/users/:id", get(users::get).put(users::update).delete(users::delete))
        .route_layer(from_fn_with_state(&ADMINS[..], authorize))
        .route_layer(from_fn_with_state(state.clone(), protect))
}

/// Any origin when none are configured, otherwise only the listed ones.
fn cors(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();
    CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
}
