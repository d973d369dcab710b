//! Corkboard API composition root.

#![forbid(unsafe_code)]

mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post, put};
use corkboard_application::{
    AuditService, ChangeEventEmitter, InviteService, MembershipService, PermissionService,
    ScopeResolver,
};
use corkboard_core::AppError;
use corkboard_infrastructure::{
    ChangeDispatcher, PostgresAuditRepository, PostgresCustomRoleRepository,
    PostgresInviteRepository, PostgresMembershipRepository, PostgresScopeRepository,
    SubscriptionRegistry,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

    let database_url = required_env("DATABASE_URL")?;
    let internal_shared_secret = required_env("INTERNAL_SHARED_SECRET")?;
    let frontend_url =
        env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
    let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let api_port = env::var("API_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3001);

    if internal_shared_secret.len() < 32 {
        return Err(AppError::Validation(
            "INTERNAL_SHARED_SECRET must be at least 32 characters".to_owned(),
        ));
    }

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let membership_repository = Arc::new(PostgresMembershipRepository::new(pool.clone()));
    let custom_role_repository = Arc::new(PostgresCustomRoleRepository::new(pool.clone()));
    let scope_repository = Arc::new(PostgresScopeRepository::new(pool.clone()));
    let audit_repository = Arc::new(PostgresAuditRepository::new(pool.clone()));
    let invite_repository = Arc::new(PostgresInviteRepository::new(pool.clone()));

    let permission_service =
        PermissionService::new(membership_repository.clone(), custom_role_repository.clone());

    let registry = Arc::new(SubscriptionRegistry::with_permission_recheck(
        permission_service.clone(),
    ));
    let (dispatcher, _dispatcher_task) = ChangeDispatcher::spawn(registry.clone());
    let change_emitter = ChangeEventEmitter::new(
        ScopeResolver::new(scope_repository),
        Arc::new(dispatcher),
    );
    let membership_service = MembershipService::new(
        permission_service.clone(),
        membership_repository,
        custom_role_repository,
        audit_repository.clone(),
        change_emitter.clone(),
    );
    let invite_service = InviteService::new(
        permission_service.clone(),
        invite_repository,
        change_emitter.clone(),
    );
    let audit_service = AuditService::new(permission_service.clone(), audit_repository);

    let app_state = AppState {
        permission_service,
        membership_service,
        invite_service,
        audit_service,
        change_emitter,
        registry,
        internal_shared_secret,
    };

    let protected_routes = Router::new()
        .route(
            "/api/boards/{board_id}/members",
            get(handlers::memberships::list_members_handler)
                .post(handlers::memberships::add_member_handler),
        )
        .route(
            "/api/boards/{board_id}/members/{user_id}",
            delete(handlers::memberships::remove_member_handler),
        )
        .route(
            "/api/boards/{board_id}/members/{user_id}/role",
            put(handlers::memberships::change_role_handler),
        )
        .route(
            "/api/boards/{board_id}/permissions",
            get(handlers::memberships::my_permissions_handler),
        )
        .route("/api/roles", post(handlers::roles::create_role_handler))
        .route(
            "/api/boards/{board_id}/roles/{custom_role_id}/assignments",
            post(handlers::roles::assign_role_handler),
        )
        .route(
            "/api/boards/{board_id}/roles/{custom_role_id}/assignments/{user_id}",
            delete(handlers::roles::unassign_role_handler),
        )
        .route(
            "/api/boards/{board_id}/invites",
            post(handlers::invites::create_invite_handler),
        )
        .route(
            "/api/invites/redeem",
            post(handlers::invites::redeem_invite_handler),
        )
        .route(
            "/api/boards/{board_id}/audit",
            get(handlers::audit::list_audit_handler),
        )
        .route(
            "/api/events/boards/{board_id}",
            get(handlers::events::board_events_handler),
        )
        .route(
            "/api/events/workspaces/{workspace_id}",
            get(handlers::events::workspace_events_handler),
        )
        .route("/api/events/me", get(handlers::events::self_events_handler))
        .route_layer(from_fn(middleware::require_auth));

    let internal_routes = Router::new()
        .route(
            "/internal/changes",
            post(handlers::changes::ingest_change_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_internal_secret,
        ));

    let cors_layer = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&frontend_url)
                .map_err(|error| AppError::Validation(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .merge(internal_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state);

    let host = IpAddr::from_str(&api_host)
        .map_err(|error| AppError::Internal(format!("invalid API_HOST '{api_host}': {error}")))?;
    let address = SocketAddr::from((host, api_port));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "corkboard-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}
