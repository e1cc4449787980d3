use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use log::{error, info};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::store::SharedReadingStore;

pub mod commands;

use commands::{CommandError, CommandRegistry};

pub struct ApiState {
    pub store: Arc<SharedReadingStore>,
    pub commands: CommandRegistry,
    pub start_time: Instant,
}

impl ApiState {
    pub fn new(store: Arc<SharedReadingStore>, commands: CommandRegistry) -> Self {
        Self { store, commands, start_time: Instant::now() }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub sections: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CommandResponse {
    pub cmd: String,
    pub result: bool,
}

#[utoipa::path(get,
    path = "/health",
    summary = "Health check endpoint for container monitoring",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "The reading store is not usable")
    ),
)]
async fn health_check(state: web::Data<ApiState>) -> impl Responder {
    match state.store.section_names() {
        Ok(sections) => HttpResponse::Ok().json(HealthResponse {
            status: "healthy".to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
            sections,
        }),
        Err(e) => {
            error!("Health check failed: {}", e);
            HttpResponse::ServiceUnavailable().finish()
        }
    }
}

#[utoipa::path(get,
    path = "/",
    summary = "Get the latest readings of all meters",
    responses(
        (status = 200, description = "All sections of the reading store"),
        (status = 500, description = "The reading store is not usable")
    ),
)]
async fn get_readings(state: web::Data<ApiState>) -> impl Responder {
    match state.store.snapshot() {
        Ok(snapshot) => {
            let sorted: BTreeMap<_, _> = snapshot.into_iter().collect();
            HttpResponse::Ok().json(sorted)
        }
        Err(e) => {
            error!("Unable to read store: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[utoipa::path(get,
    path = "/sections/{name}",
    summary = "Get the latest reading of one meter",
    params(
        ("name", description = "Name of the section, e.g. smartmeter_d0")
    ),
    responses(
        (status = 200, description = "The section"),
        (status = 404, description = "No such section")
    ),
)]
async fn get_section(state: web::Data<ApiState>, path: web::Path<String>) -> impl Responder {
    let name = path.into_inner();
    match state.store.get_section(&name) {
        Ok(Some(section)) => HttpResponse::Ok().json(section),
        Ok(None) => HttpResponse::NotFound().content_type("text/plain").body(format!("Section '{}' not found", name)),
        Err(e) => {
            error!("Unable to read section {}: {}", name, e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[utoipa::path(get,
    path = "/cmd",
    summary = "Run a registered command, e.g. /cmd?name=s0Interface.setValue&value=1042.5",
    params(
        ("name" = String, Query, description = "Name of the command"),
        ("value" = Option<String>, Query, description = "Parameter of s0Interface.setValue")
    ),
    responses(
        (status = 200, description = "Command executed", body = CommandResponse),
        (status = 400, description = "Command name or parameter missing"),
        (status = 404, description = "Unknown command")
    ),
)]
async fn run_command(state: web::Data<ApiState>, query: web::Query<HashMap<String, String>>) -> impl Responder {
    let params = query.into_inner();
    let Some(name) = params.get("name") else {
        return HttpResponse::BadRequest().body("Parameter name is missing");
    };

    match state.commands.invoke(name, &params) {
        Ok(result) => HttpResponse::Ok().json(CommandResponse { cmd: name.clone(), result }),
        Err(e @ CommandError::UnknownCommand(_)) => HttpResponse::NotFound().body(e.to_string()),
        Err(e @ CommandError::MissingParameter(_)) => HttpResponse::BadRequest().body(e.to_string()),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(get_readings))
        .route("/sections/{name}", web::get().to(get_section))
        .route("/cmd", web::get().to(run_command))
        .route("/health", web::get().to(health_check));
}

#[derive(OpenApi)]
#[openapi(
    info(description = "smartmeter2http API description"),
    paths(
        health_check,
        get_readings,
        get_section,
        run_command,
    )
)]
struct ApiDoc;

pub struct ApiManager {
    state: web::Data<ApiState>,
}

impl ApiManager {
    pub fn new(state: ApiState) -> Self {
        ApiManager { state: web::Data::new(state) }
    }

    pub async fn start_thread(&self, port: u16) -> std::io::Result<()> {
        info!("Starting HTTP API on port {}", port);
        let state = self.state.clone();

        let server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .configure(configure)
                .service(
                    SwaggerUi::new("/swagger-ui/{_:.*}")
                        .url("/api/v1/openapi.json", ApiDoc::openapi()),
                )
        })
        .bind(format!("0.0.0.0:{}", port))?
        .run();
        server.await
    }
}
