// src/main.rs
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use whatsme_control::config::AppConfig;
use whatsme_control::ledger::{Ledger, PgLedger};
use whatsme_control::lifecycle::LifecycleService;
use whatsme_control::mailer::Mailer;
use whatsme_control::pairing::WhatsmeClient;
use whatsme_control::paystack::PaystackClient;
use whatsme_control::{api, docs, sweep, AppState};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env().expect("invalid configuration");

    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let ledger: Arc<dyn Ledger> = Arc::new(PgLedger::new(pool.clone()));
    let payments =
        Arc::new(PaystackClient::new(config.paystack.clone()).expect("paystack client"));
    let pairing = Arc::new(WhatsmeClient::new(config.pairing.clone()).expect("pairing client"));
    let lifecycle = LifecycleService::new(ledger.clone(), payments, pairing);

    let mailer = config
        .smtp
        .as_ref()
        .map(|smtp| Mailer::new(smtp).expect("smtp mailer"));
    if mailer.is_none() {
        log::warn!("SMTP_HOST not set, mail delivery disabled");
    }

    sweep::start_expiration_sweep(pool.clone(), config.sweep_interval_secs);

    let state = web::Data::new(AppState {
        pool,
        ledger,
        lifecycle,
        mailer,
        jwt_secret: config.jwt_secret.clone(),
    });
    let jwt_secret = config.jwt_secret.clone();

    log::info!("listening on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            .service(api::auth::register)
            .service(api::auth::verify_otp)
            .service(api::auth::login)
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware::new(jwt_secret.clone()))
                    .service(api::payments::initialize_payment)
                    .service(api::payments::verify_payment)
                    .service(api::instances::list_instances)
                    .service(api::instances::pair_instance)
                    .service(api::instances::delete_instance)
                    .service(api::admin::list_users)
                    .service(api::admin::list_all_instances)
                    .service(api::admin::list_all_transactions)
                    .service(api::admin::create_instance)
                    .service(api::admin::update_instance)
                    .service(api::admin::delete_user)
                    .service(api::admin::send_email),
            )
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
