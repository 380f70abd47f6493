use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::AuthService;
use crate::configuration::ApplicationSettings;
use crate::middleware::SessionMiddleware;
use crate::routes::{current_session, health_check, login, logout, refresh, revoke, whoami};

/// Register every route on `cfg`. Shared by the server and `actix_web::test`.
pub fn configure(cfg: &mut web::ServiceConfig, auth: AuthService, settings: ApplicationSettings) {
    let session = SessionMiddleware::require(
        auth.clone(),
        settings.required_role.clone(),
        settings.login_path.clone(),
    );
    let optional_session = SessionMiddleware::optional(auth.clone());

    cfg.app_data(web::Data::new(auth))
        .app_data(web::Data::new(settings))
        // Public routes
        .route("/health_check", web::get().to(health_check))
        .route("/auth/login", web::post().to(login))
        .route("/auth/refresh", web::post().to(refresh))
        .route("/auth/revoke", web::post().to(revoke))
        .route("/auth/logout", web::post().to(logout))
        // Session-aware routes
        .service(
            web::resource("/whoami")
                .wrap(optional_session)
                .route(web::get().to(whoami)),
        )
        // Protected routes (require the configured role)
        .service(
            web::scope("/api")
                .wrap(session)
                .route("/session", web::get().to(current_session)),
        );
}

pub fn run(
    listener: TcpListener,
    auth: AuthService,
    settings: ApplicationSettings,
) -> Result<Server, std::io::Error> {
    let server = HttpServer::new(move || {
        let auth = auth.clone();
        let settings = settings.clone();
        App::new()
            .wrap(Logger::default())
            .configure(move |cfg| configure(cfg, auth, settings))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
