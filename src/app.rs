use crate::{admin, api, donations, setting::Setting, Error, Result, Service};
use actix_cors::Cors;
use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest},
    middleware, web, App as WebApp, HttpServer,
};
use checkout_client::{Checkout, Memory, Stripe};
use sea_orm::{ConnectOptions, Database, DbConn};
use std::{path::Path, sync::Arc};
use tracing::{info, warn};

pub struct AppState {
    pub service: Service,
    pub setting: Setting,
}

impl AppState {
    pub async fn create<P: AsRef<Path>>(
        setting_path: Option<P>,
        setting_env_prefix: Option<String>,
    ) -> Result<Self> {
        let env_notice = setting_env_prefix
            .as_ref()
            .map(|s| {
                format!(
                    ", config will be overrided by ENV seting with prefix `{}_`",
                    s
                )
            })
            .unwrap_or_default();

        let setting = if let Some(path) = setting_path {
            info!("Load config {:?}{}", path.as_ref(), env_notice);
            Setting::read(path.as_ref(), setting_env_prefix)?
        } else if let Some(prefix) = setting_env_prefix {
            info!("Load default config{}", env_notice);
            Setting::from_env(prefix)?
        } else {
            info!("Load default config");
            let mut setting = Setting::default();
            setting.validate()?;
            setting
        };

        info!(
            gateway = ?setting.gateway,
            site = setting.site(),
            "{:?}",
            setting.network
        );

        Self::from_setting(setting).await
    }

    pub async fn from_setting(setting: Setting) -> Result<Self> {
        let timeout = Some(setting.checkout.gateway_timeout());
        let conf: (String, Box<dyn Checkout + Sync + Send>) = match setting.gateway {
            crate::setting::Gateway::Stripe => {
                let s = setting
                    .stripe
                    .clone()
                    .ok_or_else(|| Error::Message("Need config stripe".to_string()))?;
                let stripe = Stripe::new(s.url, s.secret_key, timeout)?;
                ("stripe".to_owned(), Box::new(stripe))
            }
            crate::setting::Gateway::Memory => {
                warn!("Using the in-memory checkout gateway, payments can't be completed");
                ("memory".to_owned(), Box::new(Memory::new()))
            }
        };

        let mut options = ConnectOptions::from(&setting.db_url);
        options.sqlx_logging_level(tracing::log::LevelFilter::Trace);
        let conn = Database::connect(options).await?;
        Ok(Self::new(setting, conf.0, conf.1, conn))
    }

    pub fn new(
        setting: Setting,
        name: String,
        checkout: Box<dyn Checkout + Sync + Send>,
        conn: DbConn,
    ) -> Self {
        let service = Service::new(name, checkout, conn, setting.checkout.clone());
        Self { service, setting }
    }
}

pub fn create_web_app(
    data: web::Data<AppState>,
) -> WebApp<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    WebApp::new()
        .app_data(data)
        .app_data(
            web::JsonConfig::default()
                .error_handler(|err, _req| Error::InvalidParam(err.to_string()).into()),
        )
        .app_data(
            web::QueryConfig::default()
                .error_handler(|err, _req| Error::InvalidParam(err.to_string()).into()),
        )
        .wrap(middleware::Logger::default()) // enable logger
        .wrap(
            Cors::default()
                .allow_any_origin()
                .allow_any_header()
                .allow_any_method()
                .max_age(86_400),
        )
        .configure(api::configure)
        .configure(donations::configure)
        .service(admin::scope())
}

/// start the sweep task failing abandoned donations.
pub fn start_sweeper(state: Arc<AppState>) {
    let interval = state.setting.checkout.sweep_interval();
    info!(
        "Start abandoned donation sweep every {:?}, abandon after {}s",
        interval, state.setting.checkout.abandon_after
    );
    let _r = tokio::spawn(async move { state.service.sweep(interval).await });
}

/// start app and tasks
pub async fn start(state: AppState) -> Result<()> {
    let state = web::Data::new(state);

    // once per process, outside the worker factory
    start_sweeper(state.clone().into_inner());

    let c_data = state.clone();
    let server = HttpServer::new(move || create_web_app(c_data.clone()));
    let num = if state.setting.thread.http == 0 {
        num_cpus::get()
    } else {
        state.setting.thread.http
    };
    let host = state.setting.network.host.clone();
    let port = state.setting.network.port;
    info!("Start http server {}:{}", host, port);
    server.workers(num).bind((host, port))?.run().await?;
    Ok(())
}
