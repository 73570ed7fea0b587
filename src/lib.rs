#[macro_use]
extern crate rocket;

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod request_logger;
pub mod routes;
pub mod store;

use crate::config::ServiceConfig;
use crate::db::EmployeesDb;
use crate::request_logger::RequestLogger;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::Once;

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let service_config = ServiceConfig::from_env();
    log::info!(
        "employee listings default to {} rows (max {}), uploads accept up to {} files",
        service_config.default_limit,
        service_config.max_limit,
        service_config.max_upload_files
    );

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Put, Method::Delete]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(EmployeesDb::init())
        .attach(cors)
        .manage(service_config)
        // Run database migrations on startup
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match EmployeesDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        match store::run_migrations(&pool).await {
                            Ok(_) => {
                                log::info!("database migrations successful");
                                Ok(rocket)
                            }
                            Err(e) => {
                                log::error!("database migrations failed: {}", e);
                                Err(rocket)
                            }
                        }
                    }
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        // The import pipeline opens its own transactions, so it needs the pool itself
        // rather than a request-scoped connection.
        .attach(AdHoc::try_on_ignite(
            "Manage DB Pool",
            |rocket| async move {
                match EmployeesDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        Ok(rocket.manage(pool))
                    }
                    None => Err(rocket),
                }
            },
        ))
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Health routes
                routes::health::health_check,
                // Employee routes
                routes::employees::list_employees,
                routes::employees::get_employee,
                routes::employees::create_employee,
                routes::employees::update_employee,
                routes::employees::delete_employee,
            ],
        )
        // Multipart uploads have no schema in the generated document.
        .mount("/api/v1", routes![routes::upload::upload_employees])
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Employee API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::sqlx::{self, PgPool};

    use crate::config::ServiceConfig;
    use crate::models::Employee;

    pub use database::{TestDatabase, TestDatabaseError};
    pub use memory::{MemoryEmployeeStore, MemoryUpload, failing_reader};

    /// Convenience helpers for seeding and inspecting the employees table in tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        /// Create a fixture helper bound to the provided pool.
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        /// Insert an employee row directly, bypassing the routes.
        pub async fn insert_employee(&self, employee: &Employee) -> Result<(), sqlx::Error> {
            sqlx::query("INSERT INTO employees (id, login, name, salary) VALUES ($1, $2, $3, $4)")
                .bind(&employee.id)
                .bind(&employee.login)
                .bind(&employee.name)
                .bind(employee.salary)
                .execute(self.pool)
                .await?;

            Ok(())
        }

        /// Fetch a stored employee by identifier.
        pub async fn employee(&self, id: &str) -> Result<Option<Employee>, sqlx::Error> {
            sqlx::query_as::<_, Employee>(
                "SELECT id, login, name, salary FROM employees WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(self.pool)
            .await
        }

        /// Number of stored employees.
        pub async fn count(&self) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar("SELECT COUNT(*) FROM employees")
                .fetch_one(self.pool)
                .await
        }
    }

    pub mod database {
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::ImageExt;
        use testcontainers_modules::postgres::Postgres;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        use crate::store::migration::MIGRATOR;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("no test database available: {0}")]
            Unavailable(String),
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral database factory for integration tests.
        ///
        /// Each instance owns a freshly created, fully migrated database that is
        /// dropped again on [`close`](TestDatabase::close) or drop.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            /// Use the server named by `TEST_DATABASE_URL` when set, otherwise
            /// launch a disposable Postgres container.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                match std::env::var("TEST_DATABASE_URL") {
                    Ok(url) => Self::with_server(&url, None).await,
                    Err(_) => Self::new().await,
                }
            }

            /// Provision a fresh database inside a new Postgres container.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default()
                    .with_tag("16-alpine")
                    .start()
                    .await
                    .map_err(|err| TestDatabaseError::Unavailable(err.to_string()))?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                Self::with_server(&admin_url, Some(container)).await
            }

            async fn with_server(
                admin_url: &str,
                container: Option<ContainerAsync<Postgres>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions =
                    admin_url.parse().map_err(TestDatabaseError::Sqlx)?;
                let base_options = base_options.log_statements(LevelFilter::Off);

                let base_name = base_options
                    .get_database()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "postgres".to_string());

                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(base_options.clone())
                    .await
                    .map_err(|err| TestDatabaseError::Unavailable(err.to_string()))?;

                let new_db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", new_db_name);
                sqlx::query(&create_sql)
                    .execute(&admin_pool)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.clone().database(&new_db_name))
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options: base_options,
                    database_name: new_db_name,
                    container,
                })
            }

            /// Cloneable connection pool for use in tests and Rocket state.
            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            /// Convenience method returning a clone of the pooled connection handle.
            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database_with_fallback(self.admin_options.clone(), &self.database_name)
                    .await
                    .map_err(TestDatabaseError::Sqlx)?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database_with_fallback(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            let drop_force = format!("DROP DATABASE \"{}\" WITH (FORCE)", database_name);
            match sqlx::query(&drop_force).execute(&admin_pool).await {
                Ok(_) => Ok(()),
                Err(err) if force_drop_unsupported(&err) => {
                    let drop_sql = format!("DROP DATABASE \"{}\"", database_name);
                    sqlx::query(&drop_sql).execute(&admin_pool).await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }

        fn force_drop_unsupported(err: &sqlx::Error) -> bool {
            matches!(
                err,
                sqlx::Error::Database(db_err)
                    if db_err
                        .code()
                        .map(|code| code == "42601" || code == "0A000")
                        .unwrap_or(false)
            )
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ =
                                drop_database_with_fallback(admin_options.clone(), &db_name).await;
                        });
                    } else {
                        std::thread::spawn(move || {
                            if let Ok(rt) = tokio::runtime::Runtime::new() {
                                rt.block_on(async move {
                                    pool.close().await;
                                    let _ = drop_database_with_fallback(
                                        admin_options.clone(),
                                        &db_name,
                                    )
                                    .await;
                                });
                            }
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// In-memory stand-ins for storage and uploads so the import pipeline can
    /// be exercised without PostgreSQL.
    pub mod memory {
        use std::collections::BTreeMap;
        use std::io;
        use std::pin::Pin;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::{Arc, Mutex, MutexGuard};
        use std::task::{Context, Poll};

        use async_trait::async_trait;
        use rocket_db_pools::sqlx;
        use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt, BufReader, ReadBuf};

        use crate::import::{UploadReader, UploadSource};
        use crate::models::Employee;
        use crate::store::{EmployeeStore, EmployeeTransaction, StoreError};

        #[derive(Debug, Default)]
        struct MemoryState {
            rows: BTreeMap<String, Employee>,
            failing_ids: Vec<String>,
            commits: usize,
            rollbacks: usize,
            upsert_attempts: usize,
        }

        /// Employee store keeping committed rows in a map. Transactions work on
        /// a private copy that replaces the map on commit.
        #[derive(Debug, Clone, Default)]
        pub struct MemoryEmployeeStore {
            state: Arc<Mutex<MemoryState>>,
        }

        impl MemoryEmployeeStore {
            pub fn new() -> Self {
                Self::default()
            }

            fn state(&self) -> MutexGuard<'_, MemoryState> {
                self.state.lock().expect("memory store lock poisoned")
            }

            /// Seed a committed row.
            pub fn insert(&self, employee: Employee) {
                self.state().rows.insert(employee.id.clone(), employee);
            }

            /// Make every upsert of `id` fail with a database error.
            pub fn fail_upserts_for(&self, id: &str) {
                self.state().failing_ids.push(id.to_string());
            }

            pub fn get(&self, id: &str) -> Option<Employee> {
                self.state().rows.get(id).cloned()
            }

            /// Committed rows ordered by identifier.
            pub fn employees(&self) -> Vec<Employee> {
                self.state().rows.values().cloned().collect()
            }

            pub fn len(&self) -> usize {
                self.state().rows.len()
            }

            pub fn is_empty(&self) -> bool {
                self.state().rows.is_empty()
            }

            pub fn commits(&self) -> usize {
                self.state().commits
            }

            pub fn rollbacks(&self) -> usize {
                self.state().rollbacks
            }

            pub fn upsert_attempts(&self) -> usize {
                self.state().upsert_attempts
            }
        }

        #[async_trait]
        impl EmployeeStore for MemoryEmployeeStore {
            type Transaction = MemoryTransaction;

            async fn begin(&self) -> Result<Self::Transaction, StoreError> {
                let staged = self.state().rows.clone();
                Ok(MemoryTransaction {
                    state: Arc::clone(&self.state),
                    staged,
                })
            }
        }

        pub struct MemoryTransaction {
            state: Arc<Mutex<MemoryState>>,
            staged: BTreeMap<String, Employee>,
        }

        impl MemoryTransaction {
            fn state(&self) -> MutexGuard<'_, MemoryState> {
                self.state.lock().expect("memory store lock poisoned")
            }
        }

        #[async_trait]
        impl EmployeeTransaction for MemoryTransaction {
            async fn upsert_employee(&mut self, employee: &Employee) -> Result<(), StoreError> {
                {
                    let mut state = self.state();
                    state.upsert_attempts += 1;
                    if state.failing_ids.contains(&employee.id) {
                        return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
                    }
                }

                let matched: Vec<String> = self
                    .staged
                    .values()
                    .filter(|row| row.id == employee.id || row.login == employee.login)
                    .map(|row| row.id.clone())
                    .collect();

                match matched.as_slice() {
                    [] => {
                        self.staged.insert(employee.id.clone(), employee.clone());
                    }
                    [id] => {
                        if let Some(row) = self.staged.get_mut(id) {
                            row.login = employee.login.clone();
                            row.name = employee.name.clone();
                            row.salary = employee.salary;
                        }
                    }
                    _ => {
                        return Err(StoreError::Conflict {
                            key: "employees_login_key".to_string(),
                        });
                    }
                }

                Ok(())
            }

            async fn commit(self) -> Result<(), StoreError> {
                let mut state = self.state.lock().expect("memory store lock poisoned");
                state.rows = self.staged;
                state.commits += 1;
                Ok(())
            }

            async fn rollback(self) -> Result<(), StoreError> {
                self.state().rollbacks += 1;
                Ok(())
            }
        }

        /// Reader that always fails, standing in for a broken connection.
        struct BrokenRead;

        impl AsyncRead for BrokenRead {
            fn poll_read(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                _buf: &mut ReadBuf<'_>,
            ) -> Poll<io::Result<()>> {
                Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "upload stream interrupted",
                )))
            }
        }

        /// Buffered reader yielding `prefix` and then failing.
        pub fn failing_reader(prefix: &'static [u8]) -> impl AsyncBufRead + Send + Unpin {
            BufReader::new(prefix.chain(BrokenRead))
        }

        #[derive(Debug, Clone)]
        enum UploadBody {
            Bytes(Vec<u8>),
            Unopenable,
        }

        /// Named in-memory upload.
        #[derive(Debug)]
        pub struct MemoryUpload {
            name: String,
            body: UploadBody,
            opened: AtomicBool,
        }

        impl MemoryUpload {
            pub fn new(name: &str, contents: impl Into<Vec<u8>>) -> Self {
                Self {
                    name: name.to_string(),
                    body: UploadBody::Bytes(contents.into()),
                    opened: AtomicBool::new(false),
                }
            }

            /// Upload whose `open` fails.
            pub fn unopenable(name: &str) -> Self {
                Self {
                    name: name.to_string(),
                    body: UploadBody::Unopenable,
                    opened: AtomicBool::new(false),
                }
            }

            pub fn was_opened(&self) -> bool {
                self.opened.load(Ordering::SeqCst)
            }
        }

        #[async_trait]
        impl UploadSource for MemoryUpload {
            fn name(&self) -> &str {
                &self.name
            }

            async fn open<'a>(&'a self) -> io::Result<UploadReader<'a>> {
                self.opened.store(true, Ordering::SeqCst);
                match &self.body {
                    UploadBody::Bytes(bytes) => Ok(Box::pin(bytes.as_slice())),
                    UploadBody::Unopenable => Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("upload {} is no longer available", self.name),
                    )),
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pg_pool: Option<PgPool>,
        config: Option<ServiceConfig>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                pg_pool: None,
                config: None,
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        /// Manage a `PgPool` instance for tests that exercise database-backed routes.
        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self
        }

        /// Override the service configuration (defaults to the environment).
        pub fn manage_config(mut self, config: ServiceConfig) -> Self {
            self.config = Some(config);
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment)
                .manage(self.config.unwrap_or_else(ServiceConfig::from_env));

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(pool) = self.pg_pool {
                rocket = rocket.manage(pool);
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
