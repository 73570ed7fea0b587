use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::StatusClass;
use rocket::{Data, Request, Response};
use std::time::Instant;

/// Fairing logging one line per HTTP request with its status and timing.
/// Client and server errors are logged at warn level.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(Instant::now);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let elapsed_ms = request.local_cache(Instant::now).elapsed().as_secs_f64() * 1000.0;
        let status = response.status();

        match status.class() {
            StatusClass::ClientError | StatusClass::ServerError => log::warn!(
                "{} {} -> {} ({:.2}ms)",
                request.method(),
                request.uri(),
                status.code,
                elapsed_ms
            ),
            _ => log::info!(
                "{} {} -> {} ({:.2}ms)",
                request.method(),
                request.uri(),
                status.code,
                elapsed_ms
            ),
        }
    }
}
