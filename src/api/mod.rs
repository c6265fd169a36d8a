use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::error::{Error, ErrorBody};
use crate::model::api::auth::GuardFailure;

pub mod auth;
pub mod comments;
pub mod polls;
pub mod users;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(users::routes());
    routes.extend(polls::routes());
    routes.extend(comments::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        unprocessable_entity,
        internal_error,
        default_catcher,
    ]
}

/// The error envelope for a request that never reached a handler. A request
/// guard that failed with this status has already decided the error;
/// otherwise the status maps to a generic one.
fn envelope(status: Status, req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    let GuardFailure(failure) = req.local_cache(GuardFailure::default);
    if let Some((cached, body)) = failure {
        if *cached == status {
            return (status, Json(body.clone()));
        }
    }
    let err = Error::for_status(status);
    // Malformed JSON surfaces as 422; report it like any other bad request.
    let status = match err {
        Error::Unknown => status,
        _ => err.status(),
    };
    (status, Json(ErrorBody::from(&err)))
}

#[catch(400)]
fn bad_request(req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    envelope(Status::BadRequest, req)
}

#[catch(401)]
fn unauthorized(req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    envelope(Status::Unauthorized, req)
}

#[catch(403)]
fn forbidden(req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    envelope(Status::Forbidden, req)
}

#[catch(404)]
fn not_found(req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    envelope(Status::NotFound, req)
}

#[catch(422)]
fn unprocessable_entity(req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    envelope(Status::UnprocessableEntity, req)
}

#[catch(500)]
fn internal_error(req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    envelope(Status::InternalServerError, req)
}

#[catch(default)]
fn default_catcher(status: Status, req: &Request<'_>) -> (Status, Json<ErrorBody>) {
    envelope(status, req)
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::Value,
    };

    #[backend_test]
    async fn unknown_route_is_enveloped(client: Client) {
        let response = client.get("/api/no/such/route").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["error"]["code"], 6);
        assert_eq!(body["message"], "Not found.");
    }

    #[backend_test]
    async fn missing_token_is_unauthorized(client: Client) {
        let response = client
            .post("/api/send_confirmation_email")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["error"]["code"], 10);
    }

    #[backend_test]
    async fn malformed_json_is_a_bad_request(client: Client) {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(r#"{"email": 5}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let body = response.into_json::<Value>().await.unwrap();
        assert_eq!(body["error"]["code"], 3);
    }
}
