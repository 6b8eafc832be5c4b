//! `POST /subscribe` - register an email address with the announcement topic.

use lambda_http::{Body, Error, Request, Response};
use shared::http::{json_response, parse_json_object, preflight_response, ErrorBody, MessageBody};
use shared::{subscribe_email, Notifier, SubscribeRequest};
use tracing::{error, info, warn};

pub const SUBSCRIBED_MESSAGE: &str =
    "Subscription successful! Please check your email to confirm.";

pub async fn handle(notifier: &dyn Notifier, event: Request) -> Result<Response<Body>, Error> {
    match event.method().as_str() {
        "POST" => {}
        "OPTIONS" => return preflight_response(),
        method => {
            warn!(method = %method, "Rejected subscribe request");
            return json_response(405, &ErrorBody::new("Method not allowed."));
        }
    }

    let request: SubscribeRequest = match parse_json_object(event.body()) {
        Some(request) => request,
        None => return json_response(400, &ErrorBody::new("Invalid request format.")),
    };

    let email = match request.validated_email() {
        Ok(email) => email,
        Err(e) => return json_response(e.status_code(), &ErrorBody::new(e.to_string())),
    };

    match subscribe_email(notifier, &email).await {
        Ok(_) => {
            info!("Subscription pending confirmation");
            json_response(200, &MessageBody::new(SUBSCRIBED_MESSAGE))
        }
        Err(e) => {
            error!(error = %e, "Subscription failed");
            json_response(500, &ErrorBody::new(e.to_string()))
        }
    }
}
