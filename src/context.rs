use actix_web::{self, error::ErrorUnauthorized, Error, FromRequest, HttpMessage};
use std::future::{ready, Ready};

use crate::core::models::user::Role;

#[derive(Debug, Clone)]
pub struct UserInfo {
    pub id: i32,
    pub role: Role,
}

impl FromRequest for UserInfo {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;
    fn from_request(req: &actix_web::HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        if let Some(user) = req.extensions().get::<Self>() {
            ready(Ok(user.clone()))
        } else {
            ready(Err(ErrorUnauthorized("")))
        }
    }
}
