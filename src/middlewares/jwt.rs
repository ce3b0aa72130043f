use actix_web::{
    dev::{Service, ServiceRequest, Transform},
    error::ErrorUnauthorized,
    Error, HttpMessage,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

use crate::context::UserInfo;
use crate::core::models::user::Role;
use crate::core::ports::tokener::{Payload, Tokener};
use crate::impls::tokener::jwt::JWT;

pub static JWT_SECRET: &str = "JWT_SECRET";

#[derive(Debug, Deserialize, Serialize)]
pub struct Claim {
    pub user: String,
    pub role: String,
    pub exp: i64,
}

impl Payload for Claim {
    fn user(&self) -> &str {
        &self.user
    }
}

pub struct Jwt {
    secret: Vec<u8>,
}

impl Jwt {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }
}

impl<S> Transform<S, ServiceRequest> for Jwt
where
    S: Service<ServiceRequest> + 'static,
    S::Future: 'static,
    S::Error: Into<Error>,
{
    type Error = Error;
    type Response = S::Response;
    type Transform = JwtService<S>;
    type InitError = ();
    type Future = Pin<Box<dyn Future<Output = Result<Self::Transform, Self::InitError>>>>;
    fn new_transform(&self, service: S) -> Self::Future {
        let secret = self.secret.clone();
        Box::pin(async move {
            Ok(JwtService {
                tokener: JWT::new(secret),
                next_service: service,
            })
        })
    }
}

pub struct JwtService<S> {
    tokener: JWT,
    next_service: S,
}

impl<S> Service<ServiceRequest> for JwtService<S>
where
    S: Service<ServiceRequest>,
    S::Future: 'static,
    S::Error: Into<Error>,
{
    type Response = S::Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    fn poll_ready(&self, ctx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.next_service.poll_ready(ctx).map_err(|e| e.into())
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let header = match req.headers().get("Authorization") {
            None => return Box::pin(async move { Err(ErrorUnauthorized("no token in header")) }),
            Some(header) => header.to_owned(),
        };
        let claim: Claim = match header.to_str() {
            Err(e) => return Box::pin(async move { Err(ErrorUnauthorized(e)) }),
            Ok(token) => match <JWT as Tokener<Claim>>::verify_token(&self.tokener, token) {
                Err(e) => return Box::pin(async move { Err(ErrorUnauthorized(e)) }),
                Ok(claim) => claim,
            },
        };
        match (claim.user.parse::<i32>(), Role::parse(&claim.role)) {
            (Ok(id), Some(role)) => {
                req.extensions_mut().insert(UserInfo { id, role });
            }
            _ => return Box::pin(async move { Err(ErrorUnauthorized("invalid claim")) }),
        }
        let res_fut = self.next_service.call(req);
        Box::pin(async move {
            let resp = res_fut.await.map_err(|e| e.into())?;
            Ok(resp)
        })
    }
}
