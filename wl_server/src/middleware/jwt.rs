//! Bearer token middleware.
//!
//! Reads the `Authorization: Bearer <token>` header, if there is one, and validates the token. Valid claims are
//! stored in the request extensions as [`JwtClaims`]; a bad token is recorded there as an [`AuthError`]. The request
//! always continues: public routes don't care, and the [ACL middleware](super::AclMiddlewareFactory) turns a missing
//! or bad token into a 401 on protected routes.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::*;

use crate::{
    auth::{validate_token, JwtClaims},
    config::AuthConfig,
    errors::AuthError,
};

pub struct JwtMiddlewareFactory {
    config: AuthConfig,
}

impl JwtMiddlewareFactory {
    pub fn new(config: AuthConfig) -> Self {
        JwtMiddlewareFactory { config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { config: self.config.clone(), service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    config: AuthConfig,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let bearer = req
            .headers()
            .get(AUTHORIZATION)
            .map(|v| v.to_str().map(|s| s.strip_prefix("Bearer ").map(|t| t.trim().to_string())));
        let identity = match bearer {
            None => None,
            Some(Ok(Some(token))) => Some(validate_token(&token, &self.config)),
            Some(_) => Some(Err(AuthError::PoorlyFormattedToken("Expected a Bearer token".into()))),
        };
        match identity {
            Some(Ok(claims)) => {
                trace!("🔐️ Request from {} ({})", claims.sub, claims.role);
                req.extensions_mut().insert::<JwtClaims>(claims);
            },
            Some(Err(e)) => {
                debug!("🔐️ Rejected access token on {}. {e}", req.path());
                req.extensions_mut().insert::<AuthError>(e);
            },
            None => {},
        }
        let service = Rc::clone(&self.service);
        Box::pin(async move { service.call(req).await })
    }
}
