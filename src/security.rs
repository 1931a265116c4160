use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{http::header, Error};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

/// Lesson media and thumbnails are embedded as data URLs, so images and media
/// accept `data:` and `blob:` sources.
pub const DEFAULT_CSP: &str = "default-src 'self'; img-src 'self' data: blob:; media-src 'self' data: blob:; object-src 'none'; base-uri 'none'; frame-ancestors 'none'; form-action 'self'";

/// Swagger UI ships inline scripts and styles.
const DOCS_CSP: &str = "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; frame-ancestors 'none'";

const HSTS: &str = "max-age=63072000; includeSubDomains";

/// Adds hardening headers to every response that does not already set them.
#[derive(Clone)]
pub struct SecurityHeaders {
    pub enable_hsts: bool,
    pub csp: String,
    pub docs_prefix: String,
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self { enable_hsts: false, csp: DEFAULT_CSP.to_string(), docs_prefix: "/docs".to_string() }
    }
}

impl SecurityHeaders {
    pub fn new(enable_hsts: bool) -> Self {
        Self { enable_hsts, ..Self::default() }
    }

    pub fn with_csp(mut self, csp: impl Into<String>) -> Self {
        self.csp = csp.into();
        self
    }

    fn csp_for(&self, path: &str) -> &str {
        if path.starts_with(&self.docs_prefix) {
            DOCS_CSP
        } else {
            &self.csp
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SecurityHeaders
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SecurityHeadersMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SecurityHeadersMiddleware { service: Rc::new(service), cfg: Rc::new(self.clone()) }))
    }
}

pub struct SecurityHeadersMiddleware<S> {
    service: Rc<S>,
    cfg: Rc<SecurityHeaders>,
}

impl<S, B> Service<ServiceRequest> for SecurityHeadersMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let cfg = self.cfg.clone();
        let path = req.path().to_string();
        Box::pin(async move {
            let mut res = svc.call(req).await?;
            let headers = res.response_mut().headers_mut();
            let mut set_default = |name: header::HeaderName, value: &str| {
                if headers.contains_key(&name) {
                    return;
                }
                match header::HeaderValue::from_str(value) {
                    Ok(v) => {
                        headers.insert(name, v);
                    }
                    Err(e) => log::warn!("invalid value for {name}: {e}"),
                }
            };
            set_default(header::CONTENT_SECURITY_POLICY, cfg.csp_for(&path));
            set_default(header::REFERRER_POLICY, "no-referrer");
            set_default(header::X_CONTENT_TYPE_OPTIONS, "nosniff");
            set_default(header::X_FRAME_OPTIONS, "DENY");
            if cfg.enable_hsts {
                set_default(header::STRICT_TRANSPORT_SECURITY, HSTS);
            }
            Ok(res)
        })
    }
}
